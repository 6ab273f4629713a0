//! Book catalog endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::{AppError, AppResult},
    models::{BookListParams, BookPage, BookResponse, CreateBook, CreateReview, Review},
    AppState,
};

use super::{ApiJson, ApiPath, ApiQuery, AuthenticatedUser};

/// List books with optional title/author filters, sorting and pagination
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(BookListParams),
    responses(
        (status = 200, description = "One page of books", body = BookPage),
        (status = 400, description = "Malformed query string", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<BookListParams>,
) -> AppResult<Json<BookPage>> {
    let (books, total, page) = state.services.catalog.search_books(&params).await?;
    Ok(Json(BookPage::new(books, total, page.page, page.per_page)))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = BookResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> AppResult<Json<BookResponse>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a new book attached to existing authors
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = BookResponse),
        (status = 400, description = "Invalid input or unknown author", body = crate::error::ErrorResponse),
        (status = 409, description = "ISBN already exists", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    ApiJson(data): ApiJson<CreateBook>,
) -> AppResult<(StatusCode, Json<BookResponse>)> {
    let created = state.services.catalog.create_book(data).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Post a review of a book as the authenticated user
#[utoipa::path(
    post,
    path = "/books/{id}/reviews",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = CreateReview,
    responses(
        (status = 201, description = "Review created", body = Review),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorResponse),
        (status = 404, description = "Book not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_review(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ApiPath(book_id): ApiPath<i32>,
    body: Result<ApiJson<CreateReview>, AppError>,
) -> AppResult<(StatusCode, Json<Review>)> {
    // A missing book outranks an unreadable body
    let ApiJson(data) = match body {
        Ok(body) => body,
        Err(err) => {
            state.services.catalog.ensure_book_exists(book_id).await?;
            return Err(err);
        }
    };

    let review = state
        .services
        .catalog
        .create_review(book_id, claims.user_id, data)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
