//! Catalog service: book listing, creation and reviews

use std::sync::Arc;

use validator::Validate;

use crate::{
    config::PaginationConfig,
    error::{AppError, AppResult},
    models::{BookListParams, BookResponse, CreateBook, CreateReview, Review},
    repository::{BookQuery, PageRequest, Repository},
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Arc<dyn Repository>,
    pagination: PaginationConfig,
}

impl CatalogService {
    pub fn new(repository: Arc<dyn Repository>, pagination: PaginationConfig) -> Self {
        Self {
            repository,
            pagination,
        }
    }

    /// Search, sort and paginate books from optional request parameters
    pub async fn search_books(&self, params: &BookListParams) -> AppResult<(Vec<BookResponse>, i64, PageRequest)> {
        let query = BookQuery::from_params(params);
        let page = PageRequest::from_params(
            params.page.as_deref(),
            params.per_page.as_deref(),
            self.pagination.default_per_page,
            self.pagination.max_per_page,
        );

        let (books, total) = self.repository.books_search(&query, &page).await?;
        Ok((books.into_iter().map(BookResponse::from).collect(), total, page))
    }

    pub async fn get_book(&self, id: i32) -> AppResult<BookResponse> {
        self.repository.books_get_by_id(id).await.map(BookResponse::from)
    }

    /// Create a book and attach its authors
    pub async fn create_book(&self, data: CreateBook) -> AppResult<BookResponse> {
        data.validate()?;
        let created = self.repository.books_create(&data).await?;
        Ok(BookResponse::from(created))
    }

    pub async fn ensure_book_exists(&self, book_id: i32) -> AppResult<()> {
        if self.repository.books_exists(book_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound(format!("Book with id {} not found", book_id)))
        }
    }

    /// Post a review of `book_id` on behalf of `user_id`
    pub async fn create_review(&self, book_id: i32, user_id: i32, data: CreateReview) -> AppResult<Review> {
        self.ensure_book_exists(book_id).await?;
        data.validate()?;
        self.repository.reviews_create(book_id, user_id, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{Author, Book, BookDetails},
        repository::{query::SortColumn, MockRepository},
    };

    fn service(mock: MockRepository) -> CatalogService {
        CatalogService::new(Arc::new(mock), PaginationConfig::default())
    }

    fn details(id: i32, ratings: Vec<i32>) -> BookDetails {
        BookDetails {
            book: Book {
                id,
                isbn: format!("isbn-{}", id),
                title: "Dune".to_string(),
                description: "Desert planet".to_string(),
            },
            authors: vec![Author {
                id: 1,
                name: "Frank".to_string(),
                surname: "Herbert".to_string(),
            }],
            ratings,
        }
    }

    #[tokio::test]
    async fn search_composes_query_and_default_page() {
        let mut mock = MockRepository::new();
        mock.expect_books_search()
            .withf(|query, page| {
                query.title.as_deref() == Some("Dune")
                    && query.author_ids == Some(vec![1, 2])
                    && query.sort.map(|s| s.column) == Some(SortColumn::Title)
                    && page.page == 1
                    && page.per_page == 15
            })
            .times(1)
            .returning(|_, _| Ok((vec![details(1, vec![3, 5])], 1)));

        let params = BookListParams {
            title: Some("Dune".to_string()),
            authors: Some("1,2".to_string()),
            sort_column: Some("title".to_string()),
            ..Default::default()
        };
        let (books, total, page) = service(mock).search_books(&params).await.unwrap();

        assert_eq!(total, 1);
        assert_eq!(page.per_page, 15);
        assert_eq!(books[0].review.avg, Some(4));
        assert_eq!(books[0].review.count, 2);
    }

    #[tokio::test]
    async fn search_clamps_per_page() {
        let mut mock = MockRepository::new();
        mock.expect_books_search()
            .withf(|query, page| *query == BookQuery::default() && page.per_page == 100 && page.page == 1)
            .returning(|_, _| Ok((vec![], 0)));

        let params = BookListParams {
            page: Some("-3".to_string()),
            per_page: Some("5000".to_string()),
            ..Default::default()
        };
        service(mock).search_books(&params).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_book_never_reaches_repository() {
        let mut mock = MockRepository::new();
        mock.expect_books_create().never();

        let err = service(mock)
            .create_book(CreateBook {
                isbn: String::new(),
                title: "Dune".to_string(),
                description: "Desert planet".to_string(),
                authors: vec![1],
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn created_book_has_empty_review_summary() {
        let mut mock = MockRepository::new();
        mock.expect_books_create()
            .times(1)
            .returning(|_| Ok(details(3, vec![])));

        let book = service(mock)
            .create_book(CreateBook {
                isbn: "9780441013593".to_string(),
                title: "Dune".to_string(),
                description: "Desert planet".to_string(),
                authors: vec![1],
            })
            .await
            .unwrap();
        assert_eq!(book.id, 3);
        assert_eq!(book.review.avg, None);
        assert_eq!(book.review.count, 0);
    }

    #[tokio::test]
    async fn review_of_missing_book_is_not_found_before_validation() {
        let mut mock = MockRepository::new();
        mock.expect_books_exists().returning(|_| Ok(false));
        mock.expect_reviews_create().never();

        let err = service(mock)
            .create_review(
                8,
                1,
                CreateReview {
                    review: 0,
                    comment: String::new(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn review_is_stored_for_caller() {
        let mut mock = MockRepository::new();
        mock.expect_books_exists().returning(|_| Ok(true));
        mock.expect_reviews_create()
            .withf(|book_id, user_id, data| *book_id == 8 && *user_id == 42 && data.review == 5)
            .times(1)
            .returning(|book_id, user_id, data| {
                Ok(Review {
                    id: 1,
                    book_id,
                    user_id,
                    review: data.review,
                    comment: data.comment.clone(),
                    created_at: chrono::Utc::now(),
                })
            });

        let review = service(mock)
            .create_review(
                8,
                42,
                CreateReview {
                    review: 5,
                    comment: "Great".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(review.user_id, 42);
    }
}
