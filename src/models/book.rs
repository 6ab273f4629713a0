//! Book model, request payloads and response shapes

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::author::Author;
use super::review::ReviewSummary;

/// Book row as stored in the `books` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub description: String,
}

/// A book with its loaded relations: attached authors and the ratings of its reviews
#[derive(Debug, Clone, PartialEq)]
pub struct BookDetails {
    pub book: Book,
    pub authors: Vec<Author>,
    pub ratings: Vec<i32>,
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 20, message = "ISBN must be 1 to 20 characters"))]
    pub isbn: String,
    #[validate(length(min = 1, max = 255, message = "Title must be 1 to 255 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    /// Ids of existing authors to attach
    #[validate(length(min = 1, message = "At least one author is required"))]
    pub authors: Vec<i32>,
}

impl CreateBook {
    /// Author ids in request order, without repeats. Stored books list their
    /// authors by author id, not in this order.
    pub fn unique_author_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = Vec::with_capacity(self.authors.len());
        for id in &self.authors {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }
}

/// Query parameters accepted by the book collection endpoint
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookListParams {
    /// Substring to look for in titles
    pub title: Option<String>,
    /// Comma separated author ids
    pub authors: Option<String>,
    /// `title` or `avg_review`; anything else is ignored
    #[serde(rename = "sortColumn")]
    pub sort_column: Option<String>,
    /// `asc` (default) or `desc`
    #[serde(rename = "sortDirection")]
    pub sort_direction: Option<String>,
    /// Page number (default: 1). Blank or non-numeric values fall back to the default.
    #[param(value_type = Option<i64>)]
    pub page: Option<String>,
    /// Books per page
    #[param(value_type = Option<i64>)]
    pub per_page: Option<String>,
}

/// Book payload returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookResponse {
    pub id: i32,
    pub isbn: String,
    pub title: String,
    pub description: String,
    pub authors: Vec<Author>,
    pub review: ReviewSummary,
}

impl From<BookDetails> for BookResponse {
    fn from(details: BookDetails) -> Self {
        let review = ReviewSummary::from_ratings(&details.ratings);
        let BookDetails { book, authors, .. } = details;
        Self {
            id: book.id,
            isbn: book.isbn,
            title: book.title,
            description: book.description,
            authors,
            review,
        }
    }
}

/// One page of the book collection
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookPage {
    pub data: Vec<BookResponse>,
    /// Number of books matching the filters
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub last_page: i64,
}

impl BookPage {
    pub fn new(data: Vec<BookResponse>, total: i64, page: i64, per_page: i64) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            (total + per_page - 1) / per_page
        };
        Self {
            data,
            total,
            page,
            per_page,
            last_page,
        }
    }
}
