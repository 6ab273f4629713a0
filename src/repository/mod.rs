//! Repository layer for database operations

pub mod memory;
pub mod postgres;
pub mod query;

use async_trait::async_trait;

use crate::{
    error::AppResult,
    models::{BookDetails, CreateBook, CreateReview, Review},
};

pub use memory::MemoryRepository;
pub use postgres::PgRepository;
pub use query::{BookQuery, PageRequest};

/// Storage operations behind the catalog service.
///
/// Every write is atomic: either all of its rows are stored or none.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Repository: Send + Sync {
    /// Check that the store answers
    async fn ping(&self) -> AppResult<()>;

    /// Books matching `query`, one page of them, plus the total number of matches
    async fn books_search(&self, query: &BookQuery, page: &PageRequest) -> AppResult<(Vec<BookDetails>, i64)>;

    /// Book by id with its authors and ratings
    async fn books_get_by_id(&self, id: i32) -> AppResult<BookDetails>;

    async fn books_exists(&self, id: i32) -> AppResult<bool>;

    /// Insert a book and attach its authors
    async fn books_create(&self, data: &CreateBook) -> AppResult<BookDetails>;

    /// Insert a review of `book_id` written by `user_id`
    async fn reviews_create(&self, book_id: i32, user_id: i32, data: &CreateReview) -> AppResult<Review>;
}
