//! Data models for Bookshelf

pub mod author;
pub mod book;
pub mod review;
pub mod user;

// Re-export commonly used types
pub use author::Author;
pub use book::{Book, BookDetails, BookListParams, BookPage, BookResponse, CreateBook};
pub use review::{CreateReview, Review, ReviewSummary};
pub use user::UserClaims;
