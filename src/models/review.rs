//! Book review model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Stored review, also the payload returned on creation
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Review {
    pub id: i32,
    pub book_id: i32,
    pub user_id: i32,
    /// Rating from 1 to 10
    pub review: i32,
    pub comment: String,
    pub created_at: DateTime<Utc>,
}

/// Create review request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateReview {
    #[validate(range(min = 1, max = 10, message = "Review must be between 1 and 10"))]
    pub review: i32,
    #[validate(length(min = 1, max = 5000, message = "Comment must be 1 to 5000 characters"))]
    pub comment: String,
}

/// Aggregate over a book's ratings, as shown in book payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReviewSummary {
    /// Rounded mean rating, null when the book has no review
    pub avg: Option<i64>,
    pub count: i64,
}

impl ReviewSummary {
    pub fn from_ratings(ratings: &[i32]) -> Self {
        let count = ratings.len() as i64;
        let avg = if count == 0 {
            None
        } else {
            let sum: i64 = ratings.iter().map(|&r| i64::from(r)).sum();
            Some((sum as f64 / count as f64).round() as i64)
        };
        Self { avg, count }
    }
}
