//! PostgreSQL repository

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, QueryBuilder, Row};

use super::{
    query::{BookQuery, PageRequest},
    Repository,
};
use crate::{
    error::{AppError, AppResult},
    models::{Author, Book, BookDetails, CreateBook, CreateReview, Review},
};

#[derive(Clone)]
pub struct PgRepository {
    pool: Pool<Postgres>,
}

impl PgRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Load authors and ratings for a batch of books, two queries for the whole batch
    async fn load_relations(&self, books: Vec<Book>) -> AppResult<Vec<BookDetails>> {
        if books.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<i32> = books.iter().map(|b| b.id).collect();

        let author_rows = sqlx::query(
            r#"
            SELECT ba.book_id, a.id, a.name, a.surname
            FROM book_author ba
            JOIN authors a ON a.id = ba.author_id
            WHERE ba.book_id = ANY($1)
            ORDER BY a.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let authors = author_rows
            .iter()
            .map(|r| {
                (
                    r.get::<i32, _>("book_id"),
                    Author {
                        id: r.get("id"),
                        name: r.get("name"),
                        surname: r.get("surname"),
                    },
                )
            })
            .collect();

        let ratings = sqlx::query_as::<_, (i32, i32)>(
            "SELECT book_id, review FROM book_reviews WHERE book_id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(attach_relations(books, authors, ratings))
    }
}

/// Group `(book_id, author)` and `(book_id, rating)` rows under their books, keeping book order
fn attach_relations(
    books: Vec<Book>,
    authors: Vec<(i32, Author)>,
    ratings: Vec<(i32, i32)>,
) -> Vec<BookDetails> {
    let mut authors_by_book: HashMap<i32, Vec<Author>> = HashMap::new();
    for (book_id, author) in authors {
        authors_by_book.entry(book_id).or_default().push(author);
    }

    let mut ratings_by_book: HashMap<i32, Vec<i32>> = HashMap::new();
    for (book_id, rating) in ratings {
        ratings_by_book.entry(book_id).or_default().push(rating);
    }

    books
        .into_iter()
        .map(|book| BookDetails {
            authors: authors_by_book.remove(&book.id).unwrap_or_default(),
            ratings: ratings_by_book.remove(&book.id).unwrap_or_default(),
            book,
        })
        .collect()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn books_search(&self, query: &BookQuery, page: &PageRequest) -> AppResult<(Vec<BookDetails>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books b");
        query.push_filters(&mut count);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT b.id, b.isbn, b.title, b.description FROM books b",
        );
        query.push_filters(&mut select);
        query.push_order_by(&mut select);
        select
            .push(" LIMIT ")
            .push_bind(page.per_page)
            .push(" OFFSET ")
            .push_bind(page.offset());

        let books = select
            .build_query_as::<Book>()
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(total, returned = books.len(), "Book search");

        Ok((self.load_relations(books).await?, total))
    }

    async fn books_get_by_id(&self, id: i32) -> AppResult<BookDetails> {
        let book = sqlx::query_as::<_, Book>(
            "SELECT id, isbn, title, description FROM books WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        self.load_relations(vec![book])
            .await?
            .pop()
            .ok_or_else(|| AppError::Internal("Book relations lost".to_string()))
    }

    async fn books_exists(&self, id: i32) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    async fn books_create(&self, data: &CreateBook) -> AppResult<BookDetails> {
        let author_ids = data.unique_author_ids();
        let mut tx = self.pool.begin().await?;

        let book = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (isbn, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, isbn, title, description
            "#,
        )
        .bind(&data.isbn)
        .bind(&data.title)
        .bind(&data.description)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Book with ISBN {} already exists", data.isbn))
            } else {
                AppError::Database(e)
            }
        })?;

        sqlx::query(
            "INSERT INTO book_author (book_id, author_id) SELECT $1, UNNEST($2::int4[])",
        )
        .bind(book.id)
        .bind(&author_ids)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::Validation(format!("Unknown author id in {:?}", author_ids))
            } else {
                AppError::Database(e)
            }
        })?;

        let authors = sqlx::query_as::<_, Author>(
            r#"
            SELECT a.id, a.name, a.surname
            FROM authors a
            JOIN book_author ba ON ba.author_id = a.id
            WHERE ba.book_id = $1
            ORDER BY a.id
            "#,
        )
        .bind(book.id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::info!(book_id = book.id, authors = authors.len(), "Book created");

        Ok(BookDetails {
            book,
            authors,
            ratings: Vec::new(),
        })
    }

    async fn reviews_create(&self, book_id: i32, user_id: i32, data: &CreateReview) -> AppResult<Review> {
        let mut tx = self.pool.begin().await?;

        let review = sqlx::query_as::<_, Review>(
            r#"
            INSERT INTO book_reviews (book_id, user_id, review, comment, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, book_id, user_id, review, comment, created_at
            "#,
        )
        .bind(book_id)
        .bind(user_id)
        .bind(data.review)
        .bind(&data.comment)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound(format!("Book with id {} not found", book_id))
            } else {
                AppError::Database(e)
            }
        })?;

        tx.commit().await?;

        tracing::info!(review_id = review.id, book_id, user_id, "Review created");

        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: i32) -> Book {
        Book {
            id,
            isbn: id.to_string(),
            title: format!("Book {}", id),
            description: String::new(),
        }
    }

    fn author(id: i32) -> Author {
        Author {
            id,
            name: format!("Name {}", id),
            surname: format!("Surname {}", id),
        }
    }

    #[test]
    fn attach_relations_groups_rows_by_book() {
        let details = attach_relations(
            vec![book(2), book(1), book(3)],
            vec![(1, author(10)), (2, author(11)), (1, author(12))],
            vec![(2, 4), (2, 5), (3, 1)],
        );

        assert_eq!(
            details.iter().map(|d| d.book.id).collect::<Vec<_>>(),
            vec![2, 1, 3]
        );
        assert_eq!(details[0].authors, vec![author(11)]);
        assert_eq!(details[0].ratings, vec![4, 5]);
        assert_eq!(details[1].authors, vec![author(10), author(12)]);
        assert!(details[1].ratings.is_empty());
        assert!(details[2].authors.is_empty());
        assert_eq!(details[2].ratings, vec![1]);
    }
}
