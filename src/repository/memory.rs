//! In-memory repository.
//!
//! Evaluates the same [`BookQuery`] as the Postgres repository against plain
//! vectors. Backs the router tests, which run without a database.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{
    query::{BookQuery, PageRequest, SortColumn},
    Repository,
};
use crate::{
    error::{AppError, AppResult},
    models::{Author, Book, BookDetails, CreateBook, CreateReview, Review},
};

#[derive(Default)]
struct State {
    authors: Vec<Author>,
    /// Insertion order, which is also id order
    books: Vec<Book>,
    book_authors: Vec<(i32, i32)>,
    reviews: Vec<Review>,
    next_author_id: i32,
    next_book_id: i32,
    next_review_id: i32,
}

impl State {
    fn author_ids_of(&self, book_id: i32) -> Vec<i32> {
        self.book_authors
            .iter()
            .filter(|(b, _)| *b == book_id)
            .map(|(_, a)| *a)
            .collect()
    }

    fn ratings_of(&self, book_id: i32) -> Vec<i32> {
        self.reviews
            .iter()
            .filter(|r| r.book_id == book_id)
            .map(|r| r.review)
            .collect()
    }

    fn average_rating(&self, book_id: i32) -> f64 {
        let ratings = self.ratings_of(book_id);
        if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().map(|&r| f64::from(r)).sum::<f64>() / ratings.len() as f64
        }
    }

    fn details(&self, book: &Book) -> BookDetails {
        let author_ids = self.author_ids_of(book.id);
        let mut authors: Vec<Author> = self
            .authors
            .iter()
            .filter(|a| author_ids.contains(&a.id))
            .cloned()
            .collect();
        authors.sort_by_key(|a| a.id);

        BookDetails {
            book: book.clone(),
            authors,
            ratings: self.ratings_of(book.id),
        }
    }
}

#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<State>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Authors are managed outside the API; this is how the store gets them
    pub async fn insert_author(&self, name: &str, surname: &str) -> Author {
        let mut state = self.state.write().await;
        state.next_author_id += 1;
        let author = Author {
            id: state.next_author_id,
            name: name.to_string(),
            surname: surname.to_string(),
        };
        state.authors.push(author.clone());
        author
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn books_search(&self, query: &BookQuery, page: &PageRequest) -> AppResult<(Vec<BookDetails>, i64)> {
        let state = self.state.read().await;

        let mut books: Vec<&Book> = state
            .books
            .iter()
            .filter(|b| query.matches(b, &state.author_ids_of(b.id)))
            .collect();

        // Stable sorts keep insertion order among equal keys
        if let Some(sort) = query.sort {
            match sort.column {
                // Byte order, same as the `COLLATE "C"` title sort in SQL
                SortColumn::Title => {
                    books.sort_by(|a, b| sort.direction.apply(a.title.cmp(&b.title)));
                }
                SortColumn::AvgReview => {
                    books.sort_by(|a, b| {
                        let (a, b) = (state.average_rating(a.id), state.average_rating(b.id));
                        sort.direction.apply(a.total_cmp(&b))
                    });
                }
            }
        }

        let total = books.len() as i64;
        let details = books
            .into_iter()
            .skip(usize::try_from(page.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(page.per_page).unwrap_or(0))
            .map(|b| state.details(b))
            .collect();

        Ok((details, total))
    }

    async fn books_get_by_id(&self, id: i32) -> AppResult<BookDetails> {
        let state = self.state.read().await;
        state
            .books
            .iter()
            .find(|b| b.id == id)
            .map(|b| state.details(b))
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn books_exists(&self, id: i32) -> AppResult<bool> {
        Ok(self.state.read().await.books.iter().any(|b| b.id == id))
    }

    async fn books_create(&self, data: &CreateBook) -> AppResult<BookDetails> {
        let author_ids = data.unique_author_ids();
        let mut state = self.state.write().await;

        // Everything is checked before the first mutation
        if state.books.iter().any(|b| b.isbn == data.isbn) {
            return Err(AppError::Conflict(format!(
                "Book with ISBN {} already exists",
                data.isbn
            )));
        }
        if !author_ids
            .iter()
            .all(|id| state.authors.iter().any(|a| a.id == *id))
        {
            return Err(AppError::Validation(format!(
                "Unknown author id in {:?}",
                author_ids
            )));
        }

        state.next_book_id += 1;
        let book = Book {
            id: state.next_book_id,
            isbn: data.isbn.clone(),
            title: data.title.clone(),
            description: data.description.clone(),
        };
        state.books.push(book.clone());
        for author_id in author_ids {
            state.book_authors.push((book.id, author_id));
        }

        Ok(state.details(&book))
    }

    async fn reviews_create(&self, book_id: i32, user_id: i32, data: &CreateReview) -> AppResult<Review> {
        let mut state = self.state.write().await;

        if !state.books.iter().any(|b| b.id == book_id) {
            return Err(AppError::NotFound(format!("Book with id {} not found", book_id)));
        }

        state.next_review_id += 1;
        let review = Review {
            id: state.next_review_id,
            book_id,
            user_id,
            review: data.review,
            comment: data.comment.clone(),
            created_at: Utc::now(),
        };
        state.reviews.push(review.clone());
        Ok(review)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::query::{apply_author_filter, apply_sort, apply_title_filter};

    fn create_book(isbn: &str, title: &str, authors: Vec<i32>) -> CreateBook {
        CreateBook {
            isbn: isbn.to_string(),
            title: title.to_string(),
            description: format!("About {}", title),
            authors,
        }
    }

    fn review(rating: i32) -> CreateReview {
        CreateReview {
            review: rating,
            comment: "ok".to_string(),
        }
    }

    fn all() -> PageRequest {
        PageRequest::new(None, Some(100), 15, 100)
    }

    async fn titles(repo: &MemoryRepository, query: BookQuery) -> Vec<String> {
        let (books, _) = repo.books_search(&query, &all()).await.unwrap();
        books.into_iter().map(|d| d.book.title).collect()
    }

    /// Three authors; "Dune" (1,2) rated 3 and 5, "Emma" (3) unrated, "Dune Messiah" (1) rated 2
    async fn seeded() -> MemoryRepository {
        let repo = MemoryRepository::new();
        repo.insert_author("Frank", "Herbert").await;
        repo.insert_author("Brian", "Herbert").await;
        repo.insert_author("Jane", "Austen").await;

        let dune = repo.books_create(&create_book("1", "Dune", vec![1, 2])).await.unwrap();
        let emma = repo.books_create(&create_book("2", "Emma", vec![3])).await.unwrap();
        let messiah = repo
            .books_create(&create_book("3", "Dune Messiah", vec![1]))
            .await
            .unwrap();
        assert_eq!((dune.book.id, emma.book.id, messiah.book.id), (1, 2, 3));

        repo.reviews_create(1, 9, &review(3)).await.unwrap();
        repo.reviews_create(1, 9, &review(5)).await.unwrap();
        repo.reviews_create(3, 9, &review(2)).await.unwrap();
        repo
    }

    #[tokio::test]
    async fn created_book_has_its_authors_once_and_no_reviews() {
        let repo = MemoryRepository::new();
        repo.insert_author("Frank", "Herbert").await;
        repo.insert_author("Brian", "Herbert").await;

        let created = repo
            .books_create(&create_book("1", "Dune", vec![2, 1, 2]))
            .await
            .unwrap();
        let fetched = repo.books_get_by_id(created.book.id).await.unwrap();

        assert_eq!(fetched.authors.iter().map(|a| a.id).collect::<Vec<_>>(), vec![1, 2]);
        assert!(fetched.ratings.is_empty());
    }

    #[tokio::test]
    async fn unknown_author_rejects_without_partial_write() {
        let repo = MemoryRepository::new();
        repo.insert_author("Frank", "Herbert").await;

        let err = repo
            .books_create(&create_book("1", "Dune", vec![1, 99]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(!repo.books_exists(1).await.unwrap());
        assert!(titles(&repo, BookQuery::default()).await.is_empty());
    }

    #[tokio::test]
    async fn duplicate_isbn_conflicts() {
        let repo = MemoryRepository::new();
        repo.insert_author("Frank", "Herbert").await;
        repo.books_create(&create_book("1", "Dune", vec![1])).await.unwrap();

        let err = repo
            .books_create(&create_book("1", "Dune again", vec![1]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn review_of_missing_book_is_not_found() {
        let repo = MemoryRepository::new();
        let err = repo.reviews_create(4, 1, &review(3)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn unfiltered_search_is_in_insertion_order() {
        let repo = seeded().await;
        assert_eq!(titles(&repo, BookQuery::default()).await, vec!["Dune", "Emma", "Dune Messiah"]);
        assert_eq!(
            titles(&repo, apply_sort(BookQuery::default(), Some("isbn"), Some("desc"))).await,
            vec!["Dune", "Emma", "Dune Messiah"]
        );
    }

    #[tokio::test]
    async fn title_and_author_filters_narrow_results() {
        let repo = seeded().await;

        let dune = apply_title_filter(BookQuery::default(), Some("Dune"));
        assert_eq!(titles(&repo, dune).await, vec!["Dune", "Dune Messiah"]);

        let by_brian_or_jane = apply_author_filter(BookQuery::default(), Some("2,3"));
        assert_eq!(titles(&repo, by_brian_or_jane).await, vec!["Dune", "Emma"]);

        let both = apply_title_filter(apply_author_filter(BookQuery::default(), Some("3")), Some("Dune"));
        assert!(titles(&repo, both).await.is_empty());
    }

    #[tokio::test]
    async fn sorts_by_average_review_coalescing_missing_to_zero() {
        let repo = seeded().await;

        let asc = apply_sort(BookQuery::default(), Some("avg_review"), None);
        assert_eq!(titles(&repo, asc).await, vec!["Emma", "Dune Messiah", "Dune"]);

        let desc = apply_sort(BookQuery::default(), Some("avg_review"), Some("DESC"));
        assert_eq!(titles(&repo, desc).await, vec!["Dune", "Dune Messiah", "Emma"]);
    }

    #[tokio::test]
    async fn sorts_by_title_in_both_directions() {
        let repo = seeded().await;

        let desc = apply_sort(BookQuery::default(), Some("title"), Some("desc"));
        assert_eq!(titles(&repo, desc).await, vec!["Emma", "Dune Messiah", "Dune"]);

        let asc = apply_sort(BookQuery::default(), Some("title"), Some("asc"));
        assert_eq!(titles(&repo, asc).await, vec!["Dune", "Dune Messiah", "Emma"]);
    }

    #[tokio::test]
    async fn title_sort_is_byte_order() {
        let repo = seeded().await;
        repo.books_create(&create_book("4", "anthem", vec![3])).await.unwrap();

        let asc = apply_sort(BookQuery::default(), Some("title"), None);
        assert_eq!(titles(&repo, asc).await, vec!["Dune", "Dune Messiah", "Emma", "anthem"]);
    }

    #[tokio::test]
    async fn pages_through_matches_and_reports_total() {
        let repo = seeded().await;

        let page = PageRequest::new(Some(2), Some(2), 15, 100);
        let (books, total) = repo.books_search(&BookQuery::default(), &page).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].book.title, "Dune Messiah");

        let page = PageRequest::new(Some(5), Some(2), 15, 100);
        let (books, total) = repo.books_search(&BookQuery::default(), &page).await.unwrap();
        assert_eq!(total, 3);
        assert!(books.is_empty());
    }
}
