//! Book collection query composition.
//!
//! A [`BookQuery`] starts as "all books" and is narrowed by independent pure
//! functions, one per request parameter. Each function only acts when its
//! parameter is filled (present and not blank once trimmed), so any subset of
//! parameters, including none, composes to a valid query. The same value is
//! rendered to SQL for Postgres and evaluated directly by the in-memory store.

use std::cmp::Ordering;

use sqlx::{Postgres, QueryBuilder};

use crate::models::{Book, BookListParams};

/// Ordering column accepted by `sortColumn`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    /// Mean review rating, 0 for books without reviews
    AvgReview,
    Title,
}

impl SortColumn {
    /// Unknown names yield `None`; they are ignored rather than rejected.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "avg_review" => Some(SortColumn::AvgReview),
            "title" => Some(SortColumn::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Descending only for a case-insensitive `desc`
    pub fn parse(direction: Option<&str>) -> Self {
        match direction {
            Some(d) if d.trim().eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Orient an ascending comparison
    pub fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookSort {
    pub column: SortColumn,
    pub direction: SortDirection,
}

/// Filters and ordering for the book collection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookQuery {
    /// Literal substring the title must contain
    pub title: Option<String>,
    /// Books must have at least one of these authors. An empty set matches nothing.
    pub author_ids: Option<Vec<i32>>,
    pub sort: Option<BookSort>,
}

/// Requested page, already clamped to sane bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub per_page: i64,
}

impl PageRequest {
    pub fn new(page: Option<i64>, per_page: Option<i64>, default_per_page: i64, max_per_page: i64) -> Self {
        let max_per_page = max_per_page.max(1);
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.unwrap_or(default_per_page).clamp(1, max_per_page),
        }
    }

    /// Lenient variant for raw query values: blank or unparsable numbers use the defaults
    pub fn from_params(page: Option<&str>, per_page: Option<&str>, default_per_page: i64, max_per_page: i64) -> Self {
        let number = |value: Option<&str>| filled(value).and_then(|v| v.parse::<i64>().ok());
        Self::new(number(page), number(per_page), default_per_page, max_per_page)
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

fn filled(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Restrict to titles containing `title`
#[must_use]
pub fn apply_title_filter(query: BookQuery, title: Option<&str>) -> BookQuery {
    match filled(title) {
        Some(title) => BookQuery {
            title: Some(title.to_string()),
            ..query
        },
        None => query,
    }
}

/// Restrict to books written by any author of the comma separated id list
#[must_use]
pub fn apply_author_filter(query: BookQuery, authors_csv: Option<&str>) -> BookQuery {
    match filled(authors_csv) {
        Some(csv) => BookQuery {
            author_ids: Some(parse_author_ids(csv)),
            ..query
        },
        None => query,
    }
}

/// Order by `sort_column` when it names a known column
#[must_use]
pub fn apply_sort(query: BookQuery, sort_column: Option<&str>, sort_direction: Option<&str>) -> BookQuery {
    let Some(column) = filled(sort_column).and_then(SortColumn::parse) else {
        return query;
    };
    BookQuery {
        sort: Some(BookSort {
            column,
            direction: SortDirection::parse(sort_direction),
        }),
        ..query
    }
}

/// Non-numeric tokens are dropped
fn parse_author_ids(csv: &str) -> Vec<i32> {
    csv.split(',')
        .filter_map(|token| token.trim().parse::<i32>().ok())
        .collect()
}

/// Escape LIKE metacharacters so `input` matches literally
fn like_pattern(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() + 2);
    pattern.push('%');
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

const AVG_REVIEW_SQL: &str =
    "COALESCE((SELECT AVG(r.review)::float8 FROM book_reviews r WHERE r.book_id = b.id), 0)";

impl BookQuery {
    pub fn from_params(params: &BookListParams) -> Self {
        let query = BookQuery::default();
        let query = apply_title_filter(query, params.title.as_deref());
        let query = apply_author_filter(query, params.authors.as_deref());
        apply_sort(
            query,
            params.sort_column.as_deref(),
            params.sort_direction.as_deref(),
        )
    }

    /// Append the WHERE clause; the builder must select from `books b`
    pub fn push_filters(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" WHERE TRUE");

        if let Some(ref title) = self.title {
            builder
                .push(" AND b.title LIKE ")
                .push_bind(like_pattern(title))
                .push(" ESCAPE '\\'");
        }

        if let Some(ref author_ids) = self.author_ids {
            builder
                .push(" AND EXISTS (SELECT 1 FROM book_author ba WHERE ba.book_id = b.id AND ba.author_id = ANY(")
                .push_bind(author_ids.clone())
                .push("))");
        }
    }

    /// Append the ORDER BY clause. Insertion order breaks ties and is the default order.
    pub fn push_order_by(&self, builder: &mut QueryBuilder<'_, Postgres>) {
        builder.push(" ORDER BY ");

        if let Some(sort) = self.sort {
            let column = match sort.column {
                SortColumn::AvgReview => AVG_REVIEW_SQL,
                // Byte order, independent of the database locale
                SortColumn::Title => "b.title COLLATE \"C\"",
            };
            builder
                .push(column)
                .push(" ")
                .push(sort.direction.as_sql())
                .push(", ");
        }

        builder.push("b.id ASC");
    }

    /// Whether `book`, written by `author_ids`, passes the filters
    pub fn matches(&self, book: &Book, author_ids: &[i32]) -> bool {
        if let Some(ref title) = self.title {
            if !book.title.contains(title.as_str()) {
                return false;
            }
        }

        if let Some(ref wanted) = self.author_ids {
            if !author_ids.iter().any(|id| wanted.contains(id)) {
                return false;
            }
        }

        true
    }
}
