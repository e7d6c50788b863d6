//! Book (catalog entry) model and related types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Shelf status of a catalog entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    OnShelf,
    OffShelf,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::OnShelf => "on_shelf",
            BookStatus::OffShelf => "off_shelf",
        }
    }

    /// Parse a stored value or one of its display synonyms
    pub fn parse_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "on_shelf" | "on shelf" | "on-shelf" => Some(BookStatus::OnShelf),
            "off_shelf" | "off shelf" | "off-shelf" => Some(BookStatus::OffShelf),
            _ => None,
        }
    }
}

impl Default for BookStatus {
    fn default() -> Self {
        BookStatus::OnShelf
    }
}

impl std::fmt::Display for BookStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Book row joined with its category name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: String,
    pub publish_date: Option<NaiveDate>,
    pub description: String,
    pub category_id: Option<i32>,
    pub category_name: Option<String>,
    pub location: String,
    /// Count of active copies (derived)
    pub total_copies: i32,
    /// Active copies minus open borrows (derived)
    pub available_copies: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn shelf_status(&self) -> BookStatus {
        BookStatus::parse_token(&self.status).unwrap_or(BookStatus::OffShelf)
    }

    pub fn can_borrow(&self) -> bool {
        self.shelf_status() == BookStatus::OnShelf && self.available_copies > 0
    }
}

/// Search filters for the catalog
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Keyword over title, author, ISBN and publisher
    pub kw: Option<String>,
    pub category: Option<i32>,
    /// Only honoured for administrators
    pub status: Option<BookStatus>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Deepest page a catalog search will serve
pub const MAX_PAGE: i64 = 100_000;

impl BookQuery {
    /// Page number clamped to `1..=MAX_PAGE`
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE)
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(20).clamp(1, 200)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "author is required"))]
    pub author: String,
    #[validate(length(min = 1, max = 32, message = "isbn is required"))]
    pub isbn: String,
    #[serde(default)]
    pub publisher: String,
    pub publish_date: Option<NaiveDate>,
    #[serde(default)]
    pub description: String,
    pub category_id: Option<i32>,
    #[serde(default)]
    pub location: String,
    /// Number of copies to create (default 1)
    pub total_copies: Option<i64>,
    pub status: Option<BookStatus>,
}

/// Partial update of a book.
///
/// `available_copies` is not accepted: it only moves through borrows and
/// `total_copies` reconciliation.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "title cannot be blank"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "author cannot be blank"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 32, message = "isbn cannot be blank"))]
    pub isbn: Option<String>,
    pub publisher: Option<String>,
    /// `null` clears the date
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<NaiveDate>)]
    pub publish_date: Option<Option<NaiveDate>>,
    pub description: Option<String>,
    /// `null` detaches the category
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub category_id: Option<Option<i32>>,
    pub location: Option<String>,
    pub status: Option<BookStatus>,
    pub total_copies: Option<i64>,
}

/// Distinguishes an absent field from an explicit `null`
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Bibliographic values written to a book row.
///
/// Shared by the catalog API and the bulk importer; counters are never part
/// of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDraft {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub publisher: String,
    pub publish_date: Option<NaiveDate>,
    pub description: String,
    pub category_id: Option<i32>,
    pub location: String,
    pub status: BookStatus,
}

impl From<&Book> for BookDraft {
    fn from(book: &Book) -> Self {
        Self {
            title: book.title.clone(),
            author: book.author.clone(),
            isbn: book.isbn.clone(),
            publisher: book.publisher.clone(),
            publish_date: book.publish_date,
            description: book.description.clone(),
            category_id: book.category_id,
            location: book.location.clone(),
            status: book.shelf_status(),
        }
    }
}

impl BookDraft {
    /// Apply a partial update; returns the new draft
    pub fn merged(mut self, update: &UpdateBook) -> Self {
        if let Some(ref v) = update.title {
            self.title = v.trim().to_string();
        }
        if let Some(ref v) = update.author {
            self.author = v.trim().to_string();
        }
        if let Some(ref v) = update.isbn {
            self.isbn = v.trim().to_string();
        }
        if let Some(ref v) = update.publisher {
            self.publisher = v.trim().to_string();
        }
        if let Some(v) = update.publish_date {
            self.publish_date = v;
        }
        if let Some(ref v) = update.description {
            self.description = v.trim().to_string();
        }
        if let Some(v) = update.category_id {
            self.category_id = v;
        }
        if let Some(ref v) = update.location {
            self.location = v.trim().to_string();
        }
        if let Some(v) = update.status {
            self.status = v;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(page: Option<i64>, per_page: Option<i64>) -> BookQuery {
        BookQuery {
            kw: None,
            category: None,
            status: None,
            page,
            per_page,
        }
    }

    #[test]
    fn test_pagination_bounds() {
        let q = query(None, None);
        assert_eq!((q.page(), q.per_page(), q.offset()), (1, 20, 0));

        let q = query(Some(3), Some(50));
        assert_eq!(q.offset(), 100);

        let q = query(Some(i64::MAX), Some(i64::MAX));
        assert_eq!(q.page(), MAX_PAGE);
        assert_eq!(q.per_page(), 200);
        assert_eq!(q.offset(), (MAX_PAGE - 1) * 200);

        let q = query(Some(i64::MIN), Some(0));
        assert_eq!((q.page(), q.per_page(), q.offset()), (1, 1, 0));
    }

    #[test]
    fn test_status_tokens() {
        assert_eq!(BookStatus::parse_token("on_shelf"), Some(BookStatus::OnShelf));
        assert_eq!(BookStatus::parse_token(" Off Shelf "), Some(BookStatus::OffShelf));
        assert_eq!(BookStatus::parse_token("lost"), None);
        assert_eq!(BookStatus::OffShelf.as_str(), "off_shelf");
    }

    #[test]
    fn test_update_distinguishes_null_from_absent() {
        let update: UpdateBook = serde_json::from_str(r#"{"publish_date": null}"#).unwrap();
        assert_eq!(update.publish_date, Some(None));
        assert_eq!(update.category_id, None);

        let update: UpdateBook = serde_json::from_str(r#"{"category_id": 4}"#).unwrap();
        assert_eq!(update.category_id, Some(Some(4)));
    }

    #[test]
    fn test_update_rejects_available_copies() {
        let result = serde_json::from_str::<UpdateBook>(r#"{"available_copies": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_merged_keeps_untouched_fields() {
        let draft = BookDraft {
            title: "Dune".into(),
            author: "Herbert".into(),
            isbn: "9780441172719".into(),
            publisher: "Ace".into(),
            publish_date: NaiveDate::from_ymd_opt(1965, 8, 1),
            description: String::new(),
            category_id: Some(2),
            location: "A-1".into(),
            status: BookStatus::OnShelf,
        };
        let update: UpdateBook =
            serde_json::from_str(r#"{"title": " Dune Messiah ", "category_id": null}"#).unwrap();
        let merged = draft.clone().merged(&update);
        assert_eq!(merged.title, "Dune Messiah");
        assert_eq!(merged.category_id, None);
        assert_eq!(merged.publisher, draft.publisher);
        assert_eq!(merged.publish_date, draft.publish_date);
    }
}
