use serde::{Deserialize, Serialize};
use shelf_db::{timestamp, DocumentId};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use time::OffsetDateTime;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::utils::{not_blank, Patch};

/// Book record owned by the user who created it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: DocumentId,
    pub title: String,
    pub author: String,
    pub description: String,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub cover_url: Option<String>,
    pub owner_id: DocumentId,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Columns selected for a [`Book`]
pub const BOOK_COLUMNS: &str =
    "id, title, author, description, genre, year, cover_url, owner_id, created_at, updated_at";

impl<'r> FromRow<'r, SqliteRow> for Book {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            author: row.try_get("author")?,
            description: row.try_get("description")?,
            genre: row.try_get("genre")?,
            year: row.try_get("year")?,
            cover_url: row.try_get("cover_url")?,
            owner_id: row.try_get("owner_id")?,
            created_at: timestamp::from_row(row, "created_at")?,
            updated_at: timestamp::from_row(row, "updated_at")?,
        })
    }
}

/// Case-folded form used by the `q` and `genre` filters
pub fn folded(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Request model for creating a new book.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateBook {
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[validate(custom(function = "not_blank"))]
    pub author: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub genre: Option<String>,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub year: Option<i32>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

/// Partial update of a book. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub author: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub genre: Patch<String>,
    #[serde(default)]
    pub year: Patch<i32>,
    #[serde(default)]
    pub cover_url: Patch<String>,
}

impl Validate for BookPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        for (field, value) in [("title", &self.title), ("author", &self.author)] {
            match value {
                Patch::Absent => {}
                Patch::Clear => errors.add(field, ValidationError::new("required")),
                Patch::Set(text) => {
                    if let Err(e) = not_blank(text) {
                        errors.add(field, e);
                    }
                }
            }
        }
        if matches!(self.year, Patch::Set(year) if year < 0) {
            errors.add("year", ValidationError::new("range"));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Listing order applied by the catalog or, for ratings, after the join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BookSort {
    #[default]
    CreatedDesc,
    YearDesc,
    YearAsc,
    RatingDesc,
    RatingAsc,
}

impl BookSort {
    /// Parse the `sort` query value. Unknown values fall back to the default order.
    pub fn from_param(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("year_desc") => BookSort::YearDesc,
            Some("year_asc") => BookSort::YearAsc,
            Some("rating_desc") => BookSort::RatingDesc,
            Some("rating_asc") => BookSort::RatingAsc,
            _ => BookSort::CreatedDesc,
        }
    }

    pub fn as_param(self) -> &'static str {
        match self {
            BookSort::CreatedDesc => "created_desc",
            BookSort::YearDesc => "year_desc",
            BookSort::YearAsc => "year_asc",
            BookSort::RatingDesc => "rating_desc",
            BookSort::RatingAsc => "rating_asc",
        }
    }

    pub fn is_rating(self) -> bool {
        matches!(self, BookSort::RatingDesc | BookSort::RatingAsc)
    }

    /// Order the catalog can apply itself; rating orders select pages by creation time.
    pub fn primary(self) -> Self {
        if self.is_rating() {
            BookSort::CreatedDesc
        } else {
            self
        }
    }
}

/// Catalog filter built from the `q`, `genre` and `author` query values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookFilter {
    /// Case-insensitive substring of title or author (stored lower-cased)
    pub q: Option<String>,
    /// Case-insensitive exact genre (stored lower-cased)
    pub genre: Option<String>,
    /// Exact author
    pub author: Option<String>,
}

impl BookFilter {
    /// Empty values are treated as absent.
    pub fn new(q: Option<String>, genre: Option<String>, author: Option<String>) -> Self {
        let present = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            q: present(q).map(|v| v.to_lowercase()),
            genre: present(genre).map(|v| folded(&v)),
            author: present(author),
        }
    }
}

/// Book merged with its rating summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookWithRating {
    #[serde(flatten)]
    pub book: Book,
    pub average_rating: f64,
    pub reviews_count: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub page: u64,
    pub page_count: u64,
    pub total: u64,
    pub items: Vec<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(title: &str, author: &str, genre: Option<&str>) -> Book {
        let now = OffsetDateTime::now_utc();
        Book {
            id: DocumentId::generate(),
            title: title.to_string(),
            author: author.to_string(),
            description: String::new(),
            genre: genre.map(str::to_string),
            year: None,
            cover_url: None,
            owner_id: DocumentId::generate(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn sort_param_parsing() {
        assert_eq!(BookSort::from_param(None), BookSort::CreatedDesc);
        assert_eq!(BookSort::from_param(Some("year_asc")), BookSort::YearAsc);
        assert_eq!(BookSort::from_param(Some("rating_desc")), BookSort::RatingDesc);
        assert_eq!(BookSort::from_param(Some("sideways")), BookSort::CreatedDesc);
        assert_eq!(BookSort::RatingAsc.primary(), BookSort::CreatedDesc);
        assert_eq!(BookSort::YearDesc.primary(), BookSort::YearDesc);
        assert_eq!(BookSort::YearDesc.as_param(), "year_desc");
    }

    #[test]
    fn filter_normalizes_values() {
        let filter = BookFilter::new(
            Some("ATOMIC Hab".to_string()),
            Some(" Memoir ".to_string()),
            Some("James Clear".to_string()),
        );
        assert_eq!(filter.q.as_deref(), Some("atomic hab"));
        assert_eq!(filter.genre.as_deref(), Some("memoir"));
        assert_eq!(filter.author.as_deref(), Some("James Clear"));
    }

    #[test]
    fn filter_ignores_empty_values() {
        let filter = BookFilter::new(Some(String::new()), Some(" ".to_string()), None);
        assert_eq!(filter, BookFilter::default());
    }

    #[test]
    fn create_book_requires_title_and_author() {
        let input: CreateBook =
            serde_json::from_str(r#"{"title":"  ","author":"A","year":-1}"#).unwrap();
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("title"));
        assert!(fields.contains_key("year"));
        assert!(!fields.contains_key("author"));
    }

    #[test]
    fn patch_rejects_clearing_required_fields() {
        let patch: BookPatch = serde_json::from_str(r#"{"title":null,"genre":null}"#).unwrap();
        let errors = patch.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("title"));

        let patch: BookPatch = serde_json::from_str(r#"{"genre":null,"year":1999}"#).unwrap();
        assert!(patch.validate().is_ok());
        assert_eq!(patch.genre, Patch::Clear);
        assert!(patch.title.is_absent());
    }

    #[test]
    fn book_with_rating_serializes_flat_camel_case() {
        let merged = BookWithRating {
            book: book("Dune", "Frank Herbert", None),
            average_rating: 4.5,
            reviews_count: 2,
        };
        let json = serde_json::to_value(&merged).unwrap();
        assert_eq!(json["title"], "Dune");
        assert_eq!(json["averageRating"], 4.5);
        assert_eq!(json["reviewsCount"], 2);
        assert!(json["ownerId"].is_string());
        assert!(json["createdAt"].is_string());
    }
}
