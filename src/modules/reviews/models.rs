use serde::{Deserialize, Serialize};
use shelf_db::{timestamp, DocumentId};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use time::OffsetDateTime;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::utils::Patch;

/// Columns selected for a [`Review`], in table order
pub const REVIEW_COLUMNS: &str = "id, book_id, user_id, rating, review_text, created_at, updated_at";

pub const MIN_RATING: i64 = 1;
pub const MAX_RATING: i64 = 5;

/// A user's rating of a book. At most one exists per (book, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: DocumentId,
    pub book_id: DocumentId,
    pub user_id: DocumentId,
    pub rating: u8,
    pub review_text: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl<'r> FromRow<'r, SqliteRow> for Review {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            book_id: row.try_get("book_id")?,
            user_id: row.try_get("user_id")?,
            rating: row.try_get("rating")?,
            review_text: row.try_get("review_text")?,
            created_at: timestamp::from_row(row, "created_at")?,
            updated_at: timestamp::from_row(row, "updated_at")?,
        })
    }
}

/// Body of an add-or-replace review request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewInput {
    #[validate(range(min = 1, max = 5))]
    pub rating: i64,
    #[serde(default)]
    pub review_text: Option<String>,
}

/// Partial update of a review
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewPatch {
    #[serde(default)]
    pub rating: Patch<i64>,
    #[serde(default)]
    pub review_text: Patch<String>,
}

impl Validate for ReviewPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        match self.rating {
            Patch::Absent => {}
            Patch::Clear => errors.add("rating", ValidationError::new("required")),
            Patch::Set(rating) => {
                if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                    errors.add("rating", ValidationError::new("range"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Author reference attached to listed reviews
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewAuthor {
    pub id: DocumentId,
    pub name: Option<String>,
}

/// Review as returned by the per-book listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewWithAuthor {
    #[serde(flatten)]
    pub review: Review,
    pub user: ReviewAuthor,
}
