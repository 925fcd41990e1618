//! Review persistence: one review per (book, user), maintained by atomic upsert.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use shelf_db::{timestamp, Database, DbError, DocumentId};
use shelf_http::{extract::validation_failed, AppError, Result};
use sqlx::SqlitePool;
use time::OffsetDateTime;
use tracing::{debug, info};
use validator::Validate;

use super::models::{
    Review, ReviewAuthor, ReviewPatch, ReviewWithAuthor, MAX_RATING, MIN_RATING, REVIEW_COLUMNS,
};
use crate::utils::{timestamp_after, trimmed};

/// Resolves user ids to the names shown next to their reviews.
#[async_trait]
pub trait AuthorDirectory: Send + Sync {
    /// Names of the given users. Unknown ids are left out of the map.
    async fn display_names(&self, user_ids: &[DocumentId]) -> Result<HashMap<DocumentId, String>>;
}

#[derive(Clone)]
pub struct ReviewStore {
    pool: SqlitePool,
    authors: Arc<dyn AuthorDirectory>,
}

impl ReviewStore {
    pub fn new(db: &Database, authors: Arc<dyn AuthorDirectory>) -> Self {
        Self {
            pool: db.pool().clone(),
            authors,
        }
    }

    /// Create the caller's review of a book, or replace its rating and text.
    ///
    /// A single statement against the `(book_id, user_id)` unique key, so
    /// concurrent calls for the same pair leave exactly one review behind.
    pub async fn upsert(
        &self,
        book_id: DocumentId,
        user_id: DocumentId,
        rating: i64,
        review_text: Option<String>,
    ) -> Result<Review> {
        let rating = checked_rating(rating)?;
        let candidate = DocumentId::generate();
        let now = timestamp::to_column(OffsetDateTime::now_utc());

        let sql = format!(
            "INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT (book_id, user_id) DO UPDATE SET
                 rating = excluded.rating,
                 review_text = excluded.review_text,
                 updated_at = MAX(excluded.updated_at, reviews.updated_at + 1)
             RETURNING {REVIEW_COLUMNS}"
        );
        let review: Review = sqlx::query_as(&sql)
            .bind(candidate)
            .bind(book_id)
            .bind(user_id)
            .bind(rating)
            .bind(trimmed(review_text))
            .bind(now)
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;

        debug!(
            review_id = %review.id,
            %book_id,
            %user_id,
            inserted = review.id == candidate,
            "review saved"
        );
        Ok(review)
    }

    /// Insert a fully-formed review. A second review for the same pair is a conflict.
    pub async fn insert(&self, review: Review) -> Result<Review> {
        checked_rating(i64::from(review.rating))?;

        let sql = format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?)");
        sqlx::query(&sql)
            .bind(review.id)
            .bind(review.book_id)
            .bind(review.user_id)
            .bind(review.rating)
            .bind(&review.review_text)
            .bind(timestamp::to_column(review.created_at))
            .bind(timestamp::to_column(review.updated_at))
            .execute(&self.pool)
            .await
            .map_err(|e| duplicate_review(e.into()))?;
        Ok(review)
    }

    /// Reviews of a book, newest first, each with its author's name.
    pub async fn list_by_book(&self, book_id: DocumentId) -> Result<Vec<ReviewWithAuthor>> {
        let sql = format!(
            "SELECT {REVIEW_COLUMNS} FROM reviews WHERE book_id = ?
             ORDER BY created_at DESC, id DESC"
        );
        let reviews: Vec<Review> = sqlx::query_as(&sql)
            .bind(book_id)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        let user_ids: Vec<DocumentId> = reviews
            .iter()
            .map(|r| r.user_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let names = if user_ids.is_empty() {
            HashMap::new()
        } else {
            self.authors.display_names(&user_ids).await?
        };

        Ok(reviews
            .into_iter()
            .map(|review| {
                let user = ReviewAuthor {
                    id: review.user_id,
                    name: names.get(&review.user_id).cloned(),
                };
                ReviewWithAuthor { review, user }
            })
            .collect())
    }

    pub async fn get(&self, id: DocumentId) -> Result<Review> {
        let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?");
        sqlx::query_as::<_, Review>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| AppError::not_found("Review not found"))
    }

    /// Apply a partial update on behalf of the review's author.
    pub async fn update(
        &self,
        id: DocumentId,
        requester: DocumentId,
        patch: ReviewPatch,
    ) -> Result<Review> {
        patch.validate().map_err(validation_failed)?;
        let rating = patch.rating.as_set().copied().map(checked_rating).transpose()?;

        let mut review = self.get(id).await?;
        ensure_author(&review, requester)?;

        if let Some(rating) = rating {
            review.rating = rating;
        }
        patch
            .review_text
            .map(|t| t.trim().to_string())
            .apply_to(&mut review.review_text);
        if review.review_text.as_deref() == Some("") {
            review.review_text = None;
        }
        review.updated_at = timestamp_after(review.updated_at);

        let updated = sqlx::query(
            "UPDATE reviews SET rating = ?, review_text = ?, updated_at = ? WHERE id = ?",
        )
        .bind(review.rating)
        .bind(&review.review_text)
        .bind(timestamp::to_column(review.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Review not found"));
        }
        Ok(review)
    }

    /// Delete a review on behalf of its author.
    pub async fn delete(&self, id: DocumentId, requester: DocumentId) -> Result<()> {
        let existing = self.get(id).await?;
        ensure_author(&existing, requester)?;

        let deleted = sqlx::query("DELETE FROM reviews WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found("Review not found"));
        }
        info!(review_id = %id, book_id = %existing.book_id, "review deleted");
        Ok(())
    }

    /// Remove every review of a book, returning how many were removed.
    pub async fn delete_all_for_book(&self, book_id: DocumentId) -> Result<u64> {
        let deleted = sqlx::query("DELETE FROM reviews WHERE book_id = ?")
            .bind(book_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(deleted.rows_affected())
    }
}

fn checked_rating(rating: i64) -> Result<u8> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(AppError::invalid_field(
            "rating",
            "range",
            format!("Rating must be between {} and {}", MIN_RATING, MAX_RATING),
        ));
    }
    u8::try_from(rating).map_err(|e| AppError::Internal(e.into()))
}

fn ensure_author(review: &Review, requester: DocumentId) -> Result<()> {
    if review.user_id != requester {
        return Err(AppError::forbidden("Forbidden"));
    }
    Ok(())
}

fn duplicate_review(err: DbError) -> AppError {
    if err.is_duplicate_key() {
        AppError::conflict(Vec::new(), "Duplicate review")
    } else {
        err.into()
    }
}
