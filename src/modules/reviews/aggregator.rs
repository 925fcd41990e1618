use std::collections::HashMap;

use serde::Serialize;
use shelf_db::{Database, DbError, DocumentId};
use shelf_http::{AppError, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Average rating and review count of one book.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingSummary {
    pub book_id: DocumentId,
    pub average_rating: f64,
    pub review_count: u64,
}

impl RatingSummary {
    /// Summary of a book nobody has reviewed yet.
    pub fn unrated(book_id: DocumentId) -> Self {
        Self {
            book_id,
            average_rating: 0.0,
            review_count: 0,
        }
    }
}

/// Mean of `sum / count` rounded half-up to two decimals; 0 when `count` is 0.
pub fn rounded_average(sum: u64, count: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let hundredths = (sum * 200 + count) / (count * 2);
    hundredths as f64 / 100.0
}

/// Computes rating summaries for batches of books straight from the stored reviews.
#[derive(Clone)]
pub struct RatingAggregator {
    pool: SqlitePool,
}

impl RatingAggregator {
    pub fn new(db: &Database) -> Self {
        Self {
            pool: db.pool().clone(),
        }
    }

    /// Summaries for the given books, from one grouped query. Books without
    /// reviews are absent from the map.
    pub async fn summarize(
        &self,
        book_ids: &[DocumentId],
    ) -> Result<HashMap<DocumentId, RatingSummary>> {
        if book_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT book_id, COUNT(*), SUM(rating) FROM reviews WHERE book_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in book_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(") GROUP BY book_id");

        let rows: Vec<(DocumentId, i64, i64)> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        rows.into_iter()
            .map(|(book_id, count, sum)| -> Result<(DocumentId, RatingSummary)> {
                let count = unsigned(count)?;
                let summary = RatingSummary {
                    book_id,
                    average_rating: rounded_average(unsigned(sum)?, count),
                    review_count: count,
                };
                Ok((book_id, summary))
            })
            .collect()
    }

    /// Summary of a single book, zeroed when it has no reviews.
    pub async fn summarize_one(&self, book_id: DocumentId) -> Result<RatingSummary> {
        Ok(self
            .summarize(&[book_id])
            .await?
            .remove(&book_id)
            .unwrap_or_else(|| RatingSummary::unrated(book_id)))
    }
}

fn unsigned(value: i64) -> Result<u64> {
    u64::try_from(value).map_err(|e| AppError::Internal(e.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::reviews::store::tests::store;
    use crate::test_database;

    #[test]
    fn averages_round_half_up_to_two_decimals() {
        assert_eq!(rounded_average(0, 0), 0.0);
        assert_eq!(rounded_average(14, 3), 4.67);
        assert_eq!(rounded_average(5, 2), 2.5);
        assert_eq!(rounded_average(9, 8), 1.13);
        assert_eq!(rounded_average(10, 3), 3.33);
        assert_eq!(rounded_average(5, 1), 5.0);
    }

    #[test]
    fn every_small_tally_averages_within_the_rating_range() {
        for count in 1..=40u64 {
            for sum in count..=5 * count {
                let average = rounded_average(sum, count);
                assert!(
                    (1.0..=5.0).contains(&average),
                    "sum {sum} count {count} gave {average}"
                );

                let exact = sum as f64 / count as f64;
                assert!(
                    (average - exact).abs() <= 0.005 + 1e-9,
                    "sum {sum} count {count} gave {average}, exact {exact}"
                );
                assert_eq!((average * 100.0).round() / 100.0, average);
            }
        }
    }

    #[tokio::test]
    async fn summarizes_only_requested_books_with_reviews() {
        let db = test_database().await;
        let reviews = store(&db);
        let aggregator = RatingAggregator::new(&db);
        let (reviewed, unreviewed, other) = (
            DocumentId::generate(),
            DocumentId::generate(),
            DocumentId::generate(),
        );

        for rating in [5, 4, 5] {
            reviews
                .upsert(reviewed, DocumentId::generate(), rating, None)
                .await
                .unwrap();
        }
        reviews
            .upsert(other, DocumentId::generate(), 1, None)
            .await
            .unwrap();

        let summaries = aggregator
            .summarize(&[reviewed, unreviewed, reviewed])
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = summaries[&reviewed];
        assert_eq!(summary.average_rating, 4.67);
        assert_eq!(summary.review_count, 3);

        assert!(aggregator.summarize(&[]).await.unwrap().is_empty());
        assert_eq!(
            aggregator.summarize_one(unreviewed).await.unwrap(),
            RatingSummary::unrated(unreviewed)
        );
    }

    #[tokio::test]
    async fn summaries_follow_replaced_reviews() {
        let db = test_database().await;
        let reviews = store(&db);
        let aggregator = RatingAggregator::new(&db);
        let (book, user) = (DocumentId::generate(), DocumentId::generate());

        reviews.upsert(book, user, 5, None).await.unwrap();
        reviews.upsert(book, user, 2, None).await.unwrap();

        let summary = aggregator.summarize_one(book).await.unwrap();
        assert_eq!(summary.average_rating, 2.0);
        assert_eq!(summary.review_count, 1);
    }
}
