//! Joins catalog pages with rating summaries.
//!
//! Rating orders only reorder the page the catalog selected by creation time;
//! they never change which books land on a page.

use shelf_db::DocumentId;
use shelf_http::Result;

use super::catalog::BookCatalog;
use super::models::{Book, BookFilter, BookSort, BookWithRating, Page};
use crate::modules::reviews::aggregator::{RatingAggregator, RatingSummary};

/// Parsed listing request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListQuery {
    pub filter: BookFilter,
    pub sort: BookSort,
    pub page: u64,
}

#[derive(Clone)]
pub struct ListingPipeline {
    catalog: BookCatalog,
    ratings: RatingAggregator,
}

impl ListingPipeline {
    pub fn new(catalog: BookCatalog, ratings: RatingAggregator) -> Self {
        Self { catalog, ratings }
    }

    pub async fn list(&self, query: ListQuery) -> Result<Page<BookWithRating>> {
        let page = query.page.max(1);
        let listed = self.catalog.list(query.filter, query.sort, page).await?;

        let ids: Vec<DocumentId> = listed.items.iter().map(|book| book.id).collect();
        let mut summaries = self.ratings.summarize(&ids).await?;

        let mut items: Vec<BookWithRating> = listed
            .items
            .into_iter()
            .map(|book| {
                let summary = summaries
                    .remove(&book.id)
                    .unwrap_or_else(|| RatingSummary::unrated(book.id));
                with_rating(book, summary)
            })
            .collect();

        // sort_by is stable, so equal ratings keep the catalog order
        match query.sort {
            BookSort::RatingDesc => {
                items.sort_by(|a, b| b.average_rating.total_cmp(&a.average_rating))
            }
            BookSort::RatingAsc => {
                items.sort_by(|a, b| a.average_rating.total_cmp(&b.average_rating))
            }
            _ => {}
        }

        Ok(Page {
            page,
            page_count: listed.page_count,
            total: listed.total,
            items,
        })
    }

    /// One book merged with its rating summary.
    pub async fn detail(&self, id: DocumentId) -> Result<BookWithRating> {
        let book = self.catalog.get(id).await?;
        let summary = self.ratings.summarize_one(id).await?;
        Ok(with_rating(book, summary))
    }
}

fn with_rating(book: Book, summary: RatingSummary) -> BookWithRating {
    BookWithRating {
        book,
        average_rating: summary.average_rating,
        reviews_count: summary.review_count,
    }
}
