//! Book records: creation, lookup, filtered paging, and owner-only changes.

use shelf_db::{timestamp, Database, DbError, DocumentId};
use shelf_http::{extract::validation_failed, AppError, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;
use tracing::{info, warn};
use validator::Validate;

use super::models::{folded, Book, BookFilter, BookPatch, BookSort, CreateBook, BOOK_COLUMNS};
use crate::modules::reviews::store::ReviewStore;
use crate::utils::{timestamp_after, trimmed, Patch};

/// Books per listing page
pub const PAGE_SIZE: u64 = 5;

/// One window of the catalog together with the size of the whole filtered set.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogPage {
    pub items: Vec<Book>,
    pub total: u64,
    pub page_count: u64,
}

/// Number of pages needed for `total` books; never less than 1.
pub fn page_count(total: u64) -> u64 {
    total.div_ceil(PAGE_SIZE).max(1)
}

#[derive(Clone)]
pub struct BookCatalog {
    pool: SqlitePool,
    reviews: ReviewStore,
}

impl BookCatalog {
    pub fn new(db: &Database, reviews: ReviewStore) -> Self {
        Self {
            pool: db.pool().clone(),
            reviews,
        }
    }

    pub async fn create(&self, input: CreateBook, owner_id: DocumentId) -> Result<Book> {
        input.validate().map_err(validation_failed)?;

        let now = OffsetDateTime::now_utc();
        let book = Book {
            id: DocumentId::generate(),
            title: input.title.trim().to_string(),
            author: input.author.trim().to_string(),
            description: input.description.unwrap_or_default(),
            genre: trimmed(input.genre),
            year: input.year,
            cover_url: trimmed(input.cover_url),
            owner_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO books (
                id, title, author, description, genre, year, cover_url, owner_id,
                title_folded, author_folded, genre_folded, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(book.id)
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.genre)
        .bind(book.year)
        .bind(&book.cover_url)
        .bind(book.owner_id)
        .bind(folded(&book.title))
        .bind(folded(&book.author))
        .bind(book.genre.as_deref().map(folded))
        .bind(timestamp::to_column(book.created_at))
        .bind(timestamp::to_column(book.updated_at))
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;

        info!(book_id = %book.id, owner_id = %owner_id, "book created");
        Ok(book)
    }

    pub async fn get(&self, id: DocumentId) -> Result<Book> {
        let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?");
        sqlx::query_as::<_, Book>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| AppError::not_found("Book not found"))
    }

    pub async fn exists(&self, id: DocumentId) -> Result<bool> {
        let found: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = ?)")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(found)
    }

    /// Total number of stored books.
    pub async fn count(&self) -> Result<u64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(total.unsigned_abs())
    }

    /// Filtered, ordered page of books. Pages start at 1; rating orders page by creation time.
    pub async fn list(&self, filter: BookFilter, sort: BookSort, page: u64) -> Result<CatalogPage> {
        let page = page.max(1);
        let offset = i64::try_from((page - 1).saturating_mul(PAGE_SIZE)).unwrap_or(i64::MAX);

        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM books");
        push_filter(&mut count, &filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(DbError::from)?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {BOOK_COLUMNS} FROM books"));
        push_filter(&mut select, &filter);
        select.push(" ORDER BY ");
        select.push(order_by(sort.primary()));
        select.push(" LIMIT ");
        select.push_bind(PAGE_SIZE as i64);
        select.push(" OFFSET ");
        select.push_bind(offset);
        let items: Vec<Book> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;

        let total = total.unsigned_abs();
        Ok(CatalogPage {
            items,
            total,
            page_count: page_count(total),
        })
    }

    /// Apply a partial update on behalf of the book's owner.
    pub async fn update(
        &self,
        id: DocumentId,
        requester: DocumentId,
        patch: BookPatch,
    ) -> Result<Book> {
        patch.validate().map_err(validation_failed)?;

        let mut book = self.get(id).await?;
        ensure_owner(&book, requester)?;
        apply_patch(&mut book, patch);

        let updated = sqlx::query(
            "UPDATE books SET
                title = ?, author = ?, description = ?, genre = ?, year = ?, cover_url = ?,
                title_folded = ?, author_folded = ?, genre_folded = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.description)
        .bind(&book.genre)
        .bind(book.year)
        .bind(&book.cover_url)
        .bind(folded(&book.title))
        .bind(folded(&book.author))
        .bind(book.genre.as_deref().map(folded))
        .bind(timestamp::to_column(book.updated_at))
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(DbError::from)?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Book not found"));
        }

        info!(book_id = %id, "book updated");
        Ok(book)
    }

    /// Delete a book and then its reviews, on behalf of the book's owner.
    ///
    /// A failure while removing reviews is logged; the book stays deleted.
    pub async fn delete(&self, id: DocumentId, requester: DocumentId) -> Result<()> {
        let existing = self.get(id).await?;
        ensure_owner(&existing, requester)?;

        let deleted = sqlx::query("DELETE FROM books WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(DbError::from)?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found("Book not found"));
        }

        match self.reviews.delete_all_for_book(id).await {
            Ok(removed) => info!(book_id = %id, reviews_removed = removed, "book deleted"),
            Err(e) => warn!(book_id = %id, error = %e, "book deleted but its reviews were not"),
        }
        Ok(())
    }
}

fn push_filter(query: &mut QueryBuilder<'_, Sqlite>, filter: &BookFilter) {
    let mut keyword = " WHERE ";
    if let Some(q) = &filter.q {
        query.push(keyword).push("(instr(title_folded, ");
        query.push_bind(q.clone());
        query.push(") > 0 OR instr(author_folded, ");
        query.push_bind(q.clone());
        query.push(") > 0)");
        keyword = " AND ";
    }
    if let Some(genre) = &filter.genre {
        query.push(keyword).push("genre_folded = ");
        query.push_bind(genre.clone());
        keyword = " AND ";
    }
    if let Some(author) = &filter.author {
        query.push(keyword).push("author = ");
        query.push_bind(author.clone());
    }
}

/// `ORDER BY` clause for the orders the catalog applies. NULL years sort lowest.
fn order_by(sort: BookSort) -> &'static str {
    match sort {
        BookSort::YearDesc => "year DESC, created_at DESC, id DESC",
        BookSort::YearAsc => "year ASC, created_at DESC, id DESC",
        BookSort::CreatedDesc | BookSort::RatingDesc | BookSort::RatingAsc => {
            "created_at DESC, id DESC"
        }
    }
}

fn ensure_owner(book: &Book, requester: DocumentId) -> Result<()> {
    if book.owner_id != requester {
        return Err(AppError::forbidden("Forbidden"));
    }
    Ok(())
}

fn apply_patch(book: &mut Book, patch: BookPatch) {
    if let Patch::Set(title) = patch.title {
        book.title = title.trim().to_string();
    }
    if let Patch::Set(author) = patch.author {
        book.author = author.trim().to_string();
    }
    match patch.description {
        Patch::Absent => {}
        Patch::Clear => book.description.clear(),
        Patch::Set(description) => book.description = description,
    }
    apply_optional_text(patch.genre, &mut book.genre);
    apply_optional_text(patch.cover_url, &mut book.cover_url);
    patch.year.apply_to(&mut book.year);
    book.updated_at = timestamp_after(book.updated_at);
}

fn apply_optional_text(patch: Patch<String>, slot: &mut Option<String>) {
    match patch {
        Patch::Set(value) => *slot = trimmed(Some(value)),
        other => other.apply_to(slot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::reviews::store::tests::store;
    use crate::test_database;
    use axum::http::StatusCode;

    async fn catalog() -> BookCatalog {
        let db = test_database().await;
        BookCatalog::new(&db, store(&db))
    }

    fn input(title: &str, year: Option<i32>) -> CreateBook {
        CreateBook {
            title: title.to_string(),
            author: "Author".to_string(),
            description: None,
            genre: None,
            year,
            cover_url: None,
        }
    }

    #[test]
    fn page_count_is_at_least_one() {
        assert_eq!(page_count(0), 1);
        assert_eq!(page_count(5), 1);
        assert_eq!(page_count(6), 2);
        assert_eq!(page_count(12), 3);
    }

    #[tokio::test]
    async fn create_trims_and_defaults_fields() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        let book = catalog
            .create(
                CreateBook {
                    title: "  Educated ".to_string(),
                    author: " Tara Westover".to_string(),
                    description: None,
                    genre: Some("  ".to_string()),
                    year: Some(2018),
                    cover_url: None,
                },
                owner,
            )
            .await
            .unwrap();

        assert_eq!(book.title, "Educated");
        assert_eq!(book.author, "Tara Westover");
        assert_eq!(book.description, "");
        assert_eq!(book.genre, None);
        assert_eq!(book.owner_id, owner);
        assert_eq!(catalog.get(book.id).await.unwrap(), book);
    }

    #[tokio::test]
    async fn create_rejects_blank_title() {
        let catalog = catalog().await;
        let err = catalog
            .create(input(" ", None), DocumentId::generate())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(catalog.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_pages_newest_first() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        let mut created = Vec::new();
        for i in 0..12 {
            created.push(
                catalog
                    .create(input(&format!("Book {i}"), None), owner)
                    .await
                    .unwrap(),
            );
        }

        let first = catalog
            .list(BookFilter::default(), BookSort::CreatedDesc, 1)
            .await
            .unwrap();
        assert_eq!(first.total, 12);
        assert_eq!(first.page_count, 3);
        assert_eq!(first.items.len(), 5);
        assert_eq!(first.items[0].id, created[11].id);

        let last = catalog
            .list(BookFilter::default(), BookSort::CreatedDesc, 3)
            .await
            .unwrap();
        assert_eq!(last.items.len(), 2);
        assert_eq!(last.items[1].id, created[0].id);

        let beyond = catalog
            .list(BookFilter::default(), BookSort::CreatedDesc, 4)
            .await
            .unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.total, 12);

        let clamped = catalog
            .list(BookFilter::default(), BookSort::CreatedDesc, 0)
            .await
            .unwrap();
        assert_eq!(clamped.items, first.items);
    }

    #[tokio::test]
    async fn year_orders_put_missing_years_lowest() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        for (title, year) in [("Old", Some(1950)), ("None", None), ("New", Some(2020))] {
            catalog.create(input(title, year), owner).await.unwrap();
        }

        let titles = |page: CatalogPage| -> Vec<String> {
            page.items.into_iter().map(|b| b.title).collect()
        };
        let desc = catalog
            .list(BookFilter::default(), BookSort::YearDesc, 1)
            .await
            .unwrap();
        assert_eq!(titles(desc), ["New", "Old", "None"]);
        let asc = catalog
            .list(BookFilter::default(), BookSort::YearAsc, 1)
            .await
            .unwrap();
        assert_eq!(titles(asc), ["None", "Old", "New"]);
    }

    #[tokio::test]
    async fn list_applies_filters_before_counting() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        catalog.create(input("Atomic Habits", None), owner).await.unwrap();
        catalog.create(input("Educated", None), owner).await.unwrap();

        let page = catalog
            .list(
                BookFilter::new(Some("atomic".to_string()), None, None),
                BookSort::CreatedDesc,
                1,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.page_count, 1);
        assert_eq!(page.items[0].title, "Atomic Habits");
    }

    #[tokio::test]
    async fn filters_match_case_and_author_rules() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        let mut educated = input("Educated", None);
        educated.author = "Tara Westover".to_string();
        educated.genre = Some("Memoir".to_string());
        catalog.create(educated, owner).await.unwrap();
        let mut memoirs = input("Memoirs", None);
        memoirs.genre = Some("Memoirs".to_string());
        catalog.create(memoirs, owner).await.unwrap();
        let mut atomic = input("Habits", None);
        atomic.author = "Atomic Ärzte".to_string();
        catalog.create(atomic, owner).await.unwrap();

        let catalog = &catalog;
        let titles = move |filter: BookFilter| async move {
            let page = catalog.list(filter, BookSort::CreatedDesc, 1).await.unwrap();
            page.items.into_iter().map(|b| b.title).collect::<Vec<_>>()
        };

        assert_eq!(
            titles(BookFilter::new(None, Some("MEMOIR".to_string()), None)).await,
            ["Educated"]
        );
        assert_eq!(
            titles(BookFilter::new(Some("ÄRZTE".to_string()), None, None)).await,
            ["Habits"]
        );
        assert_eq!(
            titles(BookFilter::new(None, None, Some("Tara Westover".to_string()))).await,
            ["Educated"]
        );
        assert!(titles(BookFilter::new(None, None, Some("tara westover".to_string())))
            .await
            .is_empty());
        assert!(titles(BookFilter::new(Some("%".to_string()), None, None))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn updates_are_visible_to_filters() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        let book = catalog.create(input("Dune", None), owner).await.unwrap();

        let patch: BookPatch = serde_json::from_str(r#"{"title":"Children of Dune","genre":"Sci-Fi"}"#).unwrap();
        catalog.update(book.id, owner, patch).await.unwrap();

        let page = catalog
            .list(
                BookFilter::new(Some("children".to_string()), Some("sci-fi".to_string()), None),
                BookSort::CreatedDesc,
                1,
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "Children of Dune");
        assert_eq!(catalog.get(book.id).await.unwrap(), page.items[0]);
    }

    #[tokio::test]
    async fn update_is_partial_and_owner_only() {
        let catalog = catalog().await;
        let owner = DocumentId::generate();
        let mut create = input("Dune", Some(1965));
        create.genre = Some("Sci-Fi".to_string());
        let book = catalog.create(create, owner).await.unwrap();

        let patch: BookPatch =
            serde_json::from_str(r#"{"description":"Spice","genre":null}"#).unwrap();
        let err = catalog
            .update(book.id, DocumentId::generate(), patch.clone())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let updated = catalog.update(book.id, owner, patch).await.unwrap();
        assert_eq!(updated.title, "Dune");
        assert_eq!(updated.year, Some(1965));
        assert_eq!(updated.description, "Spice");
        assert_eq!(updated.genre, None);
        assert!(updated.updated_at >= book.updated_at);
        assert_eq!(updated.created_at, book.created_at);
    }

    #[tokio::test]
    async fn delete_removes_reviews_and_is_owner_only() {
        let db = test_database().await;
        let reviews = store(&db);
        let catalog = BookCatalog::new(&db, reviews.clone());
        let owner = DocumentId::generate();
        let book = catalog.create(input("Dune", None), owner).await.unwrap();
        reviews
            .upsert(book.id, DocumentId::generate(), 5, None)
            .await
            .unwrap();

        let err = catalog
            .delete(book.id, DocumentId::generate())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        catalog.delete(book.id, owner).await.unwrap();
        assert_eq!(
            catalog.get(book.id).await.unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert!(reviews.list_by_book(book.id).await.unwrap().is_empty());
    }
}
