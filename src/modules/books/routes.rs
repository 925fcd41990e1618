use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use shelf_authz::CurrentUser;
use shelf_http::{
    extract::{parse_id, ValidJson},
    AppError, Result,
};

use super::listing::ListQuery;
use super::models::{Book, BookFilter, BookPatch, BookSort, BookWithRating, CreateBook, Page};
use crate::modules::reviews::models::{Review, ReviewInput, ReviewWithAuthor};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_books).post(create_book))
        .route("/{id}", get(get_book).put(update_book).delete(delete_book))
        .route("/{id}/reviews", get(list_reviews).post(add_review))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub q: Option<String>,
    pub genre: Option<String>,
    pub author: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
}

impl ListParams {
    /// Pages below 1 are treated as 1; a page that is not an integer is rejected.
    pub fn into_query(self) -> Result<ListQuery> {
        let page = match self.page.as_deref().map(str::trim) {
            None | Some("") => 1,
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| AppError::invalid_field("page", "integer", "Page must be an integer"))?
                .max(1)
                .unsigned_abs(),
        };

        Ok(ListQuery {
            sort: BookSort::from_param(self.sort.as_deref()),
            filter: BookFilter::new(self.q, self.genre, self.author),
            page,
        })
    }
}

async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page<BookWithRating>>> {
    let query = params.into_query()?;
    Ok(Json(state.listing.list(query).await?))
}

async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookWithRating>> {
    let id = parse_id(&id, "book")?;
    Ok(Json(state.listing.detail(id).await?))
}

async fn create_book(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidJson(input): ValidJson<CreateBook>,
) -> Result<(StatusCode, Json<Book>)> {
    let book = state.catalog.create(input, user.id).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

async fn update_book(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<BookPatch>,
) -> Result<Json<Book>> {
    let id = parse_id(&id, "book")?;
    Ok(Json(state.catalog.update(id, user.id, patch).await?))
}

async fn delete_book(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&id, "book")?;
    state.catalog.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}

async fn list_reviews(
    State(state): State<AppState>,
    Path(book_id): Path<String>,
) -> Result<Json<Vec<ReviewWithAuthor>>> {
    let book_id = parse_id(&book_id, "book")?;
    Ok(Json(state.reviews.list_by_book(book_id).await?))
}

async fn add_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(book_id): Path<String>,
    ValidJson(input): ValidJson<ReviewInput>,
) -> Result<(StatusCode, Json<Review>)> {
    let book_id = parse_id(&book_id, "book")?;
    if !state.catalog.exists(book_id).await? {
        return Err(AppError::not_found("Book not found"));
    }

    let review = state
        .reviews
        .upsert(book_id, user.id, input.rating, input.review_text)
        .await?;
    Ok((StatusCode::CREATED, Json(review)))
}
