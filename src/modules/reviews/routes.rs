use axum::{
    extract::{Path, State},
    routing::put,
    Json, Router,
};
use serde_json::{json, Value};
use shelf_authz::CurrentUser;
use shelf_http::{
    extract::{parse_id, ValidJson},
    Result,
};

use super::models::{Review, ReviewPatch};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/{id}", put(update_review).delete(delete_review))
        .with_state(state)
}

async fn update_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
    ValidJson(patch): ValidJson<ReviewPatch>,
) -> Result<Json<Review>> {
    let id = parse_id(&id, "review")?;
    Ok(Json(state.reviews.update(id, user.id, patch).await?))
}

async fn delete_review(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let id = parse_id(&id, "review")?;
    state.reviews.delete(id, user.id).await?;
    Ok(Json(json!({ "message": "Deleted" })))
}
