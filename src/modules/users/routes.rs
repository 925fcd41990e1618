use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shelf_authz::CurrentUser;
use shelf_http::{extract::ValidJson, Result};

use super::models::{AuthSession, CurrentUserBody, LoginUser, RegisterUser};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/me", get(me))
        .with_state(state)
}

async fn register(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<RegisterUser>,
) -> Result<(StatusCode, Json<AuthSession>)> {
    let session = state.users.register(input).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

async fn login(
    State(state): State<AppState>,
    ValidJson(input): ValidJson<LoginUser>,
) -> Result<Json<AuthSession>> {
    Ok(Json(state.users.login(input).await?))
}

async fn me(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CurrentUserBody>> {
    let user = state.users.current(user.id).await?;
    Ok(Json(CurrentUserBody { user }))
}
