use std::sync::Arc;

use axum::{
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use shelf_db::DocumentId;
use shelf_http::AppError;

use crate::{token::TokenIssuer, AuthError};

/// Authenticated caller, extracted from `Authorization: Bearer <token>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: DocumentId,
}

impl<S> FromRequestParts<S> for CurrentUser
where
    Arc<TokenIssuer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let issuer = Arc::<TokenIssuer>::from_ref(state);
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let id = issuer.verify(token)?;
        Ok(Self { id })
    }
}

/// Token from an `Authorization: Bearer` header, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
