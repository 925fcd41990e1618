//! Identity tokens, password hashing, and the request guard that turns a
//! bearer token into the current user id.

pub mod guard;
pub mod password;
pub mod token;

pub use guard::CurrentUser;
pub use password::{hash_password, verify_password};
pub use token::{Claims, TokenIssuer};

use shelf_http::AppError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("token expired")]
    Expired,

    #[error("invalid token")]
    InvalidToken,

    #[error("failed to issue token: {0}")]
    Issue(String),

    #[error("failed to hash password: {0}")]
    Hash(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => AppError::unauthorized("Not authorized, no token"),
            AuthError::Expired => AppError::unauthorized("Not authorized, token expired"),
            AuthError::InvalidToken => AppError::unauthorized("Not authorized"),
            other => AppError::Internal(other.into()),
        }
    }
}
