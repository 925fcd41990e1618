//! Errors raised by the storage layer.

use thiserror::Error;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("invalid document id '{0}'")]
    InvalidId(String),

    #[error("migration '{id}' failed")]
    Migration {
        id: String,
        #[source]
        source: sqlx::Error,
    },

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// True when the error reports a uniqueness violation.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Database(e)) => e.is_unique_violation(),
            _ => false,
        }
    }
}
