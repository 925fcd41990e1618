use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use shelf_db::{timestamp, DocumentId};
use sqlx::{sqlite::SqliteRow, FromRow, Row};
use time::OffsetDateTime;
use validator::{Validate, ValidationError};

pub const USER_COLUMNS: &str = "id, name, email, password_hash, created_at";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DocumentId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl<'r> FromRow<'r, SqliteRow> for User {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            created_at: timestamp::from_row(row, "created_at")?,
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn display_name(value: &str) -> Result<(), ValidationError> {
    if value.trim().chars().count() < 2 {
        let mut error = ValidationError::new("length");
        error.message = Some(Cow::from("Name required"));
        return Err(error);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUser {
    #[validate(custom(function = "display_name"))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginUser {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Issued token together with the user it identifies.
#[derive(Debug, Clone, Serialize)]
pub struct AuthSession {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserBody {
    pub user: User,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rules() {
        let ok = RegisterUser {
            name: "Al".to_string(),
            email: "al@example.com".to_string(),
            password: "secret".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = RegisterUser {
            name: " A ".to_string(),
            email: "not-an-email".to_string(),
            password: "123".to_string(),
        };
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }

    #[test]
    fn password_hash_is_never_serialized() {
        let user = User {
            id: DocumentId::generate(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$hash".to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["email"], "ada@example.com");
    }

    #[test]
    fn emails_are_normalized() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }
}
