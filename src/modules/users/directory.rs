use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use shelf_authz::{hash_password, verify_password, TokenIssuer};
use shelf_db::{timestamp, Database, DbError, DocumentId};
use shelf_http::{extract::validation_failed, AppError, Result};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use time::OffsetDateTime;
use tracing::info;
use validator::Validate;

use super::models::{normalize_email, AuthSession, LoginUser, RegisterUser, User, USER_COLUMNS};
use crate::modules::reviews::store::AuthorDirectory;

/// Registered accounts and the tokens issued to them.
#[derive(Clone)]
pub struct UserDirectory {
    pool: SqlitePool,
    tokens: Arc<TokenIssuer>,
}

impl UserDirectory {
    pub fn new(db: &Database, tokens: Arc<TokenIssuer>) -> Self {
        Self {
            pool: db.pool().clone(),
            tokens,
        }
    }

    pub async fn register(&self, input: RegisterUser) -> Result<AuthSession> {
        input.validate().map_err(validation_failed)?;
        let user = self.create(&input.name, &input.email, &input.password).await?;
        let token = self.tokens.issue(user.id)?;
        Ok(AuthSession { user, token })
    }

    /// Store a new account. The email must not be registered yet.
    pub async fn create(&self, name: &str, email: &str, password: &str) -> Result<User> {
        let user = User {
            id: DocumentId::generate(),
            name: name.trim().to_string(),
            email: normalize_email(email),
            password_hash: hash_password(password)?,
            created_at: OffsetDateTime::now_utc(),
        };

        let sql = format!("INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?)");
        sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(timestamp::to_column(user.created_at))
            .execute(&self.pool)
            .await
            .map_err(|e| match DbError::from(e) {
                e if e.is_duplicate_key() => {
                    AppError::conflict(Vec::new(), "Email already registered")
                }
                e => e.into(),
            })?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(&self, input: LoginUser) -> Result<AuthSession> {
        input.validate().map_err(validation_failed)?;

        let user = self
            .find_by_email(&input.email)
            .await?
            .filter(|user| verify_password(&input.password, &user.password_hash))
            .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

        let token = self.tokens.issue(user.id)?;
        Ok(AuthSession { user, token })
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(normalize_email(email))
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?)
    }

    /// The account behind an authenticated request.
    pub async fn current(&self, id: DocumentId) -> Result<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::from)?
            .ok_or_else(|| AppError::unauthorized("Not authorized, user not found"))
    }
}

#[async_trait]
impl AuthorDirectory for UserDirectory {
    async fn display_names(&self, user_ids: &[DocumentId]) -> Result<HashMap<DocumentId, String>> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new("SELECT id, name FROM users WHERE id IN (");
        let mut ids = query.separated(", ");
        for id in user_ids {
            ids.push_bind(*id);
        }
        ids.push_unseparated(")");

        let rows: Vec<(DocumentId, String)> = query
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::from)?;
        Ok(rows.into_iter().collect())
    }
}
