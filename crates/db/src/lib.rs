//! SQLite storage for SHELF: the connection factory, module migrations, and
//! the column types shared by every table.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use time::OffsetDateTime;

use shelf_kernel::{settings::DatabaseSettings, Migration};

pub mod error;
pub mod id;
pub mod timestamp;

pub use error::{DbError, DbResult};
pub use id::DocumentId;

/// URL of a private in-process database.
pub const MEMORY_URL: &str = "sqlite::memory:";

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to a connected database. Clones share the same pool.
#[derive(Clone, Debug)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect using the configured URL, creating the database file if needed.
    pub async fn connect(settings: &DatabaseSettings) -> DbResult<Self> {
        let url = settings.url.trim();
        let in_memory = is_memory_url(url);

        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // Every connection to `:memory:` opens its own empty database.
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(settings.max_connections.max(1))
        }
        .connect_with(options)
        .await?;

        tracing::info!(target: "shelf-db", url, in_memory, "database connected");
        Ok(Self { pool })
    }

    /// Fresh, empty in-process database.
    pub async fn memory() -> DbResult<Self> {
        Self::connect(&DatabaseSettings {
            url: MEMORY_URL.to_string(),
            ..DatabaseSettings::default()
        })
        .await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply every migration not recorded yet, each in its own transaction.
    ///
    /// Migrations are keyed `{module}/{id}`. Returns how many were applied.
    pub async fn migrate(&self, migrations: &[(&str, Migration)]) -> DbResult<usize> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS shelf_migrations (
                id TEXT PRIMARY KEY NOT NULL,
                applied_at INTEGER NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        let mut applied = 0;
        for (module, migration) in migrations {
            let id = format!("{}/{}", module, migration.id);
            let done: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shelf_migrations WHERE id = ?)")
                    .bind(&id)
                    .fetch_one(&self.pool)
                    .await?;
            if done {
                continue;
            }

            let mut tx = self.pool.begin().await?;
            if let Err(source) = sqlx::raw_sql(migration.up).execute(&mut *tx).await {
                tx.rollback().await?;
                return Err(DbError::Migration { id, source });
            }
            sqlx::query("INSERT INTO shelf_migrations (id, applied_at) VALUES (?, ?)")
                .bind(&id)
                .bind(timestamp::to_column(OffsetDateTime::now_utc()))
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            tracing::info!(target: "shelf-db", migration = %id, "migration applied");
            applied += 1;
        }

        Ok(applied)
    }

    /// Wait for open connections to finish and close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory_url(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}
