//! SHELF application library
//!
//! Book catalog and review modules, the shared application state they are
//! built from, and the bootstrap used by the binaries.

pub mod modules;
pub mod seed;
pub mod state;
pub mod utils;

pub use state::AppState;

use anyhow::Context;
use axum::Router;
use shelf_db::Database;
use shelf_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Registry holding every module of the application
pub fn build_registry(state: &AppState) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry, state)?;
    Ok(registry)
}

/// State and registry over `db`, with every module's migrations applied
pub async fn prepare(db: &Database, settings: &Settings) -> anyhow::Result<(AppState, ModuleRegistry)> {
    let state = AppState::new(db, settings);
    let registry = build_registry(&state)?;
    let applied = db
        .migrate(&registry.collect_migrations())
        .await
        .context("failed to apply migrations")?;
    tracing::debug!(applied, "database schema ready");
    Ok((state, registry))
}

/// Fully layered router over `db`, without binding a socket
pub async fn build_app(db: &Database, settings: &Settings) -> anyhow::Result<(AppState, Router)> {
    let (state, registry) = prepare(db, settings).await?;
    let router = shelf_http::build_router(&registry, settings);
    Ok((state, router))
}

/// Merged OpenAPI document of all modules
pub async fn openapi_document(settings: &Settings) -> anyhow::Result<serde_json::Value> {
    let db = Database::memory().await?;
    let registry = build_registry(&AppState::new(&db, settings))?;
    Ok(shelf_http::router::collect_openapi(&registry))
}

/// Connect, migrate, optionally seed, and serve until a shutdown signal arrives
pub async fn run(settings: Settings, seed: bool) -> anyhow::Result<()> {
    shelf_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        db = %settings.database.url,
        "shelf bootstrap starting"
    );

    let db = Database::connect(&settings.database)
        .await
        .context("failed to connect to the database")?;
    let (state, registry) = prepare(&db, &settings).await?;

    if seed || settings.database.seed_demo_data {
        seed::seed_demo_data(&state)
            .await
            .context("failed to seed demo data")?;
    }

    let ctx = InitCtx {
        settings: &settings,
    };
    registry.init_modules(&ctx).await?;
    registry.start_modules(&ctx).await?;

    tracing::info!(modules = registry.module_count(), "shelf bootstrap complete");

    let served = shelf_http::start_server(&registry, &settings).await;
    registry.stop_modules().await?;
    db.close().await;
    served
}

/// Fresh in-process database with the full schema
#[cfg(test)]
pub(crate) async fn test_database() -> Database {
    let db = Database::memory().await.unwrap();
    prepare(&db, &Settings::default()).await.unwrap();
    db
}
