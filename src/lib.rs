use std::sync::Arc;

use crate::import::QuizImporter;
use crate::model::{DatabaseError, DbConnection, ModelManager};
use crate::storage::ObjectStore;
use crate::upload::UploadOrchestrator;
use crate::utils::signal::shutdown_signal;
use crate::{error::AppResult, web::AppState};
use axum::Router;
use tokio::net::TcpListener;

pub mod config;
pub use config::{Config, ConfigError, ConfigResult};

pub mod auth;
pub mod error;
pub mod import;
pub mod model;
pub mod storage;
pub mod upload;
pub mod utils;
pub mod web;

static APPLICATION_NAME: &str = "skilltune";

/// Database and object store wired into the services the routes use.
pub fn build_state(db: DbConnection, storage: Arc<dyn ObjectStore>, config: &Config) -> AppState {
    let mm = ModelManager::new(db);
    let importer = QuizImporter::new(mm.clone(), storage.clone(), config.import().max_csv_size());
    let uploads = UploadOrchestrator::new(storage.clone(), config.storage());
    AppState::new(mm, storage, importer, uploads)
}

pub async fn run_migrations(db: &DbConnection) -> AppResult<()> {
    tracing::debug!("applying migrations...");
    sqlx::migrate!()
        .run(db.pool())
        .await
        .map_err(DatabaseError::from)?;
    Ok(())
}

pub async fn build_server() -> AppResult<(AppState, Router)> {
    let use_local = cfg!(debug_assertions);
    let config = config::Config::get_or_init(use_local).await;
    let db = DbConnection::connect(config.app().database_uri())?;

    run_migrations(&db).await?;

    let storage = storage::connect(config.storage(), config.app().jwt()).await;
    let state = build_state(db, storage, config);
    let app = web::routes::build_app(state.clone(), config);
    Ok((state, app))
}

/// Server over an existing pool and store, used by the integration tests.
pub async fn build_server_with(db: DbConnection, storage: Arc<dyn ObjectStore>) -> AppResult<(AppState, Router)> {
    let config = config::Config::get_or_init(true).await;

    let state = build_state(db, storage, config);
    let app = web::routes::build_app(state.clone(), config);
    Ok((state, app))
}

#[tracing::instrument]
pub async fn setup_workers() -> AppResult<()> {
    let (_, app) = build_server().await?;
    let config = Config::get_or_init(false).await;
    let listener = TcpListener::bind(config.host().bindto()).await?;

    tracing::info!("axum is starting at: {}", config.host().bindto());
    let axum_handle = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

    axum_handle.await?;
    Ok(())
}

pub fn setup_trace() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

    // load .env file for RUST_LOG etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .init();

    tracing::debug!("tracing initialized.");
}

#[tracing::instrument]
pub async fn run() -> AppResult<()> {
    setup_trace();
    setup_workers().await?;
    Ok(())
}
