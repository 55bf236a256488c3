mod handlers;
mod routes;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::db::Database;
use crate::settings::SettingsStore;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    pub fn new(db: Database, settings: SettingsStore) -> Self {
        Self {
            db,
            settings: Arc::new(settings),
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Build the full API router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(routes::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: &Config, db: Database) -> anyhow::Result<()> {
    let state = AppState::new(db, SettingsStore::new(config.settings_path.clone()));
    let app = router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "dashboard api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
}
