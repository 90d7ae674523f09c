use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use greenlight_server::api::api_router;
use greenlight_server::config::Config;
use greenlight_server::{AppState, DeliveryChannel, LogChannel, SqliteRepository, WebhookChannel};

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "greenlight",
        "version": greenlight_core::get_service_version(),
    }))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    info!("Starting Greenlight approval workflow service");

    let config =
        Config::from_env().expect("Failed to load configuration from environment variables");

    let db_path = config.state_dir.join("greenlight-state.db");
    info!("Using state database: {}", db_path.display());
    let repository =
        SqliteRepository::new(&db_path).expect("Failed to initialize SQLite database");

    let delivery: Arc<dyn DeliveryChannel> = match &config.notify_webhook_url {
        Some(url) => {
            info!("Delivering approval notifications to webhook: {}", url);
            Arc::new(WebhookChannel::new(url.clone()))
        }
        None => {
            info!("Delivering approval notifications to the service log");
            Arc::new(LogChannel)
        }
    };

    let app_state = Arc::new(AppState {
        repository: Arc::new(repository),
        delivery,
        store_timeout: config.store_timeout,
        approval_base_url: config.approval_base_url.clone(),
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api_router())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state);

    let listener = TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    info!("Server listening on port {}", config.port);

    axum::serve(listener, app).await?;

    Ok(())
}
