use std::sync::Arc;

use axum::{routing::get, Json, Router};
use dotenvy::dotenv;
use log::info;
use tower_http::cors::CorsLayer;

use policyserver::legal::configure_legal_routes;
use policyserver::legal::service::DocumentService;
use policyserver::llm::{GenerationClient, OpenAiClient};
use policyserver::shared::config::AppConfig;
use policyserver::shared::state::AppState;
use policyserver::shared::utils::create_conn;
use policyserver::storage::DatabaseStorage;

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env()?;
    let pool = create_conn(&config.database_url)?;

    let storage = Arc::new(DatabaseStorage::new(pool));
    let provider = OpenAiClient::new(
        config.llm.api_key.clone(),
        Some(config.llm.base_url.clone()),
        config.llm.model.clone(),
    )?;
    let documents = Arc::new(DocumentService::new(
        storage.clone(),
        GenerationClient::new(Arc::new(provider), config.llm.model.clone()),
    ));

    let state = Arc::new(AppState {
        config: config.clone(),
        storage,
        documents,
    });

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(configure_legal_routes())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let addr = config.bind_addr();
    info!("policyserver listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
