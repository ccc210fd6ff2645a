mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod error;

use std::net::SocketAddr;
use std::sync::Arc;
use axum::{Router, routing::get, response::Html};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;

use crate::api_docs::ApiDoc;
use crate::config::{Config, InsolationSourceKind};
use crate::routes::estimate_routes::api_routes;
use crate::services::insolation::forest::{ForestModel, InsolationModel};
use crate::services::pipeline::EstimationPipeline;
use crate::shared_state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 1. Load configuration
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load {}: {}", config_path, e);
            return;
        }
    };
    info!("Configuration loaded: insolation source = {:?}", config.insolation.source);

    // 2. Load the trained model once; it is shared read-only from here on
    let model: Option<Arc<dyn InsolationModel>> = match config.insolation.source {
        InsolationSourceKind::Model => match ForestModel::load(&config.insolation.model_path) {
            Ok(m) => Some(Arc::new(m) as Arc<dyn InsolationModel>),
            Err(e) => {
                error!("Trained model not usable at {}: {}", config.insolation.model_path, e);
                return;
            }
        },
        InsolationSourceKind::Satellite => None,
    };

    // 3. Build the estimation pipeline
    let pipeline = match EstimationPipeline::from_config(&config, model) {
        Ok(p) => p,
        Err(e) => {
            error!("Failed to build estimation pipeline: {}", e);
            return;
        }
    };
    let state = AppState::new(pipeline);

    // 4. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(state))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    if let Err(e) = axum_server::bind(addr)
        .serve(app.into_make_service())
        .await
    {
        error!("HTTP server error: {}", e);
    }
}
