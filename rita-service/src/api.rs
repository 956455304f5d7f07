//! HTTP API for the Rita service.
//!
//! This module provides the REST API endpoints for:
//! - Health monitoring
//! - Folder and file management
//! - Text extraction
//! - Semantic search and chat
//! - Runtime settings

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, post, put},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::RuntimeConfig;
use crate::service::RitaService;

pub mod chat;
pub mod documents;
pub mod extract;
pub mod search;
pub mod settings;

use chat::chat_handler;
use documents::{
    create_folder_handler, delete_file_handler, get_file_handler, list_folder_files_handler,
    list_folders_handler, upload_file_handler,
};
use extract::extract_handler;
use search::search_handler;
use settings::{get_settings_handler, update_settings_handler};

/// Application state
pub struct AppState {
    pub service: Arc<RitaService>,
    pub start_time: Instant,
}

/// Build the API router
pub fn router(service: Arc<RitaService>, runtime_config: &RuntimeConfig) -> Router {
    let state = Arc::new(AppState {
        service,
        start_time: Instant::now(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Use the configured max file size for uploads
    let max_body_size = runtime_config.dynamic().limits.max_file_size_bytes as usize;

    let api_routes = Router::new()
        // Folder and file endpoints - larger body limit for uploads
        .route("/folders", get(list_folders_handler))
        .route("/folders", post(create_folder_handler))
        .route("/folders/{id}/files", get(list_folder_files_handler))
        .route(
            "/files",
            post(upload_file_handler).layer(DefaultBodyLimit::max(max_body_size)),
        )
        .route("/files/{id}", get(get_file_handler))
        .route("/files/{id}", delete(delete_file_handler))
        // Extraction endpoint
        .route("/extract", post(extract_handler))
        // Retrieval endpoints
        .route("/search", post(search_handler))
        .route("/chat", post(chat_handler))
        // Settings endpoints
        .route("/settings", get(get_settings_handler))
        .route("/settings", put(update_settings_handler));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Health ===

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    uptime_seconds: u64,
}
