//! Semantic search API endpoint.

use axum::{Json, extract::State};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceResult;
use crate::search::FileMatches;

use super::AppState;

/// Search request
#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub match_threshold: Option<f32>,
    pub match_count: Option<usize>,
}

/// Search response, results grouped by file
#[derive(Serialize)]
pub struct SearchResponse {
    pub success: bool,
    pub query: String,
    pub results: Vec<FileMatches>,
    pub total_chunks: usize,
    pub total_documents: usize,
}

/// Perform semantic search across the organization's documents
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<SearchRequest>,
) -> ServiceResult<Json<SearchResponse>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    let retrieval = state.service.config.dynamic().retrieval.clone();
    let threshold = request.match_threshold.unwrap_or(retrieval.match_threshold);
    let count = request.match_count.unwrap_or(retrieval.match_count);

    let results = state
        .service
        .search
        .search(&ctx.organization_id, &request.query, threshold, count)
        .await?;

    let total_chunks = results.iter().map(|r| r.chunks.len()).sum();
    let total_documents = results.len();

    Ok(Json(SearchResponse {
        success: true,
        query: request.query,
        results,
        total_chunks,
        total_documents,
    }))
}
