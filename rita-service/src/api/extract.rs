//! Text extraction API endpoint.

use axum::{Json, extract::State};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ServiceResult;
use crate::extraction::ExtractionStats;

use super::AppState;

/// Extraction request
#[derive(Deserialize)]
pub struct ExtractRequest {
    pub file_id: String,
}

/// Extraction success response
#[derive(Serialize)]
pub struct ExtractResponse {
    pub success: bool,
    pub message: String,
    pub stats: ExtractionStats,
}

/// Extract text from an uploaded file and store it for retrieval
pub async fn extract_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ExtractRequest>,
) -> ServiceResult<Json<ExtractResponse>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    let stats = state
        .service
        .extraction
        .extract_file(&ctx.organization_id, &request.file_id)
        .await?;

    Ok(Json(ExtractResponse {
        success: true,
        message: "Text extracted successfully".to_string(),
        stats,
    }))
}
