//! Chat API endpoint.

use axum::{Json, extract::State};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ServiceError, ServiceResult};

use super::AppState;

/// Chat request
#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

/// Chat response with source attribution
#[derive(Serialize)]
pub struct ChatResponse {
    pub success: bool,
    pub response: String,
    pub sources: Vec<String>,
    pub documents_searched: usize,
}

/// Answer a question using the organization's documents as context
pub async fn chat_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<ChatRequest>,
) -> ServiceResult<Json<ChatResponse>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    if request.message.trim().is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "message must not be empty".to_string(),
        });
    }

    let outcome = state.service.chat(&ctx, &request.message).await?;

    Ok(Json(ChatResponse {
        success: true,
        response: outcome.response,
        sources: outcome.sources,
        documents_searched: outcome.documents_searched,
    }))
}
