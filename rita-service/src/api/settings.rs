//! Runtime settings API endpoints.
//!
//! Settings are stored in the database as overrides on top of the
//! config file/env defaults and hot-reloaded into the running service.

use axum::{Json, extract::State};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::DynamicConfig;
use crate::error::{ServiceError, ServiceResult};

use super::AppState;

/// Response after a settings update
#[derive(Serialize)]
pub struct UpdateSettingsResponse {
    pub success: bool,
    pub updated: usize,
}

/// Get the current effective settings (defaults merged with DB overrides)
pub async fn get_settings_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> ServiceResult<Json<HashMap<String, serde_json::Value>>> {
    state.service.authorize(bearer.token()).await?;
    Ok(Json(state.service.config.dynamic().to_key_value_map()))
}

/// Update settings. Null values revert a key to its default.
pub async fn update_settings_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(updates): Json<HashMap<String, serde_json::Value>>,
) -> ServiceResult<Json<UpdateSettingsResponse>> {
    state.service.authorize(bearer.token()).await?;

    let valid_keys = DynamicConfig::valid_keys();
    for key in updates.keys() {
        if !valid_keys.contains(key.as_str()) {
            return Err(ServiceError::InvalidRequest {
                message: format!("Unknown setting key: {}", key),
            });
        }
    }

    let updated = updates.len();
    state.service.db.set_settings(updates)?;
    state.service.config.reload_from_db(&state.service.db)?;

    Ok(Json(UpdateSettingsResponse {
        success: true,
        updated,
    }))
}
