//! Folder and file API endpoints.
//!
//! Handlers for folder listing/creation, multipart file upload, and
//! file retrieval/deletion. Every operation is scoped to the caller's
//! organization.

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::db::{DocumentFile, DocumentFolder};
use crate::error::{ServiceError, ServiceResult};

use super::AppState;

/// Request to create a folder
#[derive(Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub category: Option<String>,
}

/// Response for delete operations
#[derive(Serialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
}

/// List all folders in the caller's organization
pub async fn list_folders_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> ServiceResult<Json<Vec<DocumentFolder>>> {
    let ctx = state.service.authorize(bearer.token()).await?;
    let folders = state.service.db.list_folders(&ctx.organization_id)?;
    Ok(Json(folders))
}

/// Create a new folder
pub async fn create_folder_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<CreateFolderRequest>,
) -> ServiceResult<Json<DocumentFolder>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    if request.name.trim().is_empty() {
        return Err(ServiceError::InvalidRequest {
            message: "folder name must not be empty".to_string(),
        });
    }

    let folder = state.service.db.create_folder(
        &ctx.organization_id,
        request.name.trim(),
        request.category.as_deref(),
    )?;
    Ok(Json(folder))
}

/// List files in a folder
pub async fn list_folder_files_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(folder_id): Path<String>,
) -> ServiceResult<Json<Vec<DocumentFile>>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    let folder = state
        .service
        .db
        .get_folder(&ctx.organization_id, &folder_id)?
        .ok_or(ServiceError::FolderNotFound { folder_id })?;

    let files = state.service.db.list_files(&folder.id)?;
    Ok(Json(files))
}

/// Upload a new file (multipart: `file`, `folder_id`)
pub async fn upload_file_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    mut multipart: Multipart,
) -> ServiceResult<Json<DocumentFile>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    let mut file_data: Option<(Vec<u8>, String, Option<String>)> = None;
    let mut folder_id: Option<String> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("document").to_string();
                let mime_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::InvalidRequest {
                        message: e.to_string(),
                    })?;
                file_data = Some((data.to_vec(), filename, mime_type));
            }
            "folder_id" => {
                folder_id = Some(field.text().await.map_err(|e| {
                    ServiceError::InvalidRequest {
                        message: e.to_string(),
                    }
                })?);
            }
            _ => {}
        }
    }

    let (data, filename, mime_type) = file_data.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No file provided".to_string(),
    })?;
    let folder_id = folder_id.ok_or_else(|| ServiceError::InvalidRequest {
        message: "No folder_id provided".to_string(),
    })?;

    let file = state
        .service
        .upload_file(&ctx, &folder_id, &filename, mime_type.as_deref(), &data)?;
    Ok(Json(file))
}

/// Get a specific file by ID
pub async fn get_file_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<DocumentFile>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    let file_ctx = state
        .service
        .db
        .get_file_context(&ctx.organization_id, &id)?
        .ok_or(ServiceError::FileNotFound { file_id: id })?;

    Ok(Json(file_ctx.file))
}

/// Delete a file
pub async fn delete_file_handler(
    State(state): State<Arc<AppState>>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(id): Path<String>,
) -> ServiceResult<Json<DeleteResponse>> {
    let ctx = state.service.authorize(bearer.token()).await?;

    let deleted = state.service.delete_file(&ctx, &id)?;
    if !deleted {
        return Err(ServiceError::FileNotFound { file_id: id });
    }

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("File {} deleted", id),
    }))
}
