use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Main service error type
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    #[error("Folder not found: {folder_id}")]
    FolderNotFound { folder_id: String },

    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Database error")]
    Database(#[from] DatabaseError),

    #[error("Text extraction failed")]
    Extraction(#[from] ExtractionError),

    #[error("Embedding error")]
    Embedding(#[from] EmbeddingError),

    #[error("{0}")]
    OpenAi(#[from] OpenAiError),

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Database errors
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database connection failed")]
    Connection(#[source] rusqlite::Error),

    #[error("Query failed")]
    Query(#[source] rusqlite::Error),

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("Serialization failed")]
    Serialization(#[source] serde_json::Error),
}

/// Extraction pipeline errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Unsupported file type: {extension}")]
    UnsupportedType { extension: String },

    #[error("Failed to download file from storage: {path}")]
    Download {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("File is already being processed: {file_id}")]
    AlreadyProcessing { file_id: String },

    #[error("Text extraction produced no content")]
    EmptyContent,

    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error")]
    Io(#[source] std::io::Error),
}

/// Embedding errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Content not found: {content_id}")]
    ContentNotFound { content_id: String },

    #[error("Embedding generation failed: {message}")]
    Generation { message: String },

    #[error("Invalid embedding payload: {message}")]
    InvalidPayload { message: String },
}

/// OpenAI-compatible API client errors
#[derive(Error, Debug)]
pub enum OpenAiError {
    #[error("Connection failed to {url}")]
    Connection {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("API request failed (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response from API")]
    InvalidResponse {
        #[source]
        source: serde_json::Error,
    },
}

/// API error response body: the message plus its source chain
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Walk the source chain of an error into a single "a: b: c" string
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}

impl ServiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::FileNotFound { .. } | ServiceError::FolderNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ServiceError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ServiceError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            ServiceError::Extraction(ExtractionError::UnsupportedType { .. }) => {
                StatusCode::UNSUPPORTED_MEDIA_TYPE
            }
            ServiceError::Extraction(ExtractionError::FileTooLarge { .. }) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServiceError::Extraction(ExtractionError::AlreadyProcessing { .. }) => {
                StatusCode::CONFLICT
            }
            // Extraction pipeline failures surface as client-visible 400s
            ServiceError::Extraction(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = error_chain(&self);

        let response = ErrorResponse {
            error: self.to_string(),
            details: (details != self.to_string()).then_some(details),
        };

        (status, Json(response)).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_type_maps_to_415() {
        let err = ServiceError::Extraction(ExtractionError::UnsupportedType {
            extension: "zip".to_string(),
        });
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn missing_file_maps_to_404() {
        let err = ServiceError::FileNotFound {
            file_id: "abc".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_chain_includes_sources() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such blob");
        let err = ServiceError::Extraction(ExtractionError::Download {
            path: "files/x".to_string(),
            source: io,
        });
        let chain = error_chain(&err);
        assert!(chain.contains("Text extraction failed"));
        assert!(chain.contains("no such blob"));
    }
}
