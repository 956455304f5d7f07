//! Database model structs.
//!
//! This module contains the data structures for database records.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Processing status for files and extracted content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Uploaded, extraction not yet attempted
    Pending,
    /// Extraction in progress (acts as the extraction lease)
    Processing,
    /// Extraction completed successfully
    Completed,
    /// Extraction failed
    Failed,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Pending => "pending",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "processing" => ProcessingStatus::Processing,
            "completed" => ProcessingStatus::Completed,
            "failed" => ProcessingStatus::Failed,
            _ => ProcessingStatus::Pending,
        }
    }
}

/// Organization record (tenant boundary)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Maps an externally-authenticated user to their organization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    pub organization_id: String,
    pub created_at: DateTime<Utc>,
}

impl Profile {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(2)?;
        Ok(Self {
            user_id: row.get(0)?,
            organization_id: row.get(1)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Document folder record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFolder {
    pub id: String,
    pub organization_id: String,
    pub name: String,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DocumentFolder {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let created_at_str: String = row.get(4)?;
        Ok(Self {
            id: row.get(0)?,
            organization_id: row.get(1)?,
            name: row.get(2)?,
            category: row.get(3)?,
            created_at: parse_timestamp(&created_at_str),
        })
    }
}

/// Document file metadata record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFile {
    pub id: String,
    pub folder_id: String,
    pub file_name: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub processing_status: ProcessingStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processing_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentFile {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let file_size: i64 = row.get(4)?;
        let status_str: String = row.get(6)?;
        let created_at_str: String = row.get(8)?;
        let updated_at_str: String = row.get(9)?;

        Ok(Self {
            id: row.get(0)?,
            folder_id: row.get(1)?,
            file_name: row.get(2)?,
            file_path: row.get(3)?,
            file_size: file_size as u64,
            mime_type: row.get(5)?,
            processing_status: ProcessingStatus::from_str(&status_str),
            processing_error: row.get(7)?,
            created_at: parse_timestamp(&created_at_str),
            updated_at: parse_timestamp(&updated_at_str),
        })
    }
}

/// Extracted plain-text content of a document file (1:1 with a completed file)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    pub id: String,
    pub file_id: String,
    pub organization_id: String,
    pub content_text: String,
    pub summary: Option<String>,
    pub processing_status: ProcessingStatus,
    pub extracted_at: DateTime<Utc>,
}

impl DocumentContent {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let status_str: String = row.get(5)?;
        let extracted_at_str: String = row.get(6)?;

        Ok(Self {
            id: row.get(0)?,
            file_id: row.get(1)?,
            organization_id: row.get(2)?,
            content_text: row.get(3)?,
            summary: row.get(4)?,
            processing_status: ProcessingStatus::from_str(&status_str),
            extracted_at: parse_timestamp(&extracted_at_str),
        })
    }
}

/// Chat query tracking record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRecord {
    pub id: String,
    pub user_id: String,
    pub organization_id: String,
    pub query_text: String,
    pub response_text: String,
    pub tokens_used: u32,
    pub created_at: DateTime<Utc>,
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_status_round_trips() {
        for status in [
            ProcessingStatus::Pending,
            ProcessingStatus::Processing,
            ProcessingStatus::Completed,
            ProcessingStatus::Failed,
        ] {
            assert_eq!(ProcessingStatus::from_str(status.as_str()), status);
        }
    }

    #[test]
    fn unknown_status_defaults_to_pending() {
        assert_eq!(
            ProcessingStatus::from_str("garbage"),
            ProcessingStatus::Pending
        );
    }
}
