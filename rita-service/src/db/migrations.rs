//! Database schema migrations.
//!
//! This module contains all database migrations and schema setup.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// This function is called during database initialization to ensure
/// the schema is up to date.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    // Initial schema setup
    conn.execute_batch(
        r#"
        -- Organizations (tenant boundary)
        CREATE TABLE IF NOT EXISTS organizations (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Maps externally-authenticated users to their organization
        CREATE TABLE IF NOT EXISTS profiles (
            user_id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_profiles_org ON profiles(organization_id);

        -- Document folders
        CREATE TABLE IF NOT EXISTS document_folders (
            id TEXT PRIMARY KEY,
            organization_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (organization_id) REFERENCES organizations(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_document_folders_org ON document_folders(organization_id);

        -- Document file metadata
        CREATE TABLE IF NOT EXISTS document_files (
            id TEXT PRIMARY KEY,
            folder_id TEXT NOT NULL,
            file_name TEXT NOT NULL,
            file_path TEXT NOT NULL,
            file_size INTEGER NOT NULL DEFAULT 0,
            mime_type TEXT,
            processing_status TEXT NOT NULL DEFAULT 'pending',
            processing_error TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (folder_id) REFERENCES document_folders(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_document_files_folder ON document_files(folder_id);
        CREATE INDEX IF NOT EXISTS idx_document_files_status ON document_files(processing_status);

        -- Extracted plain-text content (1:1 with a completed file)
        CREATE TABLE IF NOT EXISTS document_content (
            id TEXT PRIMARY KEY,
            file_id TEXT NOT NULL UNIQUE,
            organization_id TEXT NOT NULL,
            content_text TEXT NOT NULL,
            summary TEXT,
            processing_status TEXT NOT NULL DEFAULT 'completed',
            extracted_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (file_id) REFERENCES document_files(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_document_content_org ON document_content(organization_id);

        -- Vector embeddings per content chunk
        -- Embeddings stored as little-endian f32 BLOBs; search is brute-force cosine
        CREATE TABLE IF NOT EXISTS document_embeddings (
            id TEXT PRIMARY KEY,
            content_id TEXT NOT NULL,
            file_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            chunk_text TEXT NOT NULL,
            token_count INTEGER NOT NULL DEFAULT 0,
            embedding BLOB NOT NULL,
            file_name TEXT NOT NULL,
            folder_name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            FOREIGN KEY (content_id) REFERENCES document_content(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_document_embeddings_content ON document_embeddings(content_id);
        CREATE INDEX IF NOT EXISTS idx_document_embeddings_org ON document_embeddings(organization_id);

        -- Chat query tracking
        CREATE TABLE IF NOT EXISTS queries (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            organization_id TEXT NOT NULL,
            query_text TEXT NOT NULL,
            response_text TEXT NOT NULL,
            tokens_used INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_queries_org ON queries(organization_id);

        -- Dynamic config overrides
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
    "#,
    )
    .map_err(|e| DatabaseError::Migration {
        message: e.to_string(),
    })?;

    Ok(())
}
