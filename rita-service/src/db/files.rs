//! Document file storage operations.
//!
//! Status transitions are funneled through `try_begin_processing` (the
//! extraction lease) and `set_file_status` so intermediate states stay
//! consistent even if a process dies mid-extraction.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::db::models::{DocumentFile, DocumentFolder, ProcessingStatus};
use crate::error::{DatabaseError, ServiceResult};

/// A file together with its owning folder (and through it, the organization)
#[derive(Debug, Clone)]
pub struct FileContext {
    pub file: DocumentFile,
    pub folder: DocumentFolder,
}

impl Database {
    /// Create a new file record in `pending` status
    pub fn create_file(
        &self,
        folder_id: &str,
        file_name: &str,
        file_path: &str,
        file_size: u64,
        mime_type: Option<&str>,
    ) -> ServiceResult<DocumentFile> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO document_files \
             (id, folder_id, file_name, file_path, file_size, mime_type, processing_status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7, ?7)",
            params![
                id,
                folder_id,
                file_name,
                file_path,
                file_size as i64,
                mime_type,
                now.to_rfc3339()
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(DocumentFile {
            id,
            folder_id: folder_id.to_string(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            file_size,
            mime_type: mime_type.map(str::to_string),
            processing_status: ProcessingStatus::Pending,
            processing_error: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get a file by id
    pub fn get_file(&self, file_id: &str) -> ServiceResult<Option<DocumentFile>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, folder_id, file_name, file_path, file_size, mime_type, \
                 processing_status, processing_error, created_at, updated_at \
                 FROM document_files WHERE id = ?1",
            )
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![file_id], DocumentFile::from_row)
            .map_err(DatabaseError::Query)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(DatabaseError::Query)?)),
            None => Ok(None),
        }
    }

    /// Get a file together with its owning folder, scoped to an organization
    pub fn get_file_context(
        &self,
        organization_id: &str,
        file_id: &str,
    ) -> ServiceResult<Option<FileContext>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT f.id, f.folder_id, f.file_name, f.file_path, f.file_size, f.mime_type, \
                 f.processing_status, f.processing_error, f.created_at, f.updated_at, \
                 d.id, d.organization_id, d.name, d.category, d.created_at \
                 FROM document_files f \
                 JOIN document_folders d ON d.id = f.folder_id \
                 WHERE f.id = ?1 AND d.organization_id = ?2",
            )
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![file_id, organization_id], |row| {
                let file = DocumentFile::from_row(row)?;
                let folder_created: String = row.get(14)?;
                let folder = DocumentFolder {
                    id: row.get(10)?,
                    organization_id: row.get(11)?,
                    name: row.get(12)?,
                    category: row.get(13)?,
                    created_at: chrono::DateTime::parse_from_rfc3339(&folder_created)
                        .map(|dt| dt.with_timezone(&Utc))
                        .unwrap_or_else(|_| Utc::now()),
                };
                Ok(FileContext { file, folder })
            })
            .map_err(DatabaseError::Query)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(DatabaseError::Query)?)),
            None => Ok(None),
        }
    }

    /// List files in a folder
    pub fn list_files(&self, folder_id: &str) -> ServiceResult<Vec<DocumentFile>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, folder_id, file_name, file_path, file_size, mime_type, \
                 processing_status, processing_error, created_at, updated_at \
                 FROM document_files WHERE folder_id = ?1 ORDER BY file_name",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![folder_id], DocumentFile::from_row)
            .map_err(DatabaseError::Query)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(DatabaseError::Query)?);
        }
        Ok(files)
    }

    /// Point a file row at its stored blob (set after upload, once the
    /// row id is known)
    pub fn set_file_path(&self, file_id: &str, file_path: &str) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE document_files SET file_path = ?2, updated_at = ?3 WHERE id = ?1",
            params![file_id, file_path, Utc::now().to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Delete a file record. Content and embeddings cascade.
    pub fn delete_file(&self, file_id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn
            .execute("DELETE FROM document_files WHERE id = ?1", params![file_id])
            .map_err(DatabaseError::Query)?;

        Ok(deleted > 0)
    }

    /// Acquire the extraction lease: conditional transition into `processing`.
    ///
    /// Returns false when the file is already `processing`, which makes
    /// concurrent re-triggers on the same file id fail fast instead of
    /// interleaving.
    pub fn try_begin_processing(&self, file_id: &str) -> ServiceResult<bool> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE document_files \
                 SET processing_status = 'processing', processing_error = NULL, updated_at = ?2 \
                 WHERE id = ?1 AND processing_status != 'processing'",
                params![file_id, Utc::now().to_rfc3339()],
            )
            .map_err(DatabaseError::Query)?;

        Ok(updated == 1)
    }

    /// Single update point for terminal status transitions
    pub fn set_file_status(
        &self,
        file_id: &str,
        status: ProcessingStatus,
        error: Option<&str>,
    ) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE document_files \
             SET processing_status = ?2, processing_error = ?3, updated_at = ?4 \
             WHERE id = ?1",
            params![file_id, status.as_str(), error, Utc::now().to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Flip files stuck in `processing` (crash mid-extraction) to `failed`.
    /// Called once on startup.
    pub fn recover_stale_processing(&self, message: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE document_files \
                 SET processing_status = 'failed', processing_error = ?1, updated_at = ?2 \
                 WHERE processing_status = 'processing'",
                params![message, Utc::now().to_rfc3339()],
            )
            .map_err(DatabaseError::Query)?;

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;
    use crate::db::models::ProcessingStatus;

    fn file_fixture(db: &Database) -> String {
        let org = db.create_organization("Acme").unwrap();
        let folder = db.create_folder(&org.id, "Docs", None).unwrap();
        db.create_file(&folder.id, "a.txt", "files/a.txt", 3, Some("text/plain"))
            .unwrap()
            .id
    }

    #[test]
    fn lease_denied_while_processing() {
        let db = Database::open_in_memory().unwrap();
        let file_id = file_fixture(&db);

        assert!(db.try_begin_processing(&file_id).unwrap());
        assert!(!db.try_begin_processing(&file_id).unwrap());

        // Lease can be re-acquired from any terminal state
        db.set_file_status(&file_id, ProcessingStatus::Failed, Some("boom"))
            .unwrap();
        assert!(db.try_begin_processing(&file_id).unwrap());

        db.set_file_status(&file_id, ProcessingStatus::Completed, None)
            .unwrap();
        assert!(db.try_begin_processing(&file_id).unwrap());
    }

    #[test]
    fn lease_clears_previous_error() {
        let db = Database::open_in_memory().unwrap();
        let file_id = file_fixture(&db);

        db.set_file_status(&file_id, ProcessingStatus::Failed, Some("boom"))
            .unwrap();
        assert!(db.try_begin_processing(&file_id).unwrap());

        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Processing);
        assert!(file.processing_error.is_none());
    }

    #[test]
    fn startup_sweep_fails_stale_processing() {
        let db = Database::open_in_memory().unwrap();
        let file_id = file_fixture(&db);

        assert!(db.try_begin_processing(&file_id).unwrap());
        let swept = db.recover_stale_processing("interrupted by restart").unwrap();
        assert_eq!(swept, 1);

        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Failed);
        assert_eq!(
            file.processing_error.as_deref(),
            Some("interrupted by restart")
        );
    }

    #[test]
    fn file_context_is_org_scoped() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let other = db.create_organization("Other").unwrap();
        let folder = db.create_folder(&org.id, "Docs", None).unwrap();
        let file = db
            .create_file(&folder.id, "a.txt", "files/a.txt", 3, None)
            .unwrap();

        let ctx = db.get_file_context(&org.id, &file.id).unwrap().unwrap();
        assert_eq!(ctx.folder.name, "Docs");
        assert!(db.get_file_context(&other.id, &file.id).unwrap().is_none());
    }
}
