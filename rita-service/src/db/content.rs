//! Extracted document content storage operations.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::db::models::DocumentContent;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Insert or fully replace the content row for a file.
    ///
    /// Re-extraction overwrites the previous text; the row id is stable
    /// across replacements so embeddings can key off it.
    pub fn upsert_content(
        &self,
        file_id: &str,
        organization_id: &str,
        content_text: &str,
    ) -> ServiceResult<DocumentContent> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        let existing_id: Option<String> = conn
            .query_row(
                "SELECT id FROM document_content WHERE file_id = ?1",
                params![file_id],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })
            .map_err(DatabaseError::Query)?;

        let id = match existing_id {
            Some(id) => {
                conn.execute(
                    "UPDATE document_content \
                     SET content_text = ?2, summary = NULL, processing_status = 'completed', extracted_at = ?3 \
                     WHERE id = ?1",
                    params![id, content_text, now.to_rfc3339()],
                )
                .map_err(DatabaseError::Query)?;
                id
            }
            None => {
                let id = Uuid::new_v4().to_string();
                conn.execute(
                    "INSERT INTO document_content \
                     (id, file_id, organization_id, content_text, processing_status, extracted_at) \
                     VALUES (?1, ?2, ?3, ?4, 'completed', ?5)",
                    params![id, file_id, organization_id, content_text, now.to_rfc3339()],
                )
                .map_err(DatabaseError::Query)?;
                id
            }
        };

        Ok(DocumentContent {
            id,
            file_id: file_id.to_string(),
            organization_id: organization_id.to_string(),
            content_text: content_text.to_string(),
            summary: None,
            processing_status: crate::db::models::ProcessingStatus::Completed,
            extracted_at: now,
        })
    }

    /// Get a content row by id
    pub fn get_content(&self, content_id: &str) -> ServiceResult<Option<DocumentContent>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, file_id, organization_id, content_text, summary, processing_status, extracted_at \
                 FROM document_content WHERE id = ?1",
            )
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![content_id], DocumentContent::from_row)
            .map_err(DatabaseError::Query)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(DatabaseError::Query)?)),
            None => Ok(None),
        }
    }

    /// Get the content row for a file, if extraction has succeeded before
    pub fn get_content_by_file(&self, file_id: &str) -> ServiceResult<Option<DocumentContent>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, file_id, organization_id, content_text, summary, processing_status, extracted_at \
                 FROM document_content WHERE file_id = ?1",
            )
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![file_id], DocumentContent::from_row)
            .map_err(DatabaseError::Query)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(DatabaseError::Query)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[test]
    fn reextraction_replaces_content_instead_of_duplicating() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let folder = db.create_folder(&org.id, "Docs", None).unwrap();
        let file = db
            .create_file(&folder.id, "a.txt", "files/a.txt", 3, None)
            .unwrap();

        let first = db.upsert_content(&file.id, &org.id, "first pass").unwrap();
        let second = db.upsert_content(&file.id, &org.id, "second pass").unwrap();

        assert_eq!(first.id, second.id);
        let stored = db.get_content_by_file(&file.id).unwrap().unwrap();
        assert_eq!(stored.content_text, "second pass");
    }
}
