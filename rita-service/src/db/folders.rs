//! Document folder storage operations.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::db::models::DocumentFolder;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Create a new folder in an organization
    pub fn create_folder(
        &self,
        organization_id: &str,
        name: &str,
        category: Option<&str>,
    ) -> ServiceResult<DocumentFolder> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO document_folders (id, organization_id, name, category, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, organization_id, name, category, now.to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;

        Ok(DocumentFolder {
            id,
            organization_id: organization_id.to_string(),
            name: name.to_string(),
            category: category.map(str::to_string),
            created_at: now,
        })
    }

    /// Get a folder by id, scoped to an organization
    pub fn get_folder(
        &self,
        organization_id: &str,
        folder_id: &str,
    ) -> ServiceResult<Option<DocumentFolder>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, organization_id, name, category, created_at \
                 FROM document_folders WHERE id = ?1 AND organization_id = ?2",
            )
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![folder_id, organization_id], DocumentFolder::from_row)
            .map_err(DatabaseError::Query)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(DatabaseError::Query)?)),
            None => Ok(None),
        }
    }

    /// List all folders in an organization
    pub fn list_folders(&self, organization_id: &str) -> ServiceResult<Vec<DocumentFolder>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, organization_id, name, category, created_at \
                 FROM document_folders WHERE organization_id = ?1 ORDER BY name",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![organization_id], DocumentFolder::from_row)
            .map_err(DatabaseError::Query)?;

        let mut folders = Vec::new();
        for row in rows {
            folders.push(row.map_err(DatabaseError::Query)?);
        }
        Ok(folders)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[test]
    fn folders_are_scoped_to_organization() {
        let db = Database::open_in_memory().unwrap();
        let org_a = db.create_organization("A").unwrap();
        let org_b = db.create_organization("B").unwrap();

        let folder = db.create_folder(&org_a.id, "Policies", Some("hr")).unwrap();

        assert!(db.get_folder(&org_a.id, &folder.id).unwrap().is_some());
        assert!(db.get_folder(&org_b.id, &folder.id).unwrap().is_none());
        assert_eq!(db.list_folders(&org_a.id).unwrap().len(), 1);
        assert!(db.list_folders(&org_b.id).unwrap().is_empty());
    }
}
