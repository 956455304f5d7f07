//! Organization and profile storage operations.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::db::models::{Organization, Profile};
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Create a new organization
    pub fn create_organization(&self, name: &str) -> ServiceResult<Organization> {
        let conn = self.conn.lock().unwrap();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO organizations (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![id, name, now.to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;

        Ok(Organization {
            id,
            name: name.to_string(),
            created_at: now,
        })
    }

    /// Get an organization by id
    pub fn get_organization(&self, id: &str) -> ServiceResult<Option<Organization>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT id, name, created_at FROM organizations WHERE id = ?1")
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![id], Organization::from_row)
            .map_err(DatabaseError::Query)?;

        match rows.next() {
            Some(row) => Ok(Some(row.map_err(DatabaseError::Query)?)),
            None => Ok(None),
        }
    }

    /// Create a profile linking an externally-authenticated user to an organization
    pub fn create_profile(&self, user_id: &str, organization_id: &str) -> ServiceResult<Profile> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now();

        conn.execute(
            "INSERT INTO profiles (user_id, organization_id, created_at) VALUES (?1, ?2, ?3) \
             ON CONFLICT(user_id) DO UPDATE SET organization_id = excluded.organization_id",
            params![user_id, organization_id, now.to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;

        Ok(Profile {
            user_id: user_id.to_string(),
            organization_id: organization_id.to_string(),
            created_at: now,
        })
    }

    /// Look up the profile for a user id
    pub fn get_profile(&self, user_id: &str) -> ServiceResult<Option<Profile>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT user_id, organization_id, created_at FROM profiles WHERE user_id = ?1")
            .map_err(DatabaseError::Query)?;

        let mut rows = stmt
            .query_map(params![user_id], Profile::from_row)
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
    fn profile_resolves_to_organization() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        assert_eq!(db.get_organization(&org.id).unwrap().unwrap().name, "Acme");
        db.create_profile("user-1", &org.id).unwrap();

        let profile = db.get_profile("user-1").unwrap().unwrap();
        assert_eq!(profile.organization_id, org.id);
        assert!(db.get_profile("user-2").unwrap().is_none());
    }
}
