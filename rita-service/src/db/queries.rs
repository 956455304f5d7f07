//! Chat query tracking operations.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};

impl Database {
    /// Record a chat query and its response for usage tracking
    pub fn record_query(
        &self,
        user_id: &str,
        organization_id: &str,
        query_text: &str,
        response_text: &str,
        tokens_used: u32,
    ) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO queries \
             (id, user_id, organization_id, query_text, response_text, tokens_used, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                Uuid::new_v4().to_string(),
                user_id,
                organization_id,
                query_text,
                response_text,
                tokens_used,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Count recorded queries for an organization
    pub fn count_queries(&self, organization_id: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM queries WHERE organization_id = ?1",
                params![organization_id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    #[test]
    fn queries_are_recorded_per_organization() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();

        db.record_query("user-1", &org.id, "what is x?", "x is y", 12)
            .unwrap();

        assert_eq!(db.count_queries(&org.id).unwrap(), 1);
        assert_eq!(db.count_queries("other").unwrap(), 0);
    }
}
