//! Embedding storage and similarity search operations.
//!
//! Embeddings are stored as little-endian f32 BLOBs and searched with
//! brute-force cosine similarity. Good enough for per-organization corpus
//! sizes; can be upgraded to a vector extension later without changing
//! callers.

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use super::Database;
use crate::error::{DatabaseError, ServiceResult};

/// A new embedding row to insert
#[derive(Debug, Clone)]
pub struct NewEmbedding {
    pub content_id: String,
    pub file_id: String,
    pub organization_id: String,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub token_count: usize,
    pub embedding: Vec<f32>,
    pub file_name: String,
    pub folder_name: String,
}

/// A stored chunk returned from similarity search
#[derive(Debug, Clone)]
pub struct EmbeddedChunk {
    pub id: String,
    pub content_id: String,
    pub file_id: String,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub file_name: String,
    pub folder_name: String,
    pub similarity: f32,
}

impl Database {
    /// Insert an embedding for a content chunk
    pub fn insert_embedding(&self, embedding: &NewEmbedding) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();

        let blob = embedding_to_blob(&embedding.embedding);

        conn.execute(
            "INSERT INTO document_embeddings \
             (id, content_id, file_id, organization_id, chunk_index, chunk_text, token_count, \
              embedding, file_name, folder_name, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                Uuid::new_v4().to_string(),
                embedding.content_id,
                embedding.file_id,
                embedding.organization_id,
                embedding.chunk_index as i64,
                embedding.chunk_text,
                embedding.token_count as i64,
                blob,
                embedding.file_name,
                embedding.folder_name,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Delete all embeddings for a content row (before regeneration)
    pub fn delete_embeddings_for_content(&self, content_id: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let deleted = conn
            .execute(
                "DELETE FROM document_embeddings WHERE content_id = ?1",
                params![content_id],
            )
            .map_err(DatabaseError::Query)?;

        Ok(deleted)
    }

    /// Count embeddings for an organization
    pub fn count_embeddings(&self, organization_id: &str) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM document_embeddings WHERE organization_id = ?1",
                params![organization_id],
                |row| row.get(0),
            )
            .map_err(DatabaseError::Query)?;

        Ok(count as usize)
    }

    /// Brute-force cosine similarity search over an organization's embeddings.
    ///
    /// Returns chunks with similarity >= threshold, best first, at most `limit`.
    pub fn search_embeddings(
        &self,
        organization_id: &str,
        query_embedding: &[f32],
        threshold: f32,
        limit: usize,
    ) -> ServiceResult<Vec<EmbeddedChunk>> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT id, content_id, file_id, chunk_index, chunk_text, file_name, folder_name, embedding \
                 FROM document_embeddings WHERE organization_id = ?1",
            )
            .map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![organization_id], |row| {
                let chunk_index: i64 = row.get(3)?;
                let blob: Vec<u8> = row.get(7)?;
                Ok((
                    EmbeddedChunk {
                        id: row.get(0)?,
                        content_id: row.get(1)?,
                        file_id: row.get(2)?,
                        chunk_index: chunk_index as usize,
                        chunk_text: row.get(4)?,
                        file_name: row.get(5)?,
                        folder_name: row.get(6)?,
                        similarity: 0.0,
                    },
                    blob,
                ))
            })
            .map_err(DatabaseError::Query)?;

        let mut results = Vec::new();
        for row in rows {
            let (mut chunk, blob) = row.map_err(DatabaseError::Query)?;
            let embedding = blob_to_embedding(&blob);
            let similarity = cosine_similarity(query_embedding, &embedding);
            if similarity >= threshold {
                chunk.similarity = similarity;
                results.push(chunk);
            }
        }

        results.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);

        Ok(results)
    }
}

/// Serialize an embedding vector as little-endian f32 bytes
pub(crate) fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Deserialize little-endian f32 bytes back into an embedding vector
pub(crate) fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
        .collect()
}

/// Cosine similarity between two vectors (0.0 for mismatched or zero vectors)
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn blob_round_trip_preserves_values() {
        let embedding = vec![0.25f32, -1.5, 3.125];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    fn insert_chunk(db: &Database, content_id: &str, file_id: &str, org: &str, v: Vec<f32>, text: &str) {
        db.insert_embedding(&NewEmbedding {
            content_id: content_id.to_string(),
            file_id: file_id.to_string(),
            organization_id: org.to_string(),
            chunk_index: 0,
            chunk_text: text.to_string(),
            token_count: 1,
            embedding: v,
            file_name: "a.txt".to_string(),
            folder_name: "Docs".to_string(),
        })
        .unwrap();
    }

    #[test]
    fn search_orders_by_similarity_and_applies_threshold() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let folder = db.create_folder(&org.id, "Docs", None).unwrap();
        let file = db
            .create_file(&folder.id, "a.txt", "files/a.txt", 3, None)
            .unwrap();
        let content = db.upsert_content(&file.id, &org.id, "text").unwrap();

        insert_chunk(&db, &content.id, &file.id, &org.id, vec![1.0, 0.0], "exact");
        insert_chunk(&db, &content.id, &file.id, &org.id, vec![0.9, 0.1], "close");
        insert_chunk(&db, &content.id, &file.id, &org.id, vec![0.0, 1.0], "orthogonal");

        let results = db
            .search_embeddings(&org.id, &[1.0, 0.0], 0.7, 10)
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_text, "exact");
        assert_eq!(results[1].chunk_text, "close");
    }

    #[test]
    fn regeneration_deletes_previous_embeddings() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let folder = db.create_folder(&org.id, "Docs", None).unwrap();
        let file = db
            .create_file(&folder.id, "a.txt", "files/a.txt", 3, None)
            .unwrap();
        let content = db.upsert_content(&file.id, &org.id, "text").unwrap();

        insert_chunk(&db, &content.id, &file.id, &org.id, vec![1.0, 0.0], "one");
        insert_chunk(&db, &content.id, &file.id, &org.id, vec![0.0, 1.0], "two");
        assert_eq!(db.count_embeddings(&org.id).unwrap(), 2);

        assert_eq!(db.delete_embeddings_for_content(&content.id).unwrap(), 2);
        assert_eq!(db.count_embeddings(&org.id).unwrap(), 0);
    }

    #[test]
    fn search_is_scoped_to_organization() {
        let db = Database::open_in_memory().unwrap();
        let org = db.create_organization("Acme").unwrap();
        let other = db.create_organization("Other").unwrap();
        let folder = db.create_folder(&org.id, "Docs", None).unwrap();
        let file = db
            .create_file(&folder.id, "a.txt", "files/a.txt", 3, None)
            .unwrap();
        let content = db.upsert_content(&file.id, &org.id, "text").unwrap();

        insert_chunk(&db, &content.id, &file.id, &org.id, vec![1.0, 0.0], "mine");

        let results = db
            .search_embeddings(&other.id, &[1.0, 0.0], 0.0, 10)
            .unwrap();
        assert!(results.is_empty());
    }
}
