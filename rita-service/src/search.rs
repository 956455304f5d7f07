//! Embedding generation and semantic search.
//!
//! Generation is triggered fire-and-forget after extraction: prior
//! embeddings for the content row are deleted, the text is split into
//! sentence-based chunks under a token budget, and each chunk is embedded
//! through the OpenAI-compatible API. Per-chunk failures are logged and
//! skipped rather than failing the batch.

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::db::{Database, EmbeddedChunk, NewEmbedding};
use crate::error::{EmbeddingError, ServiceResult, error_chain};
use crate::openai::OpenAiClient;

/// Search results for one file, grouped from its matching chunks
#[derive(Debug, Clone, Serialize)]
pub struct FileMatches {
    pub file_id: String,
    pub file_name: String,
    pub folder_name: String,
    pub chunks: Vec<ChunkMatch>,
    pub max_similarity: f32,
}

/// One matching chunk within a file
#[derive(Debug, Clone, Serialize)]
pub struct ChunkMatch {
    pub chunk_text: String,
    pub chunk_index: usize,
    pub similarity: f32,
}

/// Embedding + retrieval service
pub struct SearchService {
    db: Arc<Database>,
    openai: Arc<OpenAiClient>,
    config: Arc<RuntimeConfig>,
}

impl SearchService {
    pub fn new(db: Arc<Database>, openai: Arc<OpenAiClient>, config: Arc<RuntimeConfig>) -> Self {
        Self { db, openai, config }
    }

    /// Spawn embedding generation for a content row. All errors are
    /// logged inside the task and swallowed; the caller's result must
    /// never depend on the outcome.
    pub fn spawn_embedding_generation(self: &Arc<Self>, content_id: String) {
        let service = self.clone();
        tokio::spawn(async move {
            match service.generate_embeddings(&content_id).await {
                Ok(count) => {
                    info!(content_id = %content_id, chunks = count, "Embeddings generated");
                }
                Err(e) => {
                    warn!(
                        content_id = %content_id,
                        error = %error_chain(&e),
                        "Embedding generation failed"
                    );
                }
            }
        });
    }

    /// Regenerate embeddings for a content row: delete-then-insert, one
    /// row per chunk. Returns the number of chunks embedded.
    pub async fn generate_embeddings(&self, content_id: &str) -> ServiceResult<usize> {
        let content = self.db.get_content(content_id)?.ok_or_else(|| {
            EmbeddingError::ContentNotFound {
                content_id: content_id.to_string(),
            }
        })?;

        let ctx = self
            .db
            .get_file_context(&content.organization_id, &content.file_id)?
            .ok_or_else(|| crate::error::ServiceError::FileNotFound {
                file_id: content.file_id.clone(),
            })?;

        let chunk_max_tokens = self.config.dynamic().embeddings.chunk_max_tokens;
        let chunks = chunk_text(&content.content_text, chunk_max_tokens);

        self.db.delete_embeddings_for_content(content_id)?;

        let mut inserted = 0usize;
        let mut failed = 0usize;
        for (index, chunk) in chunks.iter().enumerate() {
            let embedding = match self.openai.embed(chunk).await {
                Ok(embedding) => embedding,
                Err(e) => {
                    warn!(
                        content_id = %content_id,
                        chunk_index = index,
                        error = %error_chain(&e),
                        "Chunk embedding failed, skipping"
                    );
                    failed += 1;
                    continue;
                }
            };

            self.db.insert_embedding(&NewEmbedding {
                content_id: content_id.to_string(),
                file_id: content.file_id.clone(),
                organization_id: content.organization_id.clone(),
                chunk_index: index,
                chunk_text: chunk.clone(),
                token_count: estimate_tokens(chunk),
                embedding,
                file_name: ctx.file.file_name.clone(),
                folder_name: ctx.folder.name.clone(),
            })?;
            inserted += 1;
        }

        if failed > 0 {
            warn!(
                content_id = %content_id,
                inserted,
                failed,
                "Embedding generation finished with skipped chunks"
            );
        }

        Ok(inserted)
    }

    /// Semantic search over an organization's documents, results grouped
    /// by file and ordered by best match
    pub async fn search(
        &self,
        organization_id: &str,
        query: &str,
        threshold: f32,
        limit: usize,
    ) -> ServiceResult<Vec<FileMatches>> {
        let query_embedding = self.openai.embed(query).await?;
        let chunks =
            self.db
                .search_embeddings(organization_id, &query_embedding, threshold, limit)?;
        Ok(group_by_file(chunks))
    }
}

/// Estimated token count: 1 token per ~4 characters
pub(crate) fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Split text into sentence-based chunks, each under the token budget.
/// A single oversized sentence becomes its own chunk rather than being
/// split mid-sentence.
pub(crate) fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let sentences = split_sentences(text);

    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        let candidate_len = current.len() + sentence.len();
        if !current.is_empty() && candidate_len.div_ceil(4) > max_tokens {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&sentence);
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect()
}

/// Split on sentence-ending punctuation, keeping the punctuation with
/// the sentence. Text without terminators comes back as one piece.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut ended = false;

    for ch in text.chars() {
        if ended && !matches!(ch, '.' | '!' | '?') {
            sentences.push(std::mem::take(&mut current));
            ended = false;
        }
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            ended = true;
        }
    }
    if !current.is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Group matched chunks by file, chunks ordered by index within a file,
/// files ordered by their best similarity
pub(crate) fn group_by_file(chunks: Vec<EmbeddedChunk>) -> Vec<FileMatches> {
    let mut groups: Vec<FileMatches> = Vec::new();

    for chunk in chunks {
        let entry = groups.iter_mut().find(|g| g.file_id == chunk.file_id);
        let matched = ChunkMatch {
            chunk_text: chunk.chunk_text,
            chunk_index: chunk.chunk_index,
            similarity: chunk.similarity,
        };
        match entry {
            Some(group) => {
                group.max_similarity = group.max_similarity.max(matched.similarity);
                group.chunks.push(matched);
            }
            None => groups.push(FileMatches {
                file_id: chunk.file_id,
                file_name: chunk.file_name,
                folder_name: chunk.folder_name,
                max_similarity: matched.similarity,
                chunks: vec![matched],
            }),
        }
    }

    for group in &mut groups {
        group.chunks.sort_by_key(|c| c.chunk_index);
    }
    groups.sort_by(|a, b| {
        b.max_similarity
            .partial_cmp(&a.max_similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_respect_the_token_budget() {
        let sentence = format!("{}. ", "x".repeat(38));
        let text = sentence.repeat(20);
        let chunks = chunk_text(&text, 20);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(estimate_tokens(chunk) <= 21, "chunk too large: {}", chunk.len());
        }
    }

    #[test]
    fn chunking_splits_on_sentence_boundaries() {
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = chunk_text(text, 7);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.ends_with('.'), "chunk not on boundary: {:?}", chunk);
        }
    }

    #[test]
    fn text_without_terminators_is_one_chunk() {
        let chunks = chunk_text("no punctuation at all", 1500);
        assert_eq!(chunks, vec!["no punctuation at all".to_string()]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_text("   ", 1500).is_empty());
    }

    fn chunk(file: &str, index: usize, similarity: f32) -> EmbeddedChunk {
        EmbeddedChunk {
            id: format!("{}-{}", file, index),
            content_id: "content".to_string(),
            file_id: file.to_string(),
            chunk_index: index,
            chunk_text: format!("chunk {}", index),
            file_name: format!("{}.txt", file),
            folder_name: "Docs".to_string(),
            similarity,
        }
    }

    #[test]
    fn grouping_orders_files_by_best_match_and_chunks_by_index() {
        let results = group_by_file(vec![
            chunk("a", 2, 0.80),
            chunk("b", 0, 0.95),
            chunk("a", 0, 0.90),
        ]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].file_id, "b");
        assert_eq!(results[1].file_id, "a");
        assert!((results[1].max_similarity - 0.90).abs() < 1e-6);
        let indices: Vec<_> = results[1].chunks.iter().map(|c| c.chunk_index).collect();
        assert_eq!(indices, vec![0, 2]);
    }
}
