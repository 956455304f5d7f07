//! Chat responder: retrieval-augmented answers over an organization's
//! documents, with source attribution and query tracking.

use tracing::warn;

use crate::auth::AuthContext;
use crate::error::{ServiceResult, error_chain};
use crate::openai::ChatMessage;
use crate::search::FileMatches;
use crate::service::RitaService;

/// The outcome of one chat turn
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    pub response: String,
    pub sources: Vec<String>,
    pub documents_searched: usize,
}

const SYSTEM_PROMPT_WITH_CONTEXT: &str = "You are Rita, an AI assistant that answers questions \
using the organization's uploaded documents. Base your answer on the provided document excerpts. \
When the excerpts do not contain the answer, say so instead of guessing. Mention which document \
the information came from when it is relevant.";

const SYSTEM_PROMPT_NO_CONTEXT: &str = "You are Rita, an AI assistant for this organization. \
No uploaded documents matched the question. Answer helpfully from general knowledge, and note \
that nothing relevant was found in the organization's documents.";

impl RitaService {
    /// Answer a question using the organization's documents as context
    pub async fn chat(&self, ctx: &AuthContext, message: &str) -> ServiceResult<ChatOutcome> {
        let retrieval = self.config.dynamic().retrieval.clone();
        let matches = self
            .search
            .search(
                &ctx.organization_id,
                message,
                retrieval.chat_match_threshold,
                retrieval.chat_match_count,
            )
            .await?;

        let messages = if matches.is_empty() {
            vec![
                ChatMessage::system(SYSTEM_PROMPT_NO_CONTEXT),
                ChatMessage::user(message),
            ]
        } else {
            let context = format_context(&matches);
            vec![
                ChatMessage::system(format!(
                    "{}\n\nDocument excerpts:\n\n{}",
                    SYSTEM_PROMPT_WITH_CONTEXT, context
                )),
                ChatMessage::user(message),
            ]
        };

        let response = self.openai.chat(messages).await?;

        // Usage tracking is best-effort: a failed insert never fails the chat
        let tokens_used = ((message.len() + response.len()).div_ceil(4)) as u32;
        if let Err(e) = self.db.record_query(
            &ctx.user_id,
            &ctx.organization_id,
            message,
            &response,
            tokens_used,
        ) {
            warn!(error = %error_chain(&e), "Failed to record chat query");
        }

        Ok(ChatOutcome {
            response,
            sources: matches.iter().map(|m| m.file_name.clone()).collect(),
            documents_searched: matches.len(),
        })
    }
}

/// Context block grouped by file: chunks under a `**From "file":**` header
fn format_context(matches: &[FileMatches]) -> String {
    matches
        .iter()
        .map(|file| {
            let chunks = file
                .chunks
                .iter()
                .map(|c| c.chunk_text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            format!("**From \"{}\":**\n{}", file.file_name, chunks)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{ChunkMatch, FileMatches};

    #[test]
    fn context_groups_chunks_under_file_headers() {
        let matches = vec![FileMatches {
            file_id: "f1".to_string(),
            file_name: "handbook.pdf".to_string(),
            folder_name: "HR".to_string(),
            max_similarity: 0.9,
            chunks: vec![
                ChunkMatch {
                    chunk_text: "Vacation is 25 days.".to_string(),
                    chunk_index: 0,
                    similarity: 0.9,
                },
                ChunkMatch {
                    chunk_text: "Carry-over needs approval.".to_string(),
                    chunk_index: 1,
                    similarity: 0.8,
                },
            ],
        }];

        let context = format_context(&matches);
        assert!(context.starts_with("**From \"handbook.pdf\":**"));
        assert!(context.contains("Vacation is 25 days.\n\nCarry-over needs approval."));
    }
}
