//! Extraction orchestrator.
//!
//! Given a file id, acquires the processing lease, downloads the blob,
//! dispatches to a format extractor, normalizes the text, persists the
//! content row, and fires the embedding trigger. Extractor errors flip
//! the file to `failed` and propagate; the embedding trigger's outcome
//! never affects the result.

pub mod formats;

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::db::{Database, FileContext, ProcessingStatus};
use crate::error::{ExtractionError, ServiceResult, error_chain};
use crate::search::SearchService;
use crate::storage::BlobStore;

/// Stats returned to the caller on successful extraction
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionStats {
    pub character_count: usize,
    pub word_count: usize,
}

/// Document text extraction service
pub struct ExtractionService {
    db: Arc<Database>,
    storage: Arc<BlobStore>,
    search: Arc<SearchService>,
}

impl ExtractionService {
    pub fn new(db: Arc<Database>, storage: Arc<BlobStore>, search: Arc<SearchService>) -> Self {
        Self { db, storage, search }
    }

    /// Extract text for a file owned by the caller's organization.
    ///
    /// Re-extraction fully replaces the previous content row. On failure
    /// after the lease is held, the file is flagged `failed` with the
    /// error chain stored for inspection.
    pub async fn extract_file(
        &self,
        organization_id: &str,
        file_id: &str,
    ) -> ServiceResult<ExtractionStats> {
        let ctx = self
            .db
            .get_file_context(organization_id, file_id)?
            .ok_or_else(|| crate::error::ServiceError::FileNotFound {
                file_id: file_id.to_string(),
            })?;

        // Lease: only one extraction per file at a time. Denied means a
        // concurrent run holds the lease, so we must not touch the status.
        if !self.db.try_begin_processing(file_id)? {
            return Err(ExtractionError::AlreadyProcessing {
                file_id: file_id.to_string(),
            }
            .into());
        }

        match self.run_pipeline(&ctx).await {
            Ok(stats) => {
                info!(
                    file_id = %file_id,
                    characters = stats.character_count,
                    words = stats.word_count,
                    "Extraction completed"
                );
                Ok(stats)
            }
            Err(e) => {
                let detail = error_chain(&e);
                warn!(file_id = %file_id, error = %detail, "Extraction failed");
                self.db
                    .set_file_status(file_id, ProcessingStatus::Failed, Some(&detail))?;
                Err(e)
            }
        }
    }

    async fn run_pipeline(&self, ctx: &FileContext) -> ServiceResult<ExtractionStats> {
        let file = &ctx.file;

        let extension = file_extension(&file.file_name);
        let extractor =
            formats::extractor_for(&extension).ok_or(ExtractionError::UnsupportedType {
                extension: extension.clone(),
            })?;

        let data = self.storage.read(&file.file_path)?;
        let raw = extractor.extract(&data)?;
        let text = normalize_text(&raw);

        if text.is_empty() {
            return Err(ExtractionError::EmptyContent.into());
        }

        let content = self
            .db
            .upsert_content(&file.id, &ctx.folder.organization_id, &text)?;
        self.db
            .set_file_status(&file.id, ProcessingStatus::Completed, None)?;

        // Fire-and-forget: embedding failures are logged inside the task
        // and never surface here
        self.search.spawn_embedding_generation(content.id);

        Ok(text_stats(&text))
    }
}

/// Lowercased extension of a file name; empty when there is none
fn file_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => String::new(),
    }
}

/// Whitespace normalization applied to every extractor's output:
/// unify line endings, collapse runs of blank lines to one blank line,
/// tabs to a space, runs of spaces to one, trim.
pub(crate) fn normalize_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n").replace('\r', "\n");

    let mut out = String::with_capacity(unified.len());
    let mut newline_run = 0usize;
    let mut space_run = 0usize;

    for ch in unified.chars() {
        match ch {
            '\n' => {
                space_run = 0;
                newline_run += 1;
                if newline_run <= 2 {
                    out.push('\n');
                }
            }
            ' ' | '\t' => {
                newline_run = 0;
                space_run += 1;
                if space_run == 1 {
                    out.push(' ');
                }
            }
            _ => {
                newline_run = 0;
                space_run = 0;
                out.push(ch);
            }
        }
    }

    out.trim().to_string()
}

/// Character and word counts of the final normalized text
pub(crate) fn text_stats(text: &str) -> ExtractionStats {
    ExtractionStats {
        character_count: text.chars().count(),
        word_count: text.split_whitespace().count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::ServiceError;
    use crate::openai::OpenAiClient;

    fn make_service(dir: &std::path::Path) -> (ExtractionService, Arc<Database>, Arc<BlobStore>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let storage = Arc::new(BlobStore::new(dir).unwrap());
        let config = Arc::new(RuntimeConfig::for_tests(dir.to_path_buf()));
        let openai = Arc::new(OpenAiClient::new(config.dynamic().openai.clone()).unwrap());
        let search = Arc::new(SearchService::new(db.clone(), openai, config));
        (
            ExtractionService::new(db.clone(), storage.clone(), search),
            db,
            storage,
        )
    }

    fn upload(
        db: &Database,
        storage: &BlobStore,
        org_id: &str,
        file_name: &str,
        data: &[u8],
    ) -> String {
        let folder = db.create_folder(org_id, "Docs", None).unwrap();
        let file = db
            .create_file(&folder.id, file_name, "placeholder", data.len() as u64, None)
            .unwrap();
        let path = storage.save(&file.id, file_name, data).unwrap();
        // Point the row at the real blob location
        db.set_file_path(&file.id, &path).unwrap();
        file.id
    }

    #[tokio::test]
    async fn csv_extraction_completes_with_verbatim_text() {
        let dir = tempfile::tempdir().unwrap();
        let (service, db, storage) = make_service(dir.path());
        let org = db.create_organization("Acme").unwrap();
        let file_id = upload(&db, &storage, &org.id, "report.csv", b"a,b\n1,2");

        let stats = service.extract_file(&org.id, &file_id).await.unwrap();

        assert_eq!(stats.character_count, 7);
        assert_eq!(stats.word_count, 2);

        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Completed);
        let content = db.get_content_by_file(&file_id).unwrap().unwrap();
        assert_eq!(content.content_text, "a,b\n1,2");
    }

    #[tokio::test]
    async fn unsupported_extension_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let (service, db, storage) = make_service(dir.path());
        let org = db.create_organization("Acme").unwrap();
        let file_id = upload(&db, &storage, &org.id, "archive.zip", b"PK\x03\x04");

        let err = service.extract_file(&org.id, &file_id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Extraction(ExtractionError::UnsupportedType { .. })
        ));

        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Failed);
        assert!(file.processing_error.unwrap().contains("zip"));
    }

    #[tokio::test]
    async fn concurrent_retrigger_is_rejected_without_status_change() {
        let dir = tempfile::tempdir().unwrap();
        let (service, db, storage) = make_service(dir.path());
        let org = db.create_organization("Acme").unwrap();
        let file_id = upload(&db, &storage, &org.id, "notes.txt", b"hello");

        assert!(db.try_begin_processing(&file_id).unwrap());

        let err = service.extract_file(&org.id, &file_id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Extraction(ExtractionError::AlreadyProcessing { .. })
        ));

        // The in-flight run still holds the lease
        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Processing);
    }

    #[tokio::test]
    async fn reextraction_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let (service, db, storage) = make_service(dir.path());
        let org = db.create_organization("Acme").unwrap();
        let file_id = upload(&db, &storage, &org.id, "notes.txt", b"first version");

        service.extract_file(&org.id, &file_id).await.unwrap();
        let first = db.get_content_by_file(&file_id).unwrap().unwrap();

        let file = db.get_file(&file_id).unwrap().unwrap();
        storage
            .save(&file.id, "notes.txt", b"second version")
            .unwrap();

        service.extract_file(&org.id, &file_id).await.unwrap();
        let second = db.get_content_by_file(&file_id).unwrap().unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.content_text, "second version");
    }

    #[tokio::test]
    async fn control_only_bytes_fail_with_empty_content() {
        let dir = tempfile::tempdir().unwrap();
        let (service, db, storage) = make_service(dir.path());
        let org = db.create_organization("Acme").unwrap();
        let file_id = upload(&db, &storage, &org.id, "blob.pdf", &[0u8, 1, 2, 3]);

        let err = service.extract_file(&org.id, &file_id).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Extraction(ExtractionError::EmptyContent)
        ));

        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Failed);
    }

    #[tokio::test]
    async fn embedding_trigger_failure_does_not_affect_result() {
        // The test config points at an unreachable embedding endpoint, so
        // the spawned task always fails; extraction must still succeed.
        let dir = tempfile::tempdir().unwrap();
        let (service, db, storage) = make_service(dir.path());
        let org = db.create_organization("Acme").unwrap();
        let file_id = upload(&db, &storage, &org.id, "notes.txt", b"plain text");

        let stats = service.extract_file(&org.id, &file_id).await.unwrap();
        assert_eq!(stats.word_count, 2);

        tokio::task::yield_now().await;
        let file = db.get_file(&file_id).unwrap().unwrap();
        assert_eq!(file.processing_status, ProcessingStatus::Completed);
    }

    #[test]
    fn normalization_rules() {
        assert_eq!(normalize_text("a\r\nb\rc"), "a\nb\nc");
        assert_eq!(normalize_text("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(normalize_text("a\t\tb   c"), "a b c");
        assert_eq!(normalize_text("  padded  "), "padded");
    }

    #[test]
    fn stats_count_words_and_chars_of_normalized_text() {
        let stats = text_stats("a,b\n1,2");
        assert_eq!(stats.character_count, 7);
        assert_eq!(stats.word_count, 2);
    }

    #[test]
    fn extension_is_lowercased_and_optional() {
        assert_eq!(file_extension("Report.PDF"), "pdf");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension(".hidden"), "");
    }
}
