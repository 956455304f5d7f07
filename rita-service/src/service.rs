//! Core service orchestration.
//!
//! `RitaService` wires the database, blob store, auth client, and the
//! extraction/search services together, and owns the request-identity
//! and file-management flows the API handlers call into.

pub mod chat;

use std::sync::Arc;

use tracing::{info, warn};

use crate::auth::{AuthClient, AuthContext};
use crate::config::RuntimeConfig;
use crate::db::{Database, DocumentFile};
use crate::error::{ExtractionError, ServiceError, ServiceResult};
use crate::extraction::ExtractionService;
use crate::openai::OpenAiClient;
use crate::search::SearchService;
use crate::storage::BlobStore;

/// Main service that coordinates all operations
pub struct RitaService {
    pub db: Arc<Database>,
    pub config: Arc<RuntimeConfig>,
    pub storage: Arc<BlobStore>,
    pub auth: AuthClient,
    pub openai: Arc<OpenAiClient>,
    pub search: Arc<SearchService>,
    pub extraction: ExtractionService,
}

impl RitaService {
    /// Create a new service instance
    pub fn new(db: Arc<Database>, config: Arc<RuntimeConfig>) -> ServiceResult<Self> {
        let storage = Arc::new(BlobStore::new(&config.static_config.storage.data_dir)?);
        let auth = AuthClient::new(config.dynamic().auth.clone())?;
        let openai = Arc::new(OpenAiClient::new(config.dynamic().openai.clone())?);
        let search = Arc::new(SearchService::new(db.clone(), openai.clone(), config.clone()));
        let extraction = ExtractionService::new(db.clone(), storage.clone(), search.clone());

        Ok(Self {
            db,
            config,
            storage,
            auth,
            openai,
            search,
            extraction,
        })
    }

    /// Resolve a bearer token to a user and their organization.
    /// A user without a profile row has no tenant and is rejected.
    pub async fn authorize(&self, token: &str) -> ServiceResult<AuthContext> {
        let user = self.auth.verify(token).await?;

        let profile =
            self.db
                .get_profile(&user.id)?
                .ok_or_else(|| ServiceError::Authentication {
                    message: "user organization not found".to_string(),
                })?;

        Ok(AuthContext {
            user_id: user.id,
            organization_id: profile.organization_id,
        })
    }

    /// Store an uploaded file: blob to disk, metadata row in `pending`
    pub fn upload_file(
        &self,
        ctx: &AuthContext,
        folder_id: &str,
        file_name: &str,
        mime_type: Option<&str>,
        data: &[u8],
    ) -> ServiceResult<DocumentFile> {
        let folder = self
            .db
            .get_folder(&ctx.organization_id, folder_id)?
            .ok_or_else(|| ServiceError::FolderNotFound {
                folder_id: folder_id.to_string(),
            })?;

        let max = self.config.dynamic().limits.max_file_size_bytes;
        if data.len() as u64 > max {
            return Err(ExtractionError::FileTooLarge {
                size: data.len() as u64,
                max,
            }
            .into());
        }

        let mut file =
            self.db
                .create_file(&folder.id, file_name, "", data.len() as u64, mime_type)?;
        let path = self.storage.save(&file.id, file_name, data)?;
        self.db.set_file_path(&file.id, &path)?;
        file.file_path = path;

        info!(file_id = %file.id, file_name = %file.file_name, size = file.file_size, "File uploaded");
        Ok(file)
    }

    /// Delete a file: blob, metadata row, and (by cascade) its content
    /// and embeddings
    pub fn delete_file(&self, ctx: &AuthContext, file_id: &str) -> ServiceResult<bool> {
        let Some(file_ctx) = self.db.get_file_context(&ctx.organization_id, file_id)? else {
            return Ok(false);
        };

        self.storage.remove(&file_ctx.file.file_path)?;
        self.db.delete_file(file_id)
    }

    /// Startup recovery: files left in `processing` by a crashed run are
    /// flipped to `failed` so the lease is not held forever
    pub fn recover_interrupted_extractions(&self) -> ServiceResult<usize> {
        self.db
            .recover_stale_processing("extraction interrupted by service restart")
    }

    /// Tolerant startup verification of the external API; a failure is
    /// logged, not fatal, since the key may be configured later
    pub async fn verify_external_services(&self) {
        match self.openai.health_check().await {
            Ok(true) => info!("OpenAI API reachable"),
            Ok(false) => warn!("OpenAI API not reachable; embeddings and chat will fail"),
            Err(e) => warn!(error = %e, "OpenAI health check errored"),
        }
    }
}
