//! Bearer-token verification against the external auth service.
//!
//! The service never issues tokens; it only verifies inbound bearer tokens
//! and maps the authenticated user to an organization via `profiles`.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::AuthConfig;
use crate::error::{ServiceError, ServiceResult};

/// The externally-authenticated user behind a bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// The resolved request identity: user plus organization scope
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub organization_id: String,
}

/// Client for the external auth service
pub struct AuthClient {
    client: Client,
    config: AuthConfig,
}

impl AuthClient {
    /// Create a new auth client
    pub fn new(config: AuthConfig) -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ServiceError::Internal {
                message: format!("Failed to build auth client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    /// Verify a bearer token, returning the user it belongs to
    pub async fn verify(&self, token: &str) -> ServiceResult<AuthUser> {
        let url = format!("{}/auth/v1/user", self.config.base_url);

        let response = self
            .client
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| ServiceError::Authentication {
                message: format!("auth service unreachable: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(ServiceError::Authentication {
                message: "invalid or expired token".to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ServiceError::Authentication {
                message: format!("malformed auth response: {}", e),
            })
    }
}
