//! Identity resolution.
//!
//! Sign-in, token issuance and email verification live in an external
//! identity provider; this service only translates a bearer credential into
//! a verified-identity record through the [`IdentityResolver`] trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Verified identity of the calling user, as produced by the resolver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub user_id: Uuid,
    pub verified_emails: Vec<String>,
    pub primary_email: String,
    pub display_name: String,
}

impl Identity {
    /// Case-folded membership test over the verified email set.
    pub fn has_verified_email(&self, email: &str) -> bool {
        let folded = email.to_lowercase();
        self.verified_emails
            .iter()
            .any(|candidate| candidate.to_lowercase() == folded)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Invalid or expired credential")]
    Unauthorized,

    #[error("Identity resolver unavailable: {0}")]
    Unavailable(String),
}

/// Translates a bearer credential into an [`Identity`].
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, bearer_token: &str) -> Result<Identity, ResolveError>;
}

/// Production resolver: asks the external identity service over HTTP,
/// authenticating itself with the configured shared secret.
pub struct HttpIdentityResolver {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl HttpIdentityResolver {
    pub fn new(base_url: impl Into<String>, secret: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into(),
            secret: secret.into(),
        }
    }
}

#[async_trait]
impl IdentityResolver for HttpIdentityResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<Identity, ResolveError> {
        let url = format!("{}/v1/identity", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .bearer_auth(bearer_token)
            .header("x-service-secret", &self.secret)
            .send()
            .await
            .map_err(|err| ResolveError::Unavailable(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<Identity>()
                .await
                .map_err(|err| ResolveError::Unavailable(err.to_string()))
        } else if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            Err(ResolveError::Unauthorized)
        } else {
            Err(ResolveError::Unavailable(format!(
                "resolver returned {status}"
            )))
        }
    }
}

/// Fixed token→identity table. Serves tests and local development without a
/// running identity service.
#[derive(Default)]
pub struct StaticIdentityResolver {
    identities: std::collections::HashMap<String, Identity>,
}

impl StaticIdentityResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, token: impl Into<String>, identity: Identity) -> Self {
        self.identities.insert(token.into(), identity);
        self
    }
}

#[async_trait]
impl IdentityResolver for StaticIdentityResolver {
    async fn resolve(&self, bearer_token: &str) -> Result<Identity, ResolveError> {
        self.identities
            .get(bearer_token)
            .cloned()
            .ok_or(ResolveError::Unauthorized)
    }
}
