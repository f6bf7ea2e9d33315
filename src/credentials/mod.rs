//! Upstream credential supply: anonymous fetch with a backup-pool fallback.

mod anonymous;
mod pool;

use std::fmt;
use std::sync::Arc;

pub use anonymous::{AnonymousTokenSource, HttpAnonymousTokenSource};
pub use pool::{mask_token, BackupTokenPool, BackupTokenStatus, TokenStats};

use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Anonymous,
    Backup,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Anonymous => f.write_str("anonymous"),
            CredentialSource::Backup => f.write_str("backup"),
        }
    }
}

/// A resolved upstream credential and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub value: String,
    pub source: CredentialSource,
}

impl Credential {
    /// Log-safe rendering. Anonymous tokens are short-lived and shown as is.
    #[must_use]
    pub fn display(&self) -> String {
        match self.source {
            CredentialSource::Anonymous => self.value.clone(),
            CredentialSource::Backup => mask_token(&self.value),
        }
    }
}

/// Picks the credential for one request.
pub struct CredentialResolver {
    anonymous: Option<Arc<dyn AnonymousTokenSource>>,
    pool: Arc<BackupTokenPool>,
}

impl CredentialResolver {
    /// `anonymous` is `None` when anonymous mode is disabled.
    #[must_use]
    pub fn new(anonymous: Option<Arc<dyn AnonymousTokenSource>>, pool: Arc<BackupTokenPool>) -> Self {
        Self { anonymous, pool }
    }

    #[must_use]
    pub fn anonymous_mode(&self) -> bool {
        self.anonymous.is_some()
    }

    #[must_use]
    pub fn pool(&self) -> &Arc<BackupTokenPool> {
        &self.pool
    }

    /// Resolve a credential, trying the anonymous source first when enabled.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Credential`] when the anonymous fetch is
    /// unavailable and the backup pool is empty.
    pub async fn resolve(&self) -> Result<Credential, GatewayError> {
        if let Some(source) = &self.anonymous {
            match source.fetch().await {
                Ok(value) => {
                    return Ok(Credential {
                        value,
                        source: CredentialSource::Anonymous,
                    })
                }
                Err(err) => {
                    tracing::debug!(error = %err, "anonymous token fetch failed, falling back to backup pool");
                }
            }
        }

        self.pool
            .next_token()
            .map(|value| Credential {
                value,
                source: CredentialSource::Backup,
            })
            .ok_or_else(|| {
                GatewayError::Credential("no upstream credential available: backup token pool is empty".into())
            })
    }
}
