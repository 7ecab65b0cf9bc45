//! Builds transporters for repositories.

use std::sync::Arc;

use thiserror::Error;

use crate::classify::TransferError;
use crate::config::TransportConfig;
use crate::resource::Repository;
use crate::route::{CredentialsProvider, StaticCredentials};
use crate::transfer::HttpTransporter;

/// Priority among transport implementations; higher is tried first.
pub const DEFAULT_PRIORITY: f32 = 5.0;

/// Why no transporter could be created for a repository.
#[derive(Debug, Error)]
pub enum NoTransporter {
    #[error("unsupported URL scheme {scheme:?} for repository {repository}")]
    UnsupportedScheme { repository: String, scheme: String },
    #[error("invalid transport configuration for repository {repository}: {source}")]
    Config {
        repository: String,
        #[source]
        source: TransferError,
    },
}

/// Immutable once built; create one per session and share it.
#[derive(Clone)]
pub struct TransporterFactory {
    config: Arc<TransportConfig>,
    credentials: Arc<dyn CredentialsProvider>,
    priority: f32,
}

impl TransporterFactory {
    /// Factory using the configuration's static server and proxy credentials.
    pub fn new(config: TransportConfig) -> Self {
        let credentials = Arc::new(StaticCredentials::from_config(&config));
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(
        config: TransportConfig,
        credentials: Arc<dyn CredentialsProvider>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            credentials,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn priority(&self) -> f32 {
        self.priority
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    pub fn new_transporter(&self, repository: Repository) -> Result<HttpTransporter, NoTransporter> {
        let scheme = repository.base_url().scheme();
        if scheme != "http" && scheme != "https" {
            return Err(NoTransporter::UnsupportedScheme {
                repository: repository.id.clone(),
                scheme: scheme.to_string(),
            });
        }
        let id = repository.id.clone();
        HttpTransporter::new(
            repository,
            Arc::clone(&self.config),
            Arc::clone(&self.credentials),
        )
        .map_err(|source| NoTransporter::Config {
            repository: id,
            source,
        })
    }
}
