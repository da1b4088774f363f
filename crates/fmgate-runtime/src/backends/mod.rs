//! Generation backends.
//!
//! Each backend implements [`GenerationPort`]. [`build_backend`] picks one
//! from a [`BackendConfig`] so callers only ever see the trait object.

mod echo;
mod upstream;

use std::fmt;
use std::sync::Arc;

use fmgate_core::GenerationPort;
use thiserror::Error;
use tracing::info;

pub use echo::{EchoBackend, EchoGenerator, GREETING};
pub use upstream::UpstreamBackend;

/// Model identifier advertised when none is configured.
pub const DEFAULT_MODEL_ID: &str = "foundation";

/// Which backend serves completions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Echo,
    Upstream,
}

impl BackendKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Upstream => "upstream",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend selection plus what each backend needs.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL of the upstream server. Required for [`BackendKind::Upstream`].
    pub upstream_url: Option<String>,
    pub model_id: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            upstream_url: None,
            model_id: DEFAULT_MODEL_ID.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("The upstream backend requires an upstream URL")]
    MissingUpstreamUrl,

    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Construct the configured backend.
///
/// # Errors
///
/// Returns [`BackendError::MissingUpstreamUrl`] when the upstream backend is
/// selected without a URL.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn GenerationPort>, BackendError> {
    let backend: Arc<dyn GenerationPort> = match config.kind {
        BackendKind::Echo => Arc::new(EchoBackend::new(config.model_id.clone())),
        BackendKind::Upstream => {
            let url = config
                .upstream_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or(BackendError::MissingUpstreamUrl)?;
            Arc::new(UpstreamBackend::new(url, config.model_id.clone())?)
        }
    };

    info!(backend = %config.kind, model = %config.model_id, "Generation backend ready");
    Ok(backend)
}
