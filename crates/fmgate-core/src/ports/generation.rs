//! Generation port.
//!
//! The generation capability is opaque to the gateway: given an ordered
//! conversation it produces text. Using it is a two step affair:
//!
//! 1. [`GenerationPort::acquire`] checks that the capability can be engaged
//!    at all (platform present, upstream reachable, ...) and hands out a
//!    [`Generator`]. Failure here means "service unavailable".
//! 2. [`Generator::generate`] runs one completion to the end.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ChatMessage;

/// Input for one completion.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Conversation in order. Never empty when built by the HTTP layer.
    pub messages: Vec<ChatMessage>,
    /// System-level instructions configured for the whole gateway.
    pub instructions: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerationRequest {
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: Option<String>) -> Self {
        self.instructions = instructions;
        self
    }
}

/// Output of one completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    /// The complete generated text.
    pub text: String,
    /// Time spent before output became available.
    pub prompt_latency: Duration,
}

/// Errors that can occur while engaging the generation capability.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// The capability cannot be engaged right now.
    /// Callers should return 503 Service Unavailable.
    #[error("Generation unavailable: {0}")]
    Unavailable(String),

    /// The capability was engaged but the completion failed.
    #[error("Generation failed: {0}")]
    Failed(String),
}

impl GenerationError {
    /// Returns true if this error indicates a temporary condition
    /// where retrying may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Returns a suggested HTTP status code for this error.
    #[must_use]
    pub const fn suggested_status_code(&self) -> u16 {
        match self {
            Self::Unavailable(_) => 503,
            Self::Failed(_) => 500,
        }
    }
}

/// A ready-to-use handle on the generation capability.
#[async_trait]
pub trait Generator: Send + Sync + fmt::Debug {
    /// Run one completion to the end.
    ///
    /// The call may take arbitrarily long; it must not block the executor.
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError>;
}

/// Port for acquiring the generation capability.
#[async_trait]
pub trait GenerationPort: Send + Sync + fmt::Debug {
    /// Identifier advertised for the backing model.
    fn model_id(&self) -> &str;

    /// Engage the capability.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Unavailable`] when the capability cannot
    /// be engaged.
    async fn acquire(&self) -> Result<Arc<dyn Generator>, GenerationError>;
}
