//! Deterministic echo backend.
//!
//! Replies with the content of the last user message. Always available;
//! useful for smoke runs and for exercising clients without a model.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fmgate_core::{
    Generation, GenerationError, GenerationPort, GenerationRequest, Generator, MessageRole,
};

/// Reply used when the conversation has no user message.
pub const GREETING: &str = "Hello! How can I help you today?";

/// Generation port backed by [`EchoGenerator`].
#[derive(Debug, Clone)]
pub struct EchoBackend {
    model_id: String,
}

impl EchoBackend {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
        }
    }
}

#[async_trait]
impl GenerationPort for EchoBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn acquire(&self) -> Result<Arc<dyn Generator>, GenerationError> {
        Ok(Arc::new(EchoGenerator))
    }
}

#[derive(Debug)]
pub struct EchoGenerator;

#[async_trait]
impl Generator for EchoGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        let started = Instant::now();
        let text = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User && !m.content.trim().is_empty())
            .map_or_else(|| GREETING.to_string(), |m| format!("You said: {}", m.content));

        Ok(Generation {
            text,
            prompt_latency: started.elapsed(),
        })
    }
}
