//! One completion without a server.
//!
//! Used by the CLI when a prompt is given on the command line or piped in.

use fmgate_core::{ChatMessage, GenerationError, GenerationPort, GenerationRequest};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SinglePromptError {
    /// The prompt was empty or whitespace only.
    #[error("Prompt must not be empty")]
    EmptyPrompt,

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Run `prompt` through the backend and return the generated text.
///
/// Empty prompts are rejected before the backend is acquired.
///
/// # Errors
///
/// Returns [`SinglePromptError::EmptyPrompt`] for an empty prompt, otherwise
/// whatever the backend reports.
pub async fn run_single_prompt(
    generation: &dyn GenerationPort,
    prompt: &str,
    instructions: Option<String>,
) -> Result<String, SinglePromptError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(SinglePromptError::EmptyPrompt);
    }

    debug!(model = %generation.model_id(), chars = prompt.len(), "Running single prompt");

    let generator = generation.acquire().await?;
    let request =
        GenerationRequest::new(vec![ChatMessage::user(prompt)]).with_instructions(instructions);
    let output = generator.generate(&request).await?;
    Ok(output.text)
}
