//! CLI-specific error types and exit codes.

use fmgate_core::GenerationError;
use fmgate_runtime::{BackendError, LifecycleError, SinglePromptError};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid arguments or prompt.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// The generation backend cannot be engaged.
    #[error("Generation unavailable: {0}")]
    Unavailable(String),

    /// The generation backend failed.
    #[error("Generation failed: {0}")]
    Generation(String),

    /// Backend configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The server failed to start or stopped abnormally.
    #[error("Server error: {0}")]
    Server(String),

    /// IO error (reading stdin, writing stdout).
    #[error("IO error: {0}")]
    Io(String),
}

impl CliError {
    /// Map error to appropriate exit code.
    ///
    /// Exit codes follow Unix conventions:
    /// - 0: Success
    /// - 1: General error
    /// - 2: Misuse of shell command (invalid arguments)
    /// - 64-78: Reserved for specific error categories (see sysexits.h)
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Generation(_) | Self::Server(_) => 1,
            Self::Arguments(_) => 2,   // EX_USAGE
            Self::Unavailable(_) => 69, // EX_UNAVAILABLE
            Self::Io(_) => 74,          // EX_IOERR
            Self::Config(_) => 78,      // EX_CONFIG
        }
    }
}

impl From<GenerationError> for CliError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable(reason) => Self::Unavailable(reason),
            GenerationError::Failed(reason) => Self::Generation(reason),
        }
    }
}

impl From<SinglePromptError> for CliError {
    fn from(err: SinglePromptError) -> Self {
        match err {
            SinglePromptError::EmptyPrompt => {
                Self::Arguments(SinglePromptError::EmptyPrompt.to_string())
            }
            SinglePromptError::Generation(e) => e.into(),
        }
    }
}

impl From<BackendError> for CliError {
    fn from(err: BackendError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<LifecycleError> for CliError {
    fn from(err: LifecycleError) -> Self {
        Self::Server(err.to_string())
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Exit code for an error surfaced from [`crate::run`].
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
}
