#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod domain;
pub mod ports;
pub mod tokens;
pub mod usage;

// Re-export commonly used types for convenience
pub use domain::{ChatMessage, MessageRole};
pub use ports::{Generation, GenerationError, GenerationPort, GenerationRequest, Generator};
pub use tokens::{estimate_messages, estimate_tokens};
pub use usage::{UsageAccumulator, UsageRecord};
