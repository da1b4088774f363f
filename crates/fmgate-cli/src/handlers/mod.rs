//! Command handlers.

pub mod prompt;
pub mod serve;
