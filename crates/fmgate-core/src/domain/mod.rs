//! Domain types shared by every adapter.

mod chat;

pub use chat::{ChatMessage, MessageRole};
