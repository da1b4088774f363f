#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod completions;
pub mod error;
pub mod models;
pub mod server;
pub mod stream;

pub use error::{ApiError, ErrorKind};
pub use server::{AppState, CorsConfig, ProxyConfig, create_router, serve};
pub use stream::{StreamEncoder, StreamFrame, StreamOutcome};
