//! Command-line definition.
//!
//! Every option can also come from the environment (`FMGATE_*`), and a
//! `.env` file is loaded before parsing.

use std::time::Duration;

use clap::{Parser, ValueEnum};
use fmgate_proxy::{CorsConfig, ProxyConfig};
use fmgate_runtime::backends::DEFAULT_MODEL_ID;
use fmgate_runtime::lifecycle::{DEFAULT_HOST, DEFAULT_PORT};
use fmgate_runtime::{BackendConfig, BackendKind, ServerConfig};

/// Generation backend selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendArg {
    /// Reply with the last user message (no model required)
    Echo,
    /// Forward to an OpenAI-compatible server
    Upstream,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Echo => Self::Echo,
            BackendArg::Upstream => Self::Upstream,
        }
    }
}

/// OpenAI-compatible chat completions gateway.
///
/// Serves `/v1/chat/completions` until interrupted, or answers a single
/// prompt and exits when one is given with `--single-prompt` or on stdin.
#[derive(Debug, Parser)]
#[command(name = "fmgate")]
#[command(about = "Serve a local text generator behind an OpenAI-compatible API")]
#[command(version)]
pub struct Cli {
    /// Port to listen on
    #[arg(short, long, env = "FMGATE_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address to bind to
    #[arg(long, env = "FMGATE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", env = "FMGATE_VERBOSE")]
    pub verbose: bool,

    /// Answer `stream: true` requests with a single JSON response
    #[arg(long = "no-streaming", env = "FMGATE_NO_STREAMING")]
    pub no_streaming: bool,

    /// System instructions passed to the generation backend
    #[arg(long, env = "FMGATE_INSTRUCTIONS")]
    pub instructions: Option<String>,

    /// Run one completion for this prompt, print it and exit
    #[arg(short = 's', long = "single-prompt")]
    pub single_prompt: Option<String>,

    /// Generation backend
    #[arg(long, value_enum, env = "FMGATE_BACKEND", default_value_t = BackendArg::Echo)]
    pub backend: BackendArg,

    /// Base URL of the upstream server (for `--backend upstream`)
    #[arg(long = "upstream-url", env = "FMGATE_UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    /// Model identifier reported by /v1/models
    #[arg(long, env = "FMGATE_MODEL", default_value = DEFAULT_MODEL_ID)]
    pub model: String,

    /// Delay between streamed fragments, in milliseconds
    #[arg(long = "stream-delay-ms", env = "FMGATE_STREAM_DELAY_MS", default_value_t = 20)]
    pub stream_delay_ms: u64,

    /// Stop waiting for in-flight requests after this many seconds on shutdown
    #[arg(long = "shutdown-grace-secs", env = "FMGATE_SHUTDOWN_GRACE_SECS")]
    pub shutdown_grace_secs: Option<u64>,

    /// Allowed CORS origin (repeatable). Any origin is allowed when omitted.
    #[arg(long = "cors-origin", env = "FMGATE_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,
}

impl Cli {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            grace_period: self.shutdown_grace_secs.map(Duration::from_secs),
        }
    }

    pub fn proxy_config(&self) -> ProxyConfig {
        ProxyConfig {
            streaming_enabled: !self.no_streaming,
            fragment_delay: Duration::from_millis(self.stream_delay_ms),
            instructions: self.instructions.clone(),
            cors: CorsConfig::from_origins(self.cors_origins.clone()),
        }
    }

    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            kind: self.backend.into(),
            upstream_url: self.upstream_url.clone(),
            model_id: self.model.clone(),
        }
    }
}
