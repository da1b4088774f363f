#![doc = include_str!("../README.md")]
#![deny(unsafe_code)]

pub mod backends;
pub mod lifecycle;
pub mod signal;
pub mod single_prompt;

use std::sync::Arc;

use fmgate_core::GenerationPort;
use fmgate_proxy::ProxyConfig;

pub use backends::{BackendConfig, BackendError, BackendKind, build_backend};
pub use lifecycle::{GatewayServer, LifecycleError, LifecycleState, ServerConfig, ShutdownHandle};
pub use signal::{spawn_signal_listener, wait_for_signal};
pub use single_prompt::{SinglePromptError, run_single_prompt};

/// Bind, serve until Ctrl-C or SIGTERM, then drain.
///
/// # Errors
///
/// Returns an error if the address cannot be bound, the server fails, or
/// draining exceeds the configured grace period.
pub async fn serve_until_signal(
    server_config: ServerConfig,
    generation: Arc<dyn GenerationPort>,
    proxy_config: ProxyConfig,
) -> Result<(), LifecycleError> {
    let mut server = GatewayServer::new(server_config);
    let addr = server.bind().await?;
    tracing::info!("Gateway listening on http://{addr}");

    let signals = spawn_signal_listener(server.shutdown_handle());
    let result = server.run(generation, proxy_config).await;
    signals.abort();
    result
}
