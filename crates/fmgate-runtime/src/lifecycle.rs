//! Server lifecycle manager.
//!
//! `GatewayServer` walks a fixed state machine:
//!
//! ```text
//! Created --bind()--> Listening --shutdown()--> Draining --in-flight done--> Stopped
//! ```
//!
//! Key design decisions:
//! - **Bind-then-report**: the socket is bound before anything is served, so
//!   a bind failure surfaces as [`LifecycleError::BindFailed`] and the real
//!   address (port 0 resolves here) is known up front.
//! - **One shutdown flag**: a single [`CancellationToken`] stops the accept
//!   loop and tells in-flight streams to flush without pacing.
//! - **Observable state**: transitions are published on a `watch` channel.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fmgate_core::GenerationPort;
use fmgate_proxy::ProxyConfig;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 9999;

/// Default bind host.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Where the server is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Configured but not bound.
    Created,
    /// Accepting connections.
    Listening,
    /// Shutdown requested; new connections are refused, in-flight ones finish.
    Draining,
    /// Every connection has completed.
    Stopped,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Listening => write!(f, "Listening"),
            Self::Draining => write!(f, "Draining"),
            Self::Stopped => write!(f, "Stopped"),
        }
    }
}

/// Error from lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// Failed to bind to address.
    #[error("Failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// `run()` or `bind()` called in the wrong state.
    #[error("Server is {0}, expected {1}")]
    InvalidState(LifecycleState, LifecycleState),

    /// The server task ended with an error.
    #[error("Server error: {0}")]
    Server(String),

    /// The server task panicked.
    #[error("Server task panicked: {0}")]
    Panicked(String),

    /// In-flight connections did not finish within the grace period.
    #[error("In-flight requests did not finish within {0:?}")]
    GraceExpired(Duration),
}

/// Where and how the server listens.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to (e.g., "127.0.0.1" or "0.0.0.0").
    pub host: String,
    /// Port to bind to (0 for auto-assign).
    pub port: u16,
    /// Upper bound on draining. `None` waits for every in-flight response.
    pub grace_period: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            grace_period: None,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Cloneable handle used to request a graceful shutdown.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    token: CancellationToken,
}

impl ShutdownHandle {
    /// Request shutdown. Idempotent.
    pub fn shutdown(&self) {
        if !self.token.is_cancelled() {
            info!("Shutdown requested");
        }
        self.token.cancel();
    }

    /// Resolves once shutdown has been requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }
}

/// The gateway's listening server.
///
/// # Example
///
/// ```ignore
/// let mut server = GatewayServer::new(ServerConfig::default());
/// let addr = server.bind().await?;
/// let handle = server.shutdown_handle();
/// tokio::spawn(async move { wait_for_signal().await; handle.shutdown() });
/// server.run(generation, ProxyConfig::default()).await?;
/// ```
pub struct GatewayServer {
    config: ServerConfig,
    state: watch::Sender<LifecycleState>,
    cancel: CancellationToken,
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
}

impl GatewayServer {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let (state, _) = watch::channel(LifecycleState::Created);
        Self {
            config,
            state,
            cancel: CancellationToken::new(),
            listener: None,
            local_addr: None,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Receiver for lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            token: self.cancel.clone(),
        }
    }

    /// Address actually bound, once listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn transition(&self, next: LifecycleState) {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "Lifecycle transition");
    }

    fn expect_state(&self, expected: LifecycleState) -> Result<(), LifecycleError> {
        let current = self.state();
        if current == expected {
            Ok(())
        } else {
            Err(LifecycleError::InvalidState(current, expected))
        }
    }

    /// Bind the listening socket. `Created -> Listening`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::BindFailed`] if the address cannot be bound
    /// (port in use, permission denied, bad host).
    pub async fn bind(&mut self) -> Result<SocketAddr, LifecycleError> {
        self.expect_state(LifecycleState::Created)?;

        let bind_addr = self.config.bind_address();
        let listener =
            TcpListener::bind(&bind_addr)
                .await
                .map_err(|e| LifecycleError::BindFailed {
                    address: bind_addr.clone(),
                    reason: e.to_string(),
                })?;

        let bound_addr = listener
            .local_addr()
            .map_err(|e| LifecycleError::BindFailed {
                address: bind_addr,
                reason: format!("Failed to get local address: {e}"),
            })?;

        info!("Gateway bound to {bound_addr}");
        self.listener = Some(listener);
        self.local_addr = Some(bound_addr);
        self.transition(LifecycleState::Listening);
        Ok(bound_addr)
    }

    /// Serve until shutdown is requested, then drain. `Listening -> Draining -> Stopped`.
    ///
    /// Returns once every in-flight response has completed, or with
    /// [`LifecycleError::GraceExpired`] if a grace period is configured and
    /// exceeded. In that case the server task is aborted and connections
    /// still open are no longer waited for.
    ///
    /// # Errors
    ///
    /// Returns an error if the server was not bound, the server task failed,
    /// or the grace period expired.
    pub async fn run(
        mut self,
        generation: Arc<dyn GenerationPort>,
        proxy_config: ProxyConfig,
    ) -> Result<(), LifecycleError> {
        self.expect_state(LifecycleState::Listening)?;
        let listener = self
            .listener
            .take()
            .ok_or(LifecycleError::InvalidState(
                LifecycleState::Created,
                LifecycleState::Listening,
            ))?;

        let cancel = self.cancel.clone();
        let mut task: JoinHandle<anyhow::Result<()>> = tokio::spawn(async move {
            fmgate_proxy::serve(listener, generation, proxy_config, cancel).await
        });

        tokio::select! {
            result = &mut task => {
                // Finished without a shutdown request.
                self.transition(LifecycleState::Stopped);
                error!("Gateway stopped unexpectedly");
                return Self::task_result(result);
            }
            () = self.cancel.cancelled() => {}
        }

        self.transition(LifecycleState::Draining);
        info!("Draining in-flight requests");

        let result = match self.config.grace_period {
            Some(grace) => match tokio::time::timeout(grace, &mut task).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(grace = ?grace, "Grace period expired, aborting in-flight requests");
                    task.abort();
                    self.transition(LifecycleState::Stopped);
                    return Err(LifecycleError::GraceExpired(grace));
                }
            },
            None => task.await,
        };

        self.transition(LifecycleState::Stopped);
        info!("Gateway stopped");
        Self::task_result(result)
    }

    fn task_result(
        result: Result<anyhow::Result<()>, tokio::task::JoinError>,
    ) -> Result<(), LifecycleError> {
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(LifecycleError::Server(e.to_string())),
            Err(e) => Err(LifecycleError::Panicked(e.to_string())),
        }
    }
}
