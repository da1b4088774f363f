//! Axum HTTP server for the OpenAI-compatible gateway.
//!
//! This module builds the router and provides the `serve()` function that
//! runs it on a pre-bound `TcpListener` (from the lifecycle manager).

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use fmgate_core::GenerationPort;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as AnyOrigin, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::completions::chat_completions;
use crate::error::ApiError;
use crate::models::ModelsResponse;
use crate::stream::DEFAULT_FRAGMENT_DELAY;

/// Methods advertised in `access-control-allow-methods`.
const ALLOWED_METHODS: [Method; 3] = [Method::GET, Method::POST, Method::OPTIONS];
const ALLOWED_METHODS_VALUE: &str = "GET, POST, OPTIONS";

/// Headers advertised in `access-control-allow-headers`.
const ALLOWED_HEADERS: [HeaderName; 3] =
    [header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT];
const ALLOWED_HEADERS_VALUE: &str = "content-type, authorization, accept";

/// CORS configuration for the gateway.
#[derive(Debug, Clone, Default)]
pub enum CorsConfig {
    /// Allow all origins (`*`).
    #[default]
    AllowAll,
    /// Allow specific origins.
    AllowOrigins(Vec<String>),
}

impl CorsConfig {
    /// `AllowAll` when `origins` is empty, otherwise an allow-list.
    pub fn from_origins(origins: Vec<String>) -> Self {
        if origins.is_empty() {
            Self::AllowAll
        } else {
            Self::AllowOrigins(origins)
        }
    }
}

/// Behaviour of the HTTP surface.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// When false, `stream: true` requests get a single JSON response.
    pub streaming_enabled: bool,
    /// Pause between streamed fragments.
    pub fragment_delay: Duration,
    /// System-level instructions forwarded to the generation backend.
    pub instructions: Option<String>,
    pub cors: CorsConfig,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            streaming_enabled: true,
            fragment_delay: DEFAULT_FRAGMENT_DELAY,
            instructions: None,
            cors: CorsConfig::default(),
        }
    }
}

/// Shared application state for the gateway.
#[derive(Clone)]
pub struct AppState {
    /// Port for acquiring the generation capability.
    pub(crate) generation: Arc<dyn GenerationPort>,
    pub(crate) config: Arc<ProxyConfig>,
    /// Fires when the server starts draining. Read-only for handlers.
    pub(crate) shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        generation: Arc<dyn GenerationPort>,
        config: ProxyConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            generation,
            config: Arc::new(config),
            shutdown,
        }
    }
}

/// Build CORS layer from configuration.
fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(ALLOWED_HEADERS);

    match config {
        CorsConfig::AllowAll => layer.allow_origin(AnyOrigin),
        CorsConfig::AllowOrigins(origins) => {
            let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            layer.allow_origin(AllowOrigin::list(allowed))
        }
    }
}

/// Create the gateway router.
///
/// Any unmatched (method, path) pair is a 404, including a known path with
/// the wrong method. OPTIONS requests are answered by the CORS layer with
/// 200 and an empty body before reaching any handler. Allowed methods and headers are also
/// attached to every non-preflight response.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/v1/models", get(list_models))
        .route(
            "/v1/chat/completions",
            post(chat_completions).options(preflight),
        )
        .fallback(not_found)
        .method_not_allowed_fallback(not_found)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS_VALUE),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOWED_HEADERS_VALUE),
        ))
        .with_state(state)
}

/// Start the gateway with a pre-bound listener.
///
/// Runs until `cancel` fires, then stops accepting connections and returns
/// once every in-flight response has completed.
///
/// # Arguments
///
/// * `listener` - Pre-bound TCP listener (from the lifecycle manager)
/// * `generation` - Port for acquiring the generation capability
/// * `config` - HTTP surface configuration
/// * `cancel` - Cancellation token for graceful shutdown
pub async fn serve(
    listener: TcpListener,
    generation: Arc<dyn GenerationPort>,
    config: ProxyConfig,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(
        model = %generation.model_id(),
        streaming = %config.streaming_enabled,
        "Gateway server starting on {addr}"
    );

    let app = create_router(AppState::new(generation, config, cancel.clone()));

    info!("Point OpenAI-compatible clients at: http://{addr}/v1");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Gateway server shut down");
    Ok(())
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok"
    }))
}

/// List the model served by the generation backend.
async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    debug!("GET /v1/models");
    Json(ModelsResponse::single(
        state.generation.model_id(),
        Utc::now().timestamp(),
    ))
}

/// Explicit preflight handler; the CORS layer normally answers first.
async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {detail}");
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
