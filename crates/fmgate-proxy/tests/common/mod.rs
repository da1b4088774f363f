//! Shared generation stubs and request helpers for router tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use fmgate_core::{Generation, GenerationError, GenerationPort, GenerationRequest, Generator};
use fmgate_proxy::{AppState, ProxyConfig, create_router};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const REPLY: &str = "Hello! How can I help you today?";

/// Generator returning a fixed reply and remembering the last request.
#[derive(Debug, Default)]
pub struct FixedReply {
    pub reply: String,
    pub last_request: Mutex<Option<GenerationRequest>>,
}

#[async_trait]
impl Generator for FixedReply {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(Generation {
            text: self.reply.clone(),
            prompt_latency: Duration::from_millis(2),
        })
    }
}

/// Generator that always fails.
#[derive(Debug)]
pub struct Broken;

#[async_trait]
impl Generator for Broken {
    async fn generate(&self, _request: &GenerationRequest) -> Result<Generation, GenerationError> {
        Err(GenerationError::Failed("sampler exploded at step 3".into()))
    }
}

/// Port handing out a shared generator, or failing acquisition.
#[derive(Debug)]
pub enum StubPort {
    Ready(Arc<FixedReply>),
    Broken,
    Unavailable,
}

impl StubPort {
    pub fn replying(reply: &str) -> (Arc<Self>, Arc<FixedReply>) {
        let generator = Arc::new(FixedReply {
            reply: reply.to_string(),
            last_request: Mutex::new(None),
        });
        (Arc::new(Self::Ready(Arc::clone(&generator))), generator)
    }
}

#[async_trait]
impl GenerationPort for StubPort {
    fn model_id(&self) -> &str {
        "stub-model"
    }

    async fn acquire(&self) -> Result<Arc<dyn Generator>, GenerationError> {
        match self {
            Self::Ready(generator) => Ok(Arc::clone(generator) as Arc<dyn Generator>),
            Self::Broken => Ok(Arc::new(Broken)),
            Self::Unavailable => Err(GenerationError::Unavailable(
                "platform prerequisite missing".into(),
            )),
        }
    }
}

pub fn test_config() -> ProxyConfig {
    ProxyConfig {
        fragment_delay: Duration::ZERO,
        ..ProxyConfig::default()
    }
}

pub fn router(port: Arc<StubPort>, config: ProxyConfig) -> Router {
    create_router(AppState::new(port, config, CancellationToken::new()))
}

pub fn default_router() -> Router {
    router(StubPort::replying(REPLY).0, test_config())
}

pub async fn send(app: Router, request: Request<Body>) -> (Response<Body>, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let (parts, body) = response.into_parts();
    let bytes = body.collect().await.unwrap().to_bytes().to_vec();
    (Response::from_parts(parts, Body::empty()), bytes)
}

pub fn post_json(path: &str, body: &serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn hello_request(stream: bool) -> serde_json::Value {
    serde_json::json!({
        "model": "x",
        "messages": [{"role": "user", "content": "Hello!"}],
        "stream": stream
    })
}

/// Split an event-stream body into `data:` payloads.
pub fn event_payloads(body: &[u8]) -> Vec<String> {
    let text = std::str::from_utf8(body).unwrap();
    assert!(text.ends_with("\n\n"), "stream must end with a blank line");
    text.split("\n\n")
        .filter(|event| !event.is_empty())
        .map(|event| {
            event
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("unexpected event framing: {event:?}"))
                .to_string()
        })
        .collect()
}

pub fn assert_status(response: &Response<Body>, status: StatusCode) {
    assert_eq!(response.status(), status);
}
