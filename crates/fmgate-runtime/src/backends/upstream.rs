//! Backend forwarding completions to an OpenAI-compatible upstream server.
//!
//! Acquisition probes `GET {base}/v1/models`; an unreachable or unhealthy
//! upstream is reported as [`GenerationError::Unavailable`]. Generation is a
//! single non-streaming `POST {base}/v1/chat/completions`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fmgate_core::{
    ChatMessage, Generation, GenerationError, GenerationPort, GenerationRequest, Generator,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Timeout for the availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Timeout for a whole completion.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Generation port backed by a remote OpenAI-compatible server.
#[derive(Debug, Clone)]
pub struct UpstreamBackend {
    client: Client,
    base_url: String,
    model_id: String,
}

impl UpstreamBackend {
    /// Create a backend for `base_url` (for example `http://127.0.0.1:8080`).
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, model_id: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(GENERATION_TIMEOUT)
            .pool_max_idle_per_host(10)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model_id: model_id.into(),
        })
    }
}

#[async_trait]
impl GenerationPort for UpstreamBackend {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn acquire(&self) -> Result<Arc<dyn Generator>, GenerationError> {
        let probe_url = format!("{}/v1/models", self.base_url);

        match self
            .client
            .get(&probe_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!(url = %probe_url, "Upstream is reachable");
            }
            Ok(response) => {
                return Err(GenerationError::Unavailable(format!(
                    "upstream probe returned {}",
                    response.status()
                )));
            }
            Err(e) => {
                return Err(GenerationError::Unavailable(format!(
                    "upstream unreachable at {}: {e}",
                    self.base_url
                )));
            }
        }

        Ok(Arc::new(UpstreamGenerator {
            client: self.client.clone(),
            completions_url: format!("{}/v1/chat/completions", self.base_url),
            model: self.model_id.clone(),
        }))
    }
}

/// One acquired handle on the upstream.
#[derive(Debug)]
struct UpstreamGenerator {
    client: Client,
    completions_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct UpstreamRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct UpstreamResponse {
    #[serde(default)]
    choices: Vec<UpstreamChoice>,
    /// llama-server reports its own prompt processing time here.
    timings: Option<UpstreamTimings>,
}

#[derive(Debug, Deserialize)]
struct UpstreamChoice {
    message: UpstreamMessage,
}

#[derive(Debug, Deserialize)]
struct UpstreamMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamTimings {
    prompt_ms: Option<f64>,
}

/// Conversation as sent upstream: instructions become a leading system message.
fn upstream_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if let Some(instructions) = request.instructions.as_deref().filter(|i| !i.is_empty()) {
        messages.push(ChatMessage::system(instructions));
    }
    messages.extend(request.messages.iter().cloned());
    messages
}

fn reported_prompt_latency(timings: Option<&UpstreamTimings>) -> Option<Duration> {
    let ms = timings?.prompt_ms?;
    Duration::try_from_secs_f64(ms / 1000.0).ok()
}

#[async_trait]
impl Generator for UpstreamGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, GenerationError> {
        let body = UpstreamRequest {
            model: &self.model,
            messages: upstream_messages(request),
            stream: false,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(&self.completions_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Failed(format!("upstream request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(status = %status, "Upstream completion failed");
            return Err(GenerationError::Failed(format!(
                "upstream returned {status}: {detail}"
            )));
        }

        let parsed: UpstreamResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::Failed(format!("invalid upstream response: {e}")))?;
        let elapsed = started.elapsed();

        let prompt_latency = reported_prompt_latency(parsed.timings.as_ref()).unwrap_or(elapsed);
        let text = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GenerationError::Failed("upstream returned no choices".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(Generation {
            text,
            prompt_latency,
        })
    }
}
