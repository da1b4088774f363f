//! `POST /v1/chat/completions`.
//!
//! validate -> acquire the generation capability -> generate -> reply either
//! with one JSON body or with an event stream.

use std::time::Instant;

use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use chrono::Utc;
use fmgate_core::{GenerationRequest, UsageRecord};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{ChatCompletionRequest, ChatCompletionResponse};
use crate::server::AppState;
use crate::stream::{ChunkContext, StreamEncoder, event_stream_response};

/// Message returned when `messages` is empty.
pub const EMPTY_MESSAGES_MESSAGE: &str = "At least one message is required";

/// Handle chat completions.
pub(crate) async fn chat_completions(State(state): State<AppState>, body: Bytes) -> Response {
    debug!("POST /v1/chat/completions");

    match complete(&state, &body).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn complete(state: &AppState, body: &[u8]) -> Result<Response, ApiError> {
    let request: ChatCompletionRequest = serde_json::from_slice(body)
        .map_err(|e| ApiError::Validation(format!("Invalid request body: {e}")))?;

    if request.messages.is_empty() {
        return Err(ApiError::Validation(EMPTY_MESSAGES_MESSAGE.to_string()));
    }
    let messages = request.to_messages().map_err(ApiError::Validation)?;

    let streaming = request.is_streaming() && state.config.streaming_enabled;
    if request.is_streaming() && !streaming {
        debug!("Streaming disabled, replying with a single response");
    }

    info!(
        model = %request.model,
        streaming = %streaming,
        messages = messages.len(),
        last_role = %messages[messages.len() - 1].role,
        "Processing chat completion request"
    );

    let generator = state.generation.acquire().await?;

    let generation_request = GenerationRequest {
        messages,
        instructions: state.config.instructions.clone(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    };

    let started = Instant::now();
    let generation = generator.generate(&generation_request).await?;
    let elapsed = started.elapsed();

    let id = format!("chatcmpl-{}", Uuid::new_v4());
    let created = Utc::now().timestamp();

    if streaming {
        let encoder = StreamEncoder::new(
            ChunkContext {
                id,
                created,
                model: request.model,
            },
            generation_request.messages,
            generation,
            state.config.fragment_delay,
            state.shutdown.clone(),
        );
        return Ok(event_stream_response(encoder));
    }

    let usage = UsageRecord::for_completion(
        &generation_request.messages,
        &generation.text,
        generation.prompt_latency,
        elapsed.saturating_sub(generation.prompt_latency),
    );

    debug!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        "Completion finished"
    );

    Ok(Json(ChatCompletionResponse::new(
        id,
        created,
        request.model,
        generation.text,
        &usage,
    ))
    .into_response())
}
