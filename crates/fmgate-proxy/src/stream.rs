//! Event-stream encoder for streaming chat completions.
//!
//! The generation capability returns its whole output at once; this module
//! replays it as an OpenAI-style event stream:
//!
//! ```text
//! data: {"object":"chat.completion.chunk",...,"delta":{"role":"assistant","content":"Hello "}}
//!
//! data: {"object":"chat.completion.chunk",...,"delta":{"content":"world"}}
//!
//! data: {"object":"chat.completion.chunk",...,"delta":{},"finish_reason":"stop","usage":{...}}
//!
//! data: [DONE]
//!
//! ```
//!
//! Frames for one stream are written in order through a bounded channel that
//! feeds the response body. A closed channel means the client went away and
//! ends the encoder task.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use fmgate_core::{ChatMessage, Generation, MessageRole, UsageAccumulator, UsageRecord};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::error::{ErrorKind, INTERNAL_ERROR_MESSAGE};
use crate::models::{ChatChunkChoice, ChatCompletionChunk, ChatDelta, ErrorResponse, Usage};

/// Payload of the end-of-stream sentinel.
pub const DONE_MARKER: &str = "[DONE]";

/// Default pause between fragments.
pub const DEFAULT_FRAGMENT_DELAY: Duration = Duration::from_millis(20);

/// Frames buffered between the encoder task and the response body.
const CHANNEL_CAPACITY: usize = 8;

/// One unit of a streamed completion.
///
/// A successful stream is zero or more `Delta`, one `Final`, one `Done`.
/// A failed stream ends with a single `Error` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Delta {
        content: String,
        is_first: bool,
        /// Completion tokens emitted so far, this fragment included.
        completion_tokens: u32,
    },
    Final {
        usage: UsageRecord,
    },
    Done,
    Error,
}

/// Fields shared by every chunk of one stream.
#[derive(Debug, Clone)]
pub struct ChunkContext {
    pub id: String,
    pub created: i64,
    pub model: String,
}

impl ChunkContext {
    fn chunk(
        &self,
        delta: ChatDelta,
        finish_reason: Option<&str>,
        usage: Option<Usage>,
    ) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChatChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage,
        }
    }
}

impl StreamFrame {
    /// Encode as a single `data:` event terminated by a blank line.
    pub fn encode(&self, ctx: &ChunkContext) -> Result<Bytes, serde_json::Error> {
        let payload = match self {
            Self::Delta {
                content, is_first, ..
            } => {
                let delta = ChatDelta {
                    role: is_first.then_some(MessageRole::Assistant),
                    content: Some(content.clone()),
                };
                serde_json::to_string(&ctx.chunk(delta, None, None))?
            }
            Self::Final { usage } => serde_json::to_string(&ctx.chunk(
                ChatDelta::default(),
                Some("stop"),
                Some(Usage::from(usage)),
            ))?,
            Self::Done => DONE_MARKER.to_string(),
            Self::Error => serde_json::to_string(&ErrorResponse::new(
                INTERNAL_ERROR_MESSAGE,
                ErrorKind::Internal,
            ))?,
        };
        Ok(Bytes::from(format!("data: {payload}\n\n")))
    }
}

/// Split text at single spaces, keeping each space on the fragment before it.
///
/// Concatenating the fragments gives back the input byte for byte. Empty
/// input yields one empty fragment.
pub fn split_fragments(text: &str) -> Vec<&str> {
    let mut fragments = Vec::new();
    let mut start = 0;
    for (i, _) in text.match_indices(' ') {
        fragments.push(&text[start..=i]);
        start = i + 1;
    }
    fragments.push(&text[start..]);
    fragments
}

/// How an encoder run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// All frames, `[DONE]` included, were handed to the body.
    Completed(UsageRecord),
    /// A frame could not be encoded; an error frame was attempted.
    Failed,
    /// The client went away mid-stream.
    Disconnected,
}

enum Abort {
    Encode(serde_json::Error),
    Disconnected,
}

type Sink = mpsc::Sender<Result<Bytes, Infallible>>;

/// Replays a finished generation as a sequence of stream frames.
#[derive(Debug)]
pub struct StreamEncoder {
    context: ChunkContext,
    messages: Vec<ChatMessage>,
    generation: Generation,
    fragment_delay: Duration,
    shutdown: CancellationToken,
}

impl StreamEncoder {
    pub fn new(
        context: ChunkContext,
        messages: Vec<ChatMessage>,
        generation: Generation,
        fragment_delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            messages,
            generation,
            fragment_delay,
            shutdown,
        }
    }

    /// Write every frame to `sink`, in order.
    pub async fn run(self, sink: Sink) -> StreamOutcome {
        let delivered = self.deliver(&sink).await;
        self.conclude(&sink, delivered).await
    }

    /// Turn the delivery result into an outcome. A failed stream gets one
    /// error frame in place of the usage and `[DONE]` frames.
    async fn conclude(
        &self,
        sink: &Sink,
        delivered: Result<UsageRecord, Abort>,
    ) -> StreamOutcome {
        match delivered {
            Ok(usage) => StreamOutcome::Completed(usage),
            Err(Abort::Disconnected) => {
                debug!(id = %self.context.id, "Client disconnected mid-stream");
                StreamOutcome::Disconnected
            }
            Err(Abort::Encode(e)) => {
                error!(id = %self.context.id, "Failed to encode stream frame: {e}");
                // Best effort: the connection may already be unusable.
                if let Ok(bytes) = StreamFrame::Error.encode(&self.context) {
                    let _ = sink.send(Ok(bytes)).await;
                }
                StreamOutcome::Failed
            }
        }
    }

    async fn deliver(&self, sink: &Sink) -> Result<UsageRecord, Abort> {
        let mut usage = UsageAccumulator::new(&self.messages, self.generation.prompt_latency);
        let fragments = split_fragments(&self.generation.text);
        let last = fragments.len() - 1;

        for (index, fragment) in fragments.iter().enumerate() {
            let completion_tokens = usage.record_fragment(fragment);
            trace!(index, completion_tokens, "Emitting fragment");

            self.emit(
                sink,
                &StreamFrame::Delta {
                    content: (*fragment).to_string(),
                    is_first: index == 0,
                    completion_tokens,
                },
            )
            .await?;

            if index < last {
                self.pause().await;
            }
        }

        let record = usage.finish();
        self.emit(sink, &StreamFrame::Final { usage: record }).await?;
        self.emit(sink, &StreamFrame::Done).await?;
        Ok(record)
    }

    async fn emit(&self, sink: &Sink, frame: &StreamFrame) -> Result<(), Abort> {
        let bytes = frame.encode(&self.context).map_err(Abort::Encode)?;
        sink.send(Ok(bytes)).await.map_err(|_| Abort::Disconnected)
    }

    /// Cadence delay between fragments. Skipped once the server is draining
    /// so in-flight streams finish quickly; no frame is dropped.
    async fn pause(&self) {
        if self.fragment_delay.is_zero() || self.shutdown.is_cancelled() {
            return;
        }
        tokio::select! {
            () = tokio::time::sleep(self.fragment_delay) => {}
            () = self.shutdown.cancelled() => {}
        }
    }
}

/// Spawn the encoder and return an event-stream response fed by it.
pub fn event_stream_response(encoder: StreamEncoder) -> Response {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let id = encoder.context.id.clone();

    tokio::spawn(async move {
        let outcome = encoder.run(tx).await;
        debug!(id = %id, outcome = ?outcome, "Stream finished");
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("x-accel-buffering", "no") // Disable nginx buffering
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fmgate_core::estimate_tokens;

    fn context() -> ChunkContext {
        ChunkContext {
            id: "chatcmpl-test".into(),
            created: 1_700_000_000,
            model: "x".into(),
        }
    }

    fn encoder(text: &str) -> StreamEncoder {
        StreamEncoder::new(
            context(),
            vec![ChatMessage::user("Hello!")],
            Generation {
                text: text.into(),
                prompt_latency: Duration::from_millis(3),
            },
            Duration::ZERO,
            CancellationToken::new(),
        )
    }

    async fn collect(encoder: StreamEncoder) -> (StreamOutcome, Vec<String>) {
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let task = tokio::spawn(encoder.run(tx));
        let mut events = Vec::new();
        while let Some(Ok(bytes)) = rx.recv().await {
            events.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
        (task.await.unwrap(), events)
    }

    fn payload(event: &str) -> &str {
        event
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .expect("event framing")
    }

    #[test]
    fn test_split_fragments_reassembles() {
        for text in ["Hello world", "a  b", "trailing ", " leading", "", "one"] {
            let fragments = split_fragments(text);
            assert_eq!(fragments.concat(), text);
            for fragment in &fragments[..fragments.len() - 1] {
                assert!(fragment.ends_with(' '));
            }
        }
    }

    #[test]
    fn test_split_fragments_words() {
        assert_eq!(split_fragments("Hi there you"), vec!["Hi ", "there ", "you"]);
        assert_eq!(split_fragments(""), vec![""]);
    }

    #[test]
    fn test_done_frame_is_literal_marker() {
        let bytes = StreamFrame::Done.encode(&context()).unwrap();
        assert_eq!(&bytes[..], b"data: [DONE]\n\n");
    }

    #[test]
    fn test_error_frame_is_opaque() {
        let bytes = StreamFrame::Error.encode(&context()).unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        let value: serde_json::Value = serde_json::from_str(payload(&text)).unwrap();
        assert_eq!(value["error"]["type"], "internal_error");
        assert_eq!(value["error"]["message"], INTERNAL_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_stream_frame_order_and_content() {
        let text = "The quick brown fox";
        let (outcome, events) = collect(encoder(text)).await;

        // 4 deltas, final, done
        assert_eq!(events.len(), 6);
        assert_eq!(events.last().unwrap(), "data: [DONE]\n\n");

        let mut rebuilt = String::new();
        for (i, event) in events[..4].iter().enumerate() {
            let chunk: ChatCompletionChunk = serde_json::from_str(payload(event)).unwrap();
            assert_eq!(chunk.id, "chatcmpl-test");
            assert_eq!(chunk.object, "chat.completion.chunk");
            let delta = &chunk.choices[0].delta;
            assert_eq!(delta.role.is_some(), i == 0);
            assert!(chunk.choices[0].finish_reason.is_none());
            rebuilt.push_str(delta.content.as_deref().unwrap());
        }
        assert_eq!(rebuilt, text);

        let last: ChatCompletionChunk = serde_json::from_str(payload(&events[4])).unwrap();
        assert_eq!(last.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(last.choices[0].delta.content.is_none());
        let usage = last.usage.unwrap();
        assert_eq!(usage.completion_tokens, estimate_tokens(text));
        assert_eq!(usage.prompt_tokens, estimate_tokens("Hello!"));

        match outcome {
            StreamOutcome::Completed(record) => {
                assert_eq!(record.completion_tokens, estimate_tokens(text));
                assert_eq!(record.prompt_latency, Duration::from_millis(3));
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_generation_still_has_first_delta() {
        let (_, events) = collect(encoder("")).await;
        assert_eq!(events.len(), 3);
        let chunk: ChatCompletionChunk = serde_json::from_str(payload(&events[0])).unwrap();
        assert!(chunk.choices[0].delta.role.is_some());
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_disconnect_stops_encoder() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outcome = encoder("never delivered").run(tx).await;
        assert_eq!(outcome, StreamOutcome::Disconnected);
    }

    #[tokio::test]
    async fn test_draining_skips_delay() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let slow = StreamEncoder::new(
            context(),
            vec![ChatMessage::user("hi")],
            Generation {
                text: "one two three four".into(),
                prompt_latency: Duration::ZERO,
            },
            Duration::from_secs(60),
            shutdown,
        );

        let (outcome, events) = tokio::time::timeout(Duration::from_secs(5), collect(slow))
            .await
            .expect("draining stream should not wait between fragments");
        assert!(matches!(outcome, StreamOutcome::Completed(_)));
        assert_eq!(events.len(), 6);
    }

    #[tokio::test]
    async fn test_encode_failure_sends_single_error_frame() {
        let encoder = encoder("never sent");
        let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);
        let failure = serde_json::from_str::<u32>("not a number").unwrap_err();

        let outcome = encoder.conclude(&tx, Err(Abort::Encode(failure))).await;
        drop(tx);
        assert_eq!(outcome, StreamOutcome::Failed);

        let mut events = Vec::new();
        while let Some(Ok(bytes)) = rx.recv().await {
            events.push(String::from_utf8(bytes.to_vec()).unwrap());
        }
        assert_eq!(events.len(), 1, "only the error frame, then the stream closes");

        let error: serde_json::Value = serde_json::from_str(payload(&events[0])).unwrap();
        assert_eq!(error["error"]["type"], "internal_error");
        assert_eq!(error["error"]["message"], "Internal server error");
    }
}
