//! Usage records and their accumulation.
//!
//! A [`UsageRecord`] is built once per request and never changed after it
//! has been reported. Streaming responses feed fragments into a
//! [`UsageAccumulator`] as they are emitted and finish it after the last one.

use std::time::{Duration, Instant};

use crate::domain::ChatMessage;
use crate::tokens::{estimate_messages, estimate_tokens, tokens_for_counts};

/// Token and latency figures for one completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageRecord {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    /// Time the generation capability spent before producing output.
    pub prompt_latency: Duration,
    /// Time spent delivering the completion.
    pub completion_latency: Duration,
}

impl UsageRecord {
    /// Build a record for a completion delivered in one piece.
    #[must_use]
    pub fn for_completion(
        messages: &[ChatMessage],
        completion: &str,
        prompt_latency: Duration,
        completion_latency: Duration,
    ) -> Self {
        Self {
            prompt_tokens: estimate_messages(messages),
            completion_tokens: estimate_tokens(completion),
            prompt_latency,
            completion_latency,
        }
    }

    #[must_use]
    pub const fn total_tokens(&self) -> u32 {
        self.prompt_tokens.saturating_add(self.completion_tokens)
    }
}

/// Running usage for a completion delivered in fragments.
///
/// Character and word counts are kept incrementally, so the running
/// completion estimate after the last fragment equals
/// `estimate_tokens` over the concatenated fragments.
#[derive(Debug, Clone)]
pub struct UsageAccumulator {
    prompt_tokens: u32,
    prompt_latency: Duration,
    chars: usize,
    words: usize,
    in_word: bool,
    first_emitted: Option<Instant>,
}

impl UsageAccumulator {
    #[must_use]
    pub fn new(messages: &[ChatMessage], prompt_latency: Duration) -> Self {
        Self {
            prompt_tokens: estimate_messages(messages),
            prompt_latency,
            chars: 0,
            words: 0,
            in_word: false,
            first_emitted: None,
        }
    }

    /// Record an emitted fragment and return the running completion token count.
    ///
    /// The first call starts the completion latency clock.
    pub fn record_fragment(&mut self, fragment: &str) -> u32 {
        if self.first_emitted.is_none() {
            self.first_emitted = Some(Instant::now());
        }

        for c in fragment.chars() {
            self.chars += 1;
            if c.is_whitespace() {
                self.in_word = false;
            } else if !self.in_word {
                self.words += 1;
                self.in_word = true;
            }
        }

        self.completion_tokens()
    }

    /// Completion tokens for everything recorded so far.
    #[must_use]
    pub fn completion_tokens(&self) -> u32 {
        tokens_for_counts(self.chars, self.words)
    }

    #[must_use]
    pub const fn prompt_tokens(&self) -> u32 {
        self.prompt_tokens
    }

    /// Close the accumulator.
    ///
    /// Completion latency is the wall-clock time since the first fragment,
    /// or zero when nothing was emitted.
    #[must_use]
    pub fn finish(self) -> UsageRecord {
        UsageRecord {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens(),
            prompt_latency: self.prompt_latency,
            completion_latency: self
                .first_emitted
                .map(|started| started.elapsed())
                .unwrap_or_default(),
        }
    }
}
