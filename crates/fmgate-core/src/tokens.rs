//! Token count heuristic.
//!
//! Exact tokenization depends on the model behind the generation port and
//! is not available to the gateway. Usage figures are estimated instead:
//!
//! - characters / 4
//! - whitespace-delimited words / 0.75
//!
//! The larger of the two wins, rounded toward zero, so usage is biased
//! toward over-counting rather than under-counting.

use crate::domain::ChatMessage;

/// Estimate the number of tokens in `text`.
///
/// Returns 0 for empty text. Appending to a string never lowers its estimate.
#[must_use]
pub fn estimate_tokens(text: &str) -> u32 {
    tokens_for_counts(text.chars().count(), text.split_whitespace().count())
}

/// The estimate for a text with `chars` characters and `words` words.
pub(crate) fn tokens_for_counts(chars: usize, words: usize) -> u32 {
    // words / 0.75 == words * 4 / 3, kept in integers to avoid float rounding
    let by_chars = chars / 4;
    let by_words = words.saturating_mul(4) / 3;

    u32::try_from(by_chars.max(by_words)).unwrap_or(u32::MAX)
}

/// Estimate the prompt size of a conversation.
///
/// Message contents are joined with a single space, in conversation order,
/// and estimated as one text.
#[must_use]
pub fn estimate_messages(messages: &[ChatMessage]) -> u32 {
    let joined = messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    estimate_tokens(&joined)
}
