//! Approximate token counting shared by the chunker and the context
//! formatter. Both sides must use the same ratio or chunk budgets and
//! context budgets drift apart independently.

/// Approximate characters per token for English prose and code.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of a text span.
///
/// This is a character-count heuristic, not a real tokenizer. It only needs
/// to be consistent across ingestion and formatting, not exact.
#[inline]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Convert a token budget into the equivalent character budget.
#[inline]
pub fn budget_chars(tokens: usize) -> usize {
    tokens.saturating_mul(CHARS_PER_TOKEN)
}
