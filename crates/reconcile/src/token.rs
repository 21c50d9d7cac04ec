//! Token estimation utilities.
//!
//! Uses a character-based heuristic: ~4 characters per token. This is an
//! approximation for previewing cost, never an exact count.

use timegap_core::consolidation::ConsolidationRequest;

use crate::pricing::PricingTable;
use crate::prompt::PromptTemplate;

/// Average characters per token for BPE tokenizers on English text.
pub const CHARS_PER_TOKEN: f64 = 4.0;

/// Per-sample overhead for JSON punctuation and field names.
pub const SAMPLE_OVERHEAD_TOKENS: usize = 4;

/// Overhead for the context block's heading and message framing.
pub const CONTEXT_BLOCK_OVERHEAD_TOKENS: usize = 8;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    chars_to_tokens(text.chars().count())
}

fn chars_to_tokens(chars: usize) -> usize {
    (chars as f64 / CHARS_PER_TOKEN).ceil() as usize
}

/// A running estimate for one request while its context is being edited.
///
/// The fixed part of the prompt is measured once; each edit only adjusts
/// the context character count, so a refresh costs the size of the delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimate {
    base_chars: usize,
    context_chars: usize,
    sample_count: usize,
}

impl TokenEstimate {
    pub fn new(base_chars: usize, context_chars: usize, sample_count: usize) -> Self {
        Self {
            base_chars,
            context_chars,
            sample_count,
        }
    }

    /// Measure a request as it would be rendered by `template`.
    pub fn for_request(template: &PromptTemplate, request: &ConsolidationRequest) -> Self {
        Self::new(
            template.base_chars(request),
            request.context_text.trim().chars().count(),
            request.samples.len(),
        )
    }

    pub fn push_char(&mut self, _c: char) {
        self.context_chars += 1;
    }

    pub fn push_str(&mut self, s: &str) {
        self.context_chars += s.chars().count();
    }

    pub fn pop_char(&mut self) {
        self.context_chars = self.context_chars.saturating_sub(1);
    }

    pub fn context_chars(&self) -> usize {
        self.context_chars
    }

    pub fn tokens(&self) -> usize {
        chars_to_tokens(self.base_chars + self.context_chars)
            + SAMPLE_OVERHEAD_TOKENS * self.sample_count
            + CONTEXT_BLOCK_OVERHEAD_TOKENS
    }

    /// Input cost in USD, when the model is priced.
    pub fn cost_usd(&self, pricing: &PricingTable, model: &str) -> Option<f64> {
        pricing.input_cost(model, self.tokens())
    }
}
