//! Token cost estimation for observation sets

use std::sync::Arc;

use tiktoken_rs::CoreBPE;

use crate::config::TokenCounterKind;
use crate::error::{MemoryError, Result};
use crate::format::render_observations;
use crate::types::Observation;

/// Chars-per-token ratio for the approximate strategy. Slightly below the
/// typical English ratio so the estimate errs toward triggering reflection
/// earlier rather than later.
const CHARS_PER_TOKEN: f32 = 3.5;

/// Token counter, either BPE-exact or a character heuristic
#[derive(Clone)]
pub enum TokenCounter {
    /// cl100k BPE counting
    Exact(Arc<CoreBPE>),
    /// chars / 3.5, rounded up
    Approximate,
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenCounter::Exact(_) => write!(f, "TokenCounter::Exact"),
            TokenCounter::Approximate => write!(f, "TokenCounter::Approximate"),
        }
    }
}

impl TokenCounter {
    /// Build a counter for the configured strategy
    pub fn new(kind: TokenCounterKind) -> Result<Self> {
        match kind {
            TokenCounterKind::Exact => {
                let bpe = tiktoken_rs::cl100k_base()
                    .map_err(|e| MemoryError::Tokenizer(e.to_string()))?;
                Ok(TokenCounter::Exact(Arc::new(bpe)))
            }
            TokenCounterKind::Approximate => Ok(TokenCounter::Approximate),
        }
    }

    /// Count tokens in a piece of text
    pub fn count(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        match self {
            TokenCounter::Exact(bpe) => bpe.encode_with_special_tokens(text).len(),
            TokenCounter::Approximate => {
                (text.chars().count() as f32 / CHARS_PER_TOKEN).ceil() as usize
            }
        }
    }

    /// Cost of an observation set in its rendered form (date headers
    /// included), which is what actually occupies the context window
    pub fn count_observations(&self, observations: &[Observation]) -> usize {
        self.count(&render_observations(observations))
    }
}
