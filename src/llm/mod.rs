//! Text-generation backends.
//!
//! The engine consumes, never implements, text generation: everything goes
//! through [`GenerationBackend`], one implementation per provider, selected
//! by [`BackendKind`](crate::config::BackendKind) at construction time.

mod anthropic;
mod gemini;
mod openai;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::BackendKind;
use crate::error::{MemoryError, Result};

/// A single generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// User-turn prompt
    pub prompt: String,
    /// System instruction
    pub system: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Output token cap
    pub max_output_tokens: u32,
}

/// Text-generation capability.
///
/// Calls are bounded by the client's request timeout; a timeout is reported
/// as an error like any other backend failure.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Provider name, for logging
    fn name(&self) -> &str;

    /// Generate text for the given request
    async fn generate(&self, request: GenerationRequest) -> Result<String>;
}

/// Build the backend for the configured provider.
///
/// API keys come from the provider's conventional environment variable;
/// a missing key is a configuration error, which callers typically treat
/// as "run fallback-only".
pub fn backend_for(kind: BackendKind, timeout: Duration) -> Result<Arc<dyn GenerationBackend>> {
    match kind {
        BackendKind::Anthropic => {
            let key = require_env("ANTHROPIC_API_KEY")?;
            Ok(Arc::new(AnthropicBackend::new(key, timeout)?))
        }
        BackendKind::OpenAi => {
            let key = require_env("OPENAI_API_KEY")?;
            Ok(Arc::new(OpenAiBackend::new(key, timeout)?))
        }
        BackendKind::Gemini => {
            let key = require_env("GOOGLE_API_KEY")?;
            Ok(Arc::new(GeminiBackend::new(key, timeout)?))
        }
    }
}

fn require_env(var: &str) -> Result<String> {
    std::env::var(var).map_err(|_| MemoryError::Configuration(format!("{var} not set")))
}
