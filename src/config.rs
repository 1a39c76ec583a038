//! Configuration for the observational memory engine

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Text-generation backend to use for extraction and reflection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Anthropic,
    OpenAi,
    Gemini,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Anthropic => write!(f, "anthropic"),
            BackendKind::OpenAi => write!(f, "openai"),
            BackendKind::Gemini => write!(f, "gemini"),
        }
    }
}

/// Token counting strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenCounterKind {
    /// BPE-exact counting (cl100k vocabulary)
    Exact,
    /// Chars-per-token heuristic; overestimates slightly, which is the safe
    /// direction for a budget check
    #[default]
    Approximate,
}

/// Process-wide configuration, immutable after construction
#[derive(Debug, Clone)]
pub struct ObservationConfig {
    /// Token count at which upstream callers are expected to have triggered
    /// extraction. Informational hint for callers; the engine itself does
    /// not enforce it.
    pub observation_threshold: usize,
    /// Token count above which the combined observation set is reflected
    /// (strict "exceeds" check)
    pub reflection_threshold: usize,
    /// Sampling temperature for extraction
    pub observer_temperature: f32,
    /// Sampling temperature for reflection
    pub reflector_temperature: f32,
    /// Maximum output tokens per backend call
    pub max_output_tokens: u32,
    /// Which text-generation backend to use
    pub backend: BackendKind,
    /// Token counting strategy
    pub token_counter: TokenCounterKind,
    /// SQLite database path
    pub db_path: std::path::PathBuf,
    /// Upper bound on a single backend call; a timeout is treated exactly
    /// like a backend failure
    pub request_timeout: Duration,
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            observation_threshold: 30_000,
            reflection_threshold: 40_000,
            observer_temperature: 0.3,
            reflector_temperature: 0.0,
            max_output_tokens: 1000,
            backend: BackendKind::default(),
            token_counter: TokenCounterKind::default(),
            db_path: std::path::PathBuf::from(".fieldnotes/observations.db"),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl ObservationConfig {
    /// Set the reflection threshold
    pub fn with_reflection_threshold(mut self, tokens: usize) -> Self {
        self.reflection_threshold = tokens;
        self
    }

    /// Set the observation threshold
    pub fn with_observation_threshold(mut self, tokens: usize) -> Self {
        self.observation_threshold = tokens;
        self
    }

    /// Set the text-generation backend
    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    /// Set the token counting strategy
    pub fn with_token_counter(mut self, kind: TokenCounterKind) -> Self {
        self.token_counter = kind;
        self
    }

    /// Set the database path
    pub fn with_db_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.db_path = path.into();
        self
    }

    /// Set the backend request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
