//! # Fieldnotes - Observational Memory for AI Agents
//!
//! Keeps a long-running conversation's working context within a token budget
//! by continuously converting raw message history into compact, prioritized,
//! timestamped observations, and periodically re-condensing the observations
//! themselves ("reflection") when they grow too large.
//!
//! ```no_run
//! use fieldnotes::{Message, ObservationConfig, ObservationalMemory};
//!
//! # async fn demo() -> fieldnotes::Result<()> {
//! let memory = ObservationalMemory::new(ObservationConfig::default()).await?;
//! let messages = vec![Message::user("I have 2 kids", chrono::Utc::now())];
//! memory.ingest("thread-1", &messages).await?;
//! println!("{}", memory.get_context("thread-1").await?);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod llm;
pub mod observer;
pub mod reflector;
pub mod store;
pub mod tokens;
pub mod types;

pub use config::{BackendKind, ObservationConfig, TokenCounterKind};
pub use error::{MemoryError, Result};
pub use format::{render_context, render_observations};
pub use llm::{AnthropicBackend, GeminiBackend, GenerationBackend, GenerationRequest, OpenAiBackend};
pub use observer::{Extraction, Observer};
pub use reflector::Reflector;
pub use store::ObservationStore;
pub use tokens::TokenCounter;
pub use types::{MemoryRecord, MemoryStats, Message, MessageRole, Observation, Priority};

use std::sync::Arc;

use chrono::Utc;

/// Sentinel returned by `get_context` when a thread has no record yet
const NO_OBSERVATIONS: &str = "No observations yet.";

/// The conversation memory controller.
///
/// For each conversation thread it loads prior state, extracts new
/// observations, measures the token cost of the combined set, condenses it
/// when the cost exceeds the reflection threshold, and persists the result.
///
/// Every operation is a synchronous call over the store and (for `ingest`
/// and `force_reflection`) the text-generation backend; there is no
/// background work and no cache in front of the store.
pub struct ObservationalMemory {
    config: ObservationConfig,
    store: Arc<ObservationStore>,
    observer: Observer,
    reflector: Reflector,
    counter: TokenCounter,
}

impl std::fmt::Debug for ObservationalMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservationalMemory")
            .field("config", &self.config)
            .finish()
    }
}

impl ObservationalMemory {
    /// Open the store at the configured path and wire up the configured
    /// backend and token counter.
    ///
    /// A backend that cannot be constructed (missing API key) is not an
    /// error: extraction and reflection run fallback-only in that case.
    pub async fn new(config: ObservationConfig) -> Result<Self> {
        let store = ObservationStore::connect(&config.db_path).await?;

        let backend = match llm::backend_for(config.backend, config.request_timeout) {
            Ok(backend) => Some(backend),
            Err(e) => {
                tracing::warn!(backend = %config.backend, error = %e, "no text-generation backend, running fallback-only");
                None
            }
        };

        Ok(Self::from_parts(config, store, backend))
    }

    /// Wire the controller from explicit parts. The backend (or `None` for
    /// fallback-only operation) is shared by the observer and reflector.
    pub fn from_parts(
        config: ObservationConfig,
        store: Arc<ObservationStore>,
        backend: Option<Arc<dyn GenerationBackend>>,
    ) -> Self {
        let observer = Observer::new(
            backend.clone(),
            config.observer_temperature,
            config.max_output_tokens,
        );
        let reflector = Reflector::new(
            backend,
            config.reflector_temperature,
            config.max_output_tokens,
        );
        let counter = TokenCounter::new(config.token_counter).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "exact token counter unavailable, using approximate");
            TokenCounter::Approximate
        });

        tracing::info!(
            reflection_threshold = config.reflection_threshold,
            backend = %config.backend,
            "observational memory ready"
        );

        Self {
            config,
            store,
            observer,
            reflector,
            counter,
        }
    }

    /// The active configuration
    pub fn config(&self) -> &ObservationConfig {
        &self.config
    }

    /// The underlying store
    pub fn store(&self) -> &ObservationStore {
        &self.store
    }

    /// Ingest a batch of new messages for a thread.
    ///
    /// Loads (or lazily creates) the thread's record, extracts observations
    /// from the batch, appends them to the prior set, and condenses the
    /// combined set when its token cost strictly exceeds the reflection
    /// threshold. Extraction and reflection degrade to deterministic
    /// fallbacks on backend failure; only storage errors surface.
    ///
    /// Concurrent `ingest` calls on the same thread id race (read-modify-
    /// write; later write wins). Callers needing ordered ingestion must
    /// serialize per thread upstream.
    pub async fn ingest(&self, thread_id: &str, messages: &[Message]) -> Result<MemoryRecord> {
        let mut record = self.store.load(thread_id).await?.unwrap_or_default();

        let existing_text = render_observations(&record.observations);
        let extraction = self.observer.extract(messages, &existing_text).await;

        let mut combined = record.observations;
        combined.extend(extraction.observations);

        let cost = self.counter.count_observations(&combined);
        if cost > self.config.reflection_threshold {
            tracing::debug!(
                thread_id,
                cost,
                threshold = self.config.reflection_threshold,
                "reflection threshold exceeded"
            );
            combined = self.reflector.reflect(combined).await;
        }

        record.observations = combined;
        if !extraction.current_task.is_empty() {
            record.current_task = extraction.current_task;
        }
        if !extraction.suggested_response.is_empty() {
            record.suggested_response = extraction.suggested_response;
        }
        record.last_observed_at = Some(Utc::now());

        self.store.save(thread_id, &record).await?;
        Ok(record)
    }

    /// Render the current context for a thread: observations grouped by
    /// date, then the optional suggested-response and current-task sections.
    /// A thread with no record yields a fixed sentinel string, never an
    /// error.
    pub async fn get_context(&self, thread_id: &str) -> Result<String> {
        match self.store.load(thread_id).await? {
            Some(record) => Ok(render_context(&record)),
            None => Ok(NO_OBSERVATIONS.to_string()),
        }
    }

    /// Unconditionally condense a thread's observations, even below the
    /// reflection threshold, and persist the result. A thread with no
    /// record is left untouched.
    pub async fn force_reflection(&self, thread_id: &str) -> Result<MemoryRecord> {
        let Some(mut record) = self.store.load(thread_id).await? else {
            return Ok(MemoryRecord::default());
        };

        record.observations = self.reflector.reflect(record.observations).await;
        self.store.save(thread_id, &record).await?;
        Ok(record)
    }

    /// Summary statistics for a thread
    pub async fn stats(&self, thread_id: &str) -> Result<MemoryStats> {
        let record = self.store.load(thread_id).await?.unwrap_or_default();
        Ok(MemoryStats {
            observation_count: record.observations.len(),
            has_current_task: !record.current_task.is_empty(),
            last_observed_at: record.last_observed_at,
        })
    }
}
