//! Observation compaction ("reflection").
//!
//! Condenses an oversized observation set into a smaller one. Primary path
//! is the text-generation backend; on failure a deterministic priority
//! filter takes over. Reflection never fails outright and the fallback
//! never returns more observations than it was given.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::format::{parse_observations, render_observations};
use crate::llm::{GenerationBackend, GenerationRequest};
use crate::types::{Observation, Priority};

const SYSTEM_PROMPT: &str = "\
You are the memory consciousness of an AI assistant. Your reflections will be \
the ONLY information the assistant has about past interactions with this user.

Your purpose is to reflect on all observations, reorganize and streamline \
them, and draw connections and conclusions between observations about what \
has been learned, seen, heard, and done.

Take the existing observations and rewrite them so it is easier to continue \
into the future with this knowledge.

IMPORTANT: your reflections are THE ENTIRETY of the assistant's memory. Any \
information you do not include is immediately forgotten. Your reflections must \
assume the assistant knows nothing else.

When consolidating observations:
- Preserve dates and times when present (temporal context is critical)
- Retain the most relevant timestamps (start times, completion times, significant events)
- Combine related items where it makes sense
- Condense older observations more aggressively, retain more detail for recent ones

OUTPUT FORMAT:
Keep the Date: YYYY-MM-DD headers, and under each one observation per line:
(24-hour time) [priority glyph] [observation] (optional resolved date)

Priorities:
- \u{1F534} High: explicit user facts, preferences, goals achieved, critical context
- \u{1F7E1} Medium: project details, learned information, tool results
- \u{1F7E2} Low: minor details, uncertain observations

Your output MUST be ONLY observations and date headers, nothing else. Do not \
include explanations or meta-commentary.";

/// The Compactor: condenses an observation sequence while preserving the
/// most load-bearing information
pub struct Reflector {
    backend: Option<Arc<dyn GenerationBackend>>,
    temperature: f32,
    max_output_tokens: u32,
}

impl Reflector {
    /// Create a reflector. `None` backend means fallback-only condensation.
    pub fn new(
        backend: Option<Arc<dyn GenerationBackend>>,
        temperature: f32,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            backend,
            temperature,
            max_output_tokens,
        }
    }

    /// Reflect on and condense observations
    pub async fn reflect(&self, observations: Vec<Observation>) -> Vec<Observation> {
        if observations.is_empty() {
            return observations;
        }

        let Some(backend) = &self.backend else {
            return fallback_condensation(observations);
        };

        let request = GenerationRequest {
            prompt: build_prompt(&observations),
            system: SYSTEM_PROMPT.to_string(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        match backend.generate(request).await {
            Ok(response) => {
                let condensed = parse_observations(&response, base_date(&observations));
                if condensed.is_empty() {
                    // Unparsable output is a backend failure
                    tracing::warn!(
                        backend = backend.name(),
                        "reflection output had no recognizable observations, using fallback"
                    );
                    fallback_condensation(observations)
                } else {
                    tracing::debug!(
                        before = observations.len(),
                        after = condensed.len(),
                        "reflection condensed observations"
                    );
                    condensed
                }
            }
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "reflection backend failed, using fallback");
                fallback_condensation(observations)
            }
        }
    }
}

fn build_prompt(observations: &[Observation]) -> String {
    format!(
        "Reflect on and condense the following observations.\n\n\
         OBSERVATIONS TO REFLECT:\n{}\n\n\
         Your task:\n\
         1. Reorganize and streamline the observations\n\
         2. Draw connections and conclusions\n\
         3. Combine related items\n\
         4. Remove redundancy while preserving critical information\n\
         5. Retain temporal context (dates and times)\n\n\
         Output ONLY the condensed observations, nothing else.",
        render_observations(observations)
    )
}

fn base_date(observations: &[Observation]) -> NaiveDate {
    observations
        .first()
        .map(|o| o.timestamp.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

/// Deterministic condensation: drop low-priority observations and append a
/// synthetic summary of how many were kept. Output is never longer than the
/// input.
fn fallback_condensation(observations: Vec<Observation>) -> Vec<Observation> {
    let total = observations.len();
    let summary_timestamp = observations.first().map(|o| o.timestamp);

    let mut kept: Vec<Observation> = observations
        .into_iter()
        .filter(|o| matches!(o.priority, Priority::High | Priority::Medium))
        .collect();

    if kept.len() < total {
        let timestamp = kept
            .first()
            .map(|o| o.timestamp)
            .or(summary_timestamp)
            .unwrap_or_else(Utc::now);
        kept.push(Observation::new(
            timestamp,
            Priority::High,
            format!("Memory consolidated: {} key observations preserved", kept.len()),
        ));
    }

    kept
}
