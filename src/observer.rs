//! Observation extraction from raw conversation messages.
//!
//! Primary path is the text-generation backend; when that is unavailable or
//! fails, a deterministic keyword extractor takes over. Extraction never
//! fails outright.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};

use crate::format::parse_observations;
use crate::llm::{GenerationBackend, GenerationRequest};
use crate::types::{Message, MessageRole, Observation, Priority};

const SYSTEM_PROMPT: &str = "\
You are the memory consciousness of an AI assistant. Your observations will be \
the ONLY information the assistant has about past interactions with this user.

CORE PRINCIPLES:

1. BE SPECIFIC - Vague observations are useless. Capture details that distinguish and identify.
2. ANCHOR IN TIME - Note when things happened and when they were said.
3. TRACK STATE CHANGES - When information updates or supersedes previous info, make it explicit.
4. USE COMMON SENSE - If it would help the assistant remember later, observe it.

ASSERTIONS VS QUESTIONS:
- User TELLS you something -> \u{1F534} \"User stated [fact]\"
- User ASKS something -> \u{1F7E1} \"User asked [question]\"
- User assertions are authoritative. They are the source of truth about their own life.

TEMPORAL ANCHORING:
Each observation has TWO potential timestamps:
1. BEGINNING: the time the statement was made (from the message timestamp) - ALWAYS include this
2. END: the time being REFERENCED, if different from when it was said - ONLY when there is a relative time reference

ONLY add \"(meaning YYYY-MM-DD)\" or \"(estimated YYYY-MM-DD)\" at the END when you can provide an ACTUAL DATE:
- Past: \"last week\", \"yesterday\", \"a few days ago\", \"last month\", \"in March\"
- Future: \"this weekend\", \"tomorrow\", \"next week\"

DO NOT add end dates for present-moment statements or vague references like \
\"recently\", \"a while ago\", \"lately\", \"soon\" - these cannot be converted to actual dates.

FORMAT:
Each observation on its own line:
(24-hour time) [priority glyph] [observation] (optional resolved date)

Priorities:
- \u{1F534} High: explicit user facts, preferences, goals achieved, critical context
- \u{1F7E1} Medium: project details, learned information, tool results
- \u{1F7E2} Low: minor details, uncertain observations

After the observations you may add at most one of each of these trailer lines, \
only when the conversation makes them clear:
Current Task: [what the user is working on right now]
Suggested Response: [a short suggested continuation for the assistant]

REMEMBER: these observations are the assistant's ENTIRE memory. Any detail you \
fail to observe is permanently forgotten. When in doubt, observe it.";

/// Result of one extraction pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Newly extracted observations
    pub observations: Vec<Observation>,
    /// Current task, empty when the batch did not reveal one
    pub current_task: String,
    /// Suggested continuation, empty when the batch did not reveal one
    pub suggested_response: String,
}

/// The Extractor: turns raw messages plus prior observation text into new
/// observation records
pub struct Observer {
    backend: Option<Arc<dyn GenerationBackend>>,
    temperature: f32,
    max_output_tokens: u32,
}

impl Observer {
    /// Create an observer. `None` backend means fallback-only extraction.
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

    /// Extract new observations from a batch of messages.
    ///
    /// `existing_observations` is the textual rendering of what is already
    /// remembered; the backend is instructed not to duplicate it.
    pub async fn extract(&self, messages: &[Message], existing_observations: &str) -> Extraction {
        let Some(backend) = &self.backend else {
            return fallback_extraction(messages);
        };

        let prompt = build_prompt(messages, existing_observations);
        let request = GenerationRequest {
            prompt,
            system: SYSTEM_PROMPT.to_string(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
        };

        match backend.generate(request).await {
            Ok(response) => parse_extraction(&response, base_date(messages)),
            Err(e) => {
                tracing::warn!(backend = backend.name(), error = %e, "extraction backend failed, using fallback");
                fallback_extraction(messages)
            }
        }
    }
}

fn build_prompt(messages: &[Message], existing_observations: &str) -> String {
    let existing = if existing_observations.is_empty() {
        "(none)"
    } else {
        existing_observations
    };

    format!(
        "Extract observations from the following conversation history.\n\n\
         EXISTING OBSERVATIONS:\n{existing}\n\n\
         NEW MESSAGES:\n{}\n\n\
         Extract only observations that are NOT already in the existing observations.\n\
         Each observation on its own line. Output ONLY observations and the optional \
         trailer lines, nothing else.",
        format_messages(messages)
    )
}

fn format_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .filter(|m| !m.content.is_empty())
        .map(|m| format!("[{}] {}: {}", m.timestamp.format("%H:%M"), m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Calendar date used for lines that only carry a wall-clock time
fn base_date(messages: &[Message]) -> NaiveDate {
    messages
        .last()
        .map(|m| m.timestamp.date_naive())
        .unwrap_or_else(|| Utc::now().date_naive())
}

/// Parse backend output: observation lines plus optional trailer lines
fn parse_extraction(text: &str, base_date: NaiveDate) -> Extraction {
    let mut current_task = String::new();
    let mut suggested_response = String::new();
    let mut observation_lines = Vec::new();

    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(rest) = strip_prefix_ci(trimmed, "current task:") {
            current_task = rest.trim().to_string();
        } else if let Some(rest) = strip_prefix_ci(trimmed, "suggested response:") {
            suggested_response = rest.trim().to_string();
        } else {
            observation_lines.push(line);
        }
    }

    Extraction {
        observations: parse_observations(&observation_lines.join("\n"), base_date),
        current_task,
        suggested_response,
    }
}

fn strip_prefix_ci<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let head = line.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &line[prefix.len()..])
}

/// Deterministic keyword extraction used when no backend is available.
///
/// Scans user messages only; the first matching trigger wins, at most one
/// observation per message. Never fails.
fn fallback_extraction(messages: &[Message]) -> Extraction {
    let mut observations = Vec::new();

    for message in messages {
        if message.role != MessageRole::User || message.content.is_empty() {
            continue;
        }

        let content = message.content.to_lowercase();
        let observed = if content.contains("kids") || content.contains("children") {
            Some((Priority::High, "User mentioned family (children)"))
        } else if content.contains("work") || content.contains("job") {
            Some((Priority::Medium, "User discussed work situation"))
        } else if content.contains("help") {
            Some((Priority::Medium, "User asked for help"))
        } else {
            None
        };

        if let Some((priority, text)) = observed {
            observations.push(Observation::new(message.timestamp, priority, text));
        }
    }

    Extraction {
        observations,
        ..Extraction::default()
    }
}
