//! Core types for observational memory

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Priority level of an observation.
///
/// The glyph vocabulary (🔴 🟡 🟢) exists only at the line-format boundary;
/// everywhere else the priority is this closed enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Explicit user facts, preferences, goals achieved, critical context
    High,
    /// Project details, learned information, tool results
    Medium,
    /// Minor details, uncertain observations
    Low,
}

impl Priority {
    /// Display glyph used in the observation line format
    pub fn marker(&self) -> &'static str {
        match self {
            Priority::High => "\u{1F534}",   // 🔴
            Priority::Medium => "\u{1F7E1}", // 🟡
            Priority::Low => "\u{1F7E2}",    // 🟢
        }
    }

    /// Map a leading glyph back to a priority
    pub fn from_marker(text: &str) -> Option<Priority> {
        if text.starts_with('\u{1F534}') {
            Some(Priority::High)
        } else if text.starts_with('\u{1F7E1}') {
            Some(Priority::Medium)
        } else if text.starts_with('\u{1F7E2}') {
            Some(Priority::Low)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "high"),
            Priority::Medium => write!(f, "medium"),
            Priority::Low => write!(f, "low"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "high" => Ok(Priority::High),
            "medium" => Ok(Priority::Medium),
            "low" => Ok(Priority::Low),
            other => Err(format!("unknown priority: {other}")),
        }
    }
}

/// A single timestamped, prioritized, compressed fact extracted from
/// conversation history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Observation {
    /// When the statement was made
    pub timestamp: DateTime<Utc>,
    /// Priority level
    pub priority: Priority,
    /// Assistant-facing natural-language description of the fact or event
    pub content: String,
    /// Absolute date resolved from a relative-time cue in the content
    /// ("last week", "tomorrow"); absent for present-moment or vague
    /// statements
    pub referenced_date: Option<DateTime<Utc>>,
}

impl Observation {
    /// Create a new observation without a referenced date
    pub fn new(timestamp: DateTime<Utc>, priority: Priority, content: impl Into<String>) -> Self {
        Self {
            timestamp,
            priority,
            content: content.into(),
            referenced_date: None,
        }
    }

    /// Attach a resolved referenced date
    pub fn with_referenced_date(mut self, date: DateTime<Utc>) -> Self {
        self.referenced_date = Some(date);
        self
    }
}

/// Complete observational memory for one conversation thread
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    /// Observations in insertion order (order of creation, not necessarily
    /// of timestamp)
    pub observations: Vec<Observation>,
    /// What the user is currently working on; overwritten, never appended
    pub current_task: String,
    /// Suggested continuation for the assistant; overwritten, never appended
    pub suggested_response: String,
    /// Instant of the most recent successful ingest
    pub last_observed_at: Option<DateTime<Utc>>,
}

/// Role of a raw conversation message
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// A raw conversation message handed to `ingest`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    /// Shorthand for a user message
    pub fn user(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(MessageRole::User, content, timestamp)
    }

    /// Shorthand for an assistant message
    pub fn assistant(content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(MessageRole::Assistant, content, timestamp)
    }
}

/// Summary statistics for one thread's memory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryStats {
    /// Number of observations currently held
    pub observation_count: usize,
    /// Whether a current task is known
    pub has_current_task: bool,
    /// Instant of the most recent successful ingest, if any
    pub last_observed_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_marker_round_trip() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(Priority::from_marker(p.marker()), Some(p));
        }
        assert_eq!(Priority::from_marker("plain text"), None);
    }

    #[test]
    fn priority_name_round_trip() {
        for p in [Priority::High, Priority::Medium, Priority::Low] {
            assert_eq!(p.to_string().parse::<Priority>().unwrap(), p);
        }
        assert!("urgent".parse::<Priority>().is_err());
    }
}
