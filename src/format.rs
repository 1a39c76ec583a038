//! Observation line format and context rendering.
//!
//! One observation per line:
//!
//! ```text
//! 🔴 (14:05) User stated they moved to Berlin, referenced 2026-08-18
//! ```
//!
//! Backend output uses the same shape with the time token first
//! (`(14:05) 🔴 ...`); [`parse_observations`] accepts both orders, resolves
//! `Date:` headers, and silently skips anything that does not begin with a
//! `(`-delimited time token.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;

use crate::types::{MemoryRecord, Observation, Priority};

/// Render a single observation line (without its date header)
pub fn render_line(obs: &Observation) -> String {
    let time = obs.timestamp.format("%H:%M");
    match obs.referenced_date {
        Some(date) => format!(
            "{} ({}) {}, referenced {}",
            obs.priority.marker(),
            time,
            obs.content,
            date.format("%Y-%m-%d")
        ),
        None => format!("{} ({}) {}", obs.priority.marker(), time, obs.content),
    }
}

/// Render observations grouped by calendar date.
///
/// Dates ascend; observations within a date keep insertion order.
pub fn render_observations(observations: &[Observation]) -> String {
    if observations.is_empty() {
        return String::new();
    }

    let mut grouped: BTreeMap<NaiveDate, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        grouped.entry(obs.timestamp.date_naive()).or_default().push(obs);
    }

    let mut lines = Vec::new();
    for (date, group) in &grouped {
        lines.push(format!("Date: {date}"));
        for obs in group {
            lines.push(render_line(obs));
        }
    }

    lines.join("\n")
}

/// Render the full context block for a record: observations, then the
/// optional suggested-response and current-task sections
pub fn render_context(record: &MemoryRecord) -> String {
    let mut context = render_observations(&record.observations);

    if !record.suggested_response.is_empty() {
        context.push_str(&format!(
            "\n\n<Suggested Response>\n{}\n",
            record.suggested_response
        ));
    }

    if !record.current_task.is_empty() {
        context.push_str(&format!("\n\n<Current Task>\n{}\n", record.current_task));
    }

    context
}

/// Parse a block of backend output into observations.
///
/// `base_date` supplies the calendar date for lines that only carry a time;
/// `Date: YYYY-MM-DD` header lines update it for subsequent lines.
pub fn parse_observations(text: &str, base_date: NaiveDate) -> Vec<Observation> {
    let mut observations = Vec::new();
    let mut current_date = base_date;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Date:") {
            if let Ok(date) = NaiveDate::parse_from_str(rest.trim(), "%Y-%m-%d") {
                current_date = date;
            }
            continue;
        }

        if let Some(obs) = parse_line(line, current_date) {
            observations.push(obs);
        }
    }

    observations
}

/// Parse a single observation line. Returns `None` for anything that does
/// not begin with a `(HH:MM)` time token (or the same with a leading glyph).
pub fn parse_line(line: &str, base_date: NaiveDate) -> Option<Observation> {
    let mut rest = line.trim();

    // Tolerate bullet prefixes
    rest = rest
        .strip_prefix("* ")
        .or_else(|| rest.strip_prefix("- "))
        .unwrap_or(rest)
        .trim_start();

    // Rendered lines lead with the glyph; backend lines lead with the time
    let mut priority = Priority::from_marker(rest);
    if let Some(p) = priority {
        rest = rest[p.marker().len()..].trim_start();
    }

    let inner = rest.strip_prefix('(')?;
    let close = inner.find(')')?;
    let time = NaiveTime::parse_from_str(inner[..close].trim(), "%H:%M").ok()?;
    rest = inner[close + 1..].trim_start();

    if priority.is_none() {
        priority = Priority::from_marker(rest);
        if let Some(p) = priority {
            rest = rest[p.marker().len()..].trim_start();
        }
    }

    // Tolerate bracketed priority tags like "[high]" in place of a glyph
    if let Some(after) = rest.strip_prefix('[') {
        if let Some(end) = after.find(']') {
            if priority.is_none() {
                priority = after[..end].trim().parse().ok();
            }
            rest = after[end + 1..].trim_start();
        }
    }

    let (content, referenced_date) = split_referenced_date(rest);
    if content.is_empty() {
        return None;
    }

    let timestamp = utc_at(base_date, time);
    let mut obs = Observation::new(timestamp, priority.unwrap_or(Priority::Medium), content);
    if let Some(date) = referenced_date {
        obs = obs.with_referenced_date(utc_at(date, NaiveTime::MIN));
    }
    Some(obs)
}

fn utc_at(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    DateTime::from_naive_utc_and_offset(date.and_time(time), Utc)
}

/// Split a trailing resolved-date annotation off the content.
///
/// Recognizes the extractor's `(meaning YYYY-MM-DD)` / `(estimated
/// YYYY-MM-DD)` suffixes and the rendered `, referenced YYYY-MM-DD` form.
/// A date is only ever taken from such an explicit annotation.
fn split_referenced_date(content: &str) -> (String, Option<NaiveDate>) {
    let trimmed = content.trim().trim_end_matches('.').trim_end();

    if let Some(stripped) = trimmed.strip_suffix(')') {
        if let Some(open) = stripped.rfind('(') {
            let inner = stripped[open + 1..].trim();
            let date_part = inner
                .strip_prefix("meaning ")
                .or_else(|| inner.strip_prefix("estimated "));
            if let Some(date_part) = date_part {
                if let Ok(date) = NaiveDate::parse_from_str(date_part.trim(), "%Y-%m-%d") {
                    let head = stripped[..open].trim_end().trim_end_matches(',').trim_end();
                    return (head.to_string(), Some(date));
                }
            }
        }
    }

    if let Some(pos) = trimmed.rfind(", referenced ") {
        let tail = trimmed[pos + ", referenced ".len()..].trim();
        if let Ok(date) = NaiveDate::parse_from_str(tail, "%Y-%m-%d") {
            return (trimmed[..pos].trim_end().to_string(), Some(date));
        }
    }

    (content.trim().to_string(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn at(date: &str, time: &str) -> DateTime<Utc> {
        NaiveDateTime::parse_from_str(&format!("{date} {time}"), "%Y-%m-%d %H:%M")
            .unwrap()
            .and_utc()
    }

    #[test]
    fn renders_line_with_marker_and_time() {
        let obs = Observation::new(at("2026-02-10", "10:00"), Priority::High, "User has two kids");
        assert_eq!(render_line(&obs), "\u{1F534} (10:00) User has two kids");
    }

    #[test]
    fn renders_referenced_date_suffix() {
        let obs = Observation::new(at("2026-02-10", "10:00"), Priority::Medium, "User was on vacation")
            .with_referenced_date(at("2026-02-03", "00:00"));
        assert_eq!(
            render_line(&obs),
            "\u{1F7E1} (10:00) User was on vacation, referenced 2026-02-03"
        );
    }

    #[test]
    fn groups_by_date_ascending() {
        let observations = vec![
            Observation::new(at("2026-02-11", "09:00"), Priority::Low, "second day"),
            Observation::new(at("2026-02-10", "10:00"), Priority::High, "first day"),
        ];
        let text = render_observations(&observations);
        let first = text.find("Date: 2026-02-10").unwrap();
        let second = text.find("Date: 2026-02-11").unwrap();
        assert!(first < second);
        assert!(text.find("first day").unwrap() < text.find("second day").unwrap());
    }

    #[test]
    fn context_includes_sections_when_present() {
        let record = MemoryRecord {
            observations: vec![Observation::new(
                at("2026-02-10", "10:00"),
                Priority::High,
                "User has two kids",
            )],
            current_task: "Plan a family trip".to_string(),
            suggested_response: "Ask about destinations".to_string(),
            last_observed_at: None,
        };
        let context = render_context(&record);
        assert!(context.contains("<Suggested Response>\nAsk about destinations"));
        assert!(context.contains("<Current Task>\nPlan a family trip"));
    }

    #[test]
    fn context_omits_empty_sections() {
        let record = MemoryRecord::default();
        let context = render_context(&record);
        assert!(!context.contains("<Suggested Response>"));
        assert!(!context.contains("<Current Task>"));
    }

    #[test]
    fn parses_backend_line_with_time_first() {
        let base = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let obs = parse_line("(14:05) \u{1F534} User stated they work at a bakery", base).unwrap();
        assert_eq!(obs.priority, Priority::High);
        assert_eq!(obs.content, "User stated they work at a bakery");
        assert_eq!(obs.timestamp, at("2026-02-10", "14:05"));
        assert!(obs.referenced_date.is_none());
    }

    #[test]
    fn parses_rendered_line_with_marker_first() {
        let base = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let obs = parse_line("\u{1F7E2} (08:30) Minor aside about weather", base).unwrap();
        assert_eq!(obs.priority, Priority::Low);
        assert_eq!(obs.content, "Minor aside about weather");
    }

    #[test]
    fn missing_marker_defaults_to_medium() {
        let base = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let obs = parse_line("(09:00) User asked about pricing", base).unwrap();
        assert_eq!(obs.priority, Priority::Medium);
    }

    #[test]
    fn parses_meaning_annotation_into_referenced_date() {
        let base = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let obs = parse_line(
            "(14:05) \u{1F534} User said they moved last week (meaning 2026-02-03)",
            base,
        )
        .unwrap();
        assert_eq!(obs.content, "User said they moved last week");
        assert_eq!(
            obs.referenced_date.unwrap().date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 3).unwrap()
        );
    }

    #[test]
    fn line_format_round_trips_through_parse() {
        let obs = Observation::new(at("2026-02-10", "10:00"), Priority::High, "User has two kids")
            .with_referenced_date(at("2026-02-03", "00:00"));
        let parsed = parse_line(&render_line(&obs), obs.timestamp.date_naive()).unwrap();
        assert_eq!(parsed, obs);
    }

    #[test]
    fn skips_lines_without_time_token() {
        let base = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert!(parse_line("Here are the observations:", base).is_none());
        assert!(parse_line("\u{1F534} no time token here", base).is_none());
        assert!(parse_line("(later) not a time", base).is_none());
    }

    #[test]
    fn date_headers_rebase_subsequent_lines() {
        let base = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        let text = "Date: 2026-01-05\n(10:00) \u{1F534} older fact\nDate: 2026-02-10\n(11:00) \u{1F7E1} newer fact\ncommentary that is skipped";
        let parsed = parse_observations(text, base);
        assert_eq!(parsed.len(), 2);
        assert_eq!(
            parsed[0].timestamp.date_naive(),
            NaiveDate::from_ymd_opt(2026, 1, 5).unwrap()
        );
        assert_eq!(parsed[1].timestamp.date_naive(), base);
    }
}
