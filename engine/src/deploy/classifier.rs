//! Deployment log classification
//!
//! Turns a raw multi-line deployment log into structured entries with a
//! severity per line. Total: any input, including the empty string,
//! classifies without error.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a single log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogSeverity::Info => "info",
            LogSeverity::Warning => "warning",
            LogSeverity::Error => "error",
        };
        f.write_str(s)
    }
}

/// One classified log line
///
/// Derived at render time, never persisted. Entries re-derived from the
/// stored log carry no timestamp; live-pushed entries keep the event's.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub line: String,
    pub level: LogSeverity,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Classify a single line by keyword match, case-insensitive.
/// Error keywords win over warning keywords.
pub fn severity_of(line: &str) -> LogSeverity {
    let lower = line.to_lowercase();
    if lower.contains("error") || lower.contains("failed") {
        LogSeverity::Error
    } else if lower.contains("warning") || lower.contains("deprecated") {
        LogSeverity::Warning
    } else {
        LogSeverity::Info
    }
}

/// Lazy classified view over a raw log
///
/// Restartable: clone the iterator to scan again from the top.
#[derive(Debug, Clone)]
pub struct Classified<'a> {
    lines: std::str::Lines<'a>,
}

impl Iterator for Classified<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<Self::Item> {
        self.lines.next().map(|line| LogEntry {
            line: line.to_string(),
            level: severity_of(line),
            timestamp: None,
        })
    }
}

/// Classify a raw log into an ordered sequence of entries
pub fn classify(raw: &str) -> Classified<'_> {
    Classified { lines: raw.lines() }
}

/// Classify a raw log into an owned snapshot
pub fn classify_all(raw: &str) -> Vec<LogEntry> {
    classify(raw).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_keywords() {
        assert_eq!(severity_of("Pulling image..."), LogSeverity::Info);
        assert_eq!(severity_of("WARNING: low disk space"), LogSeverity::Warning);
        assert_eq!(severity_of("function X is deprecated"), LogSeverity::Warning);
        assert_eq!(severity_of("Error: connection refused"), LogSeverity::Error);
        assert_eq!(severity_of("git clone FAILED"), LogSeverity::Error);
    }

    #[test]
    fn test_error_wins_over_warning() {
        assert_eq!(severity_of("warning: build error ahead"), LogSeverity::Error);
        assert_eq!(severity_of("ERROR after a deprecated call"), LogSeverity::Error);
    }

    #[test]
    fn test_empty_log_yields_nothing() {
        assert_eq!(classify("").count(), 0);
        assert!(classify_all("").is_empty());
    }

    #[test]
    fn test_iterator_is_restartable() {
        let it = classify("one\ntwo\nthree");
        let first_pass: Vec<_> = it.clone().collect();
        let second_pass: Vec<_> = it.collect();
        assert_eq!(first_pass.len(), 3);
        assert_eq!(first_pass, second_pass);
    }
}
