//! Live log views
//!
//! Merges log lines pushed out-of-band by the execution worker into an
//! in-memory per-session view, without re-reading the stored record. The
//! view never writes back to the persisted log.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::deploy::classifier::{classify, LogEntry, LogSeverity};

/// A log line event delivered over the push channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentLogEvent {
    pub deployment_id: Uuid,
    pub line: String,
    pub level: LogSeverity,
    pub timestamp: DateTime<Utc>,
}

/// In-memory classified log view for one live session
///
/// Appends are purely additive: existing entries are never re-classified,
/// reordered or deduplicated (the push channel is at-least-once, and every
/// received event is kept).
#[derive(Debug, Clone, Default)]
pub struct LiveLogView {
    entries: Vec<LogEntry>,
}

impl LiveLogView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a view from the persisted log
    pub fn from_stored(raw: &str) -> Self {
        Self {
            entries: classify(raw).collect(),
        }
    }

    /// Append one pushed event to the end of the view
    pub fn append(&mut self, event: &DeploymentLogEvent) -> &[LogEntry] {
        self.entries.push(LogEntry {
            line: event.line.clone(),
            level: event.level,
            timestamp: Some(event.timestamp),
        });
        &self.entries
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-session live views, keyed by (session, deployment)
///
/// Explicit state handed to the UI layer; nothing here is global or
/// persisted.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    views: RwLock<HashMap<(String, Uuid), LiveLogView>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or re-open) a session view seeded from the stored log
    pub fn open(&self, session_id: &str, deployment_id: Uuid, stored_log: &str) -> Vec<LogEntry> {
        let mut views = self.views.write().unwrap_or_else(|e| e.into_inner());
        let view = LiveLogView::from_stored(stored_log);
        let entries = view.entries().to_vec();
        views.insert((session_id.to_string(), deployment_id), view);
        entries
    }

    pub fn is_open(&self, session_id: &str, deployment_id: Uuid) -> bool {
        let views = self.views.read().unwrap_or_else(|e| e.into_inner());
        views.contains_key(&(session_id.to_string(), deployment_id))
    }

    /// Append a pushed event to a session view, opening an empty view if
    /// the session has none yet. Returns the updated entries.
    pub fn append(&self, session_id: &str, event: &DeploymentLogEvent) -> Vec<LogEntry> {
        let mut views = self.views.write().unwrap_or_else(|e| e.into_inner());
        let view = views
            .entry((session_id.to_string(), event.deployment_id))
            .or_default();
        view.append(event).to_vec()
    }

    /// Current entries for a session view, if open
    pub fn snapshot(&self, session_id: &str, deployment_id: Uuid) -> Option<Vec<LogEntry>> {
        let views = self.views.read().unwrap_or_else(|e| e.into_inner());
        views
            .get(&(session_id.to_string(), deployment_id))
            .map(|v| v.entries().to_vec())
    }

    /// Drop a session view
    pub fn close(&self, session_id: &str, deployment_id: Uuid) {
        let mut views = self.views.write().unwrap_or_else(|e| e.into_inner());
        views.remove(&(session_id.to_string(), deployment_id));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(deployment_id: Uuid, line: &str, level: LogSeverity) -> DeploymentLogEvent {
        DeploymentLogEvent {
            deployment_id,
            line: line.to_string(),
            level,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_append_is_purely_additive() {
        let id = Uuid::new_v4();
        let mut view = LiveLogView::from_stored("first\nsecond");
        let before = view.entries().to_vec();

        view.append(&event(id, "third", LogSeverity::Info));

        assert_eq!(view.len(), before.len() + 1);
        assert_eq!(&view.entries()[..before.len()], before.as_slice());
        assert_eq!(view.entries()[2].line, "third");
    }

    #[test]
    fn test_duplicate_events_are_kept() {
        let id = Uuid::new_v4();
        let mut view = LiveLogView::new();
        let e = event(id, "same line", LogSeverity::Warning);

        view.append(&e);
        view.append(&e);

        assert_eq!(view.len(), 2);
        assert_eq!(view.entries()[0].line, view.entries()[1].line);
    }

    #[test]
    fn test_registry_keys_by_session_and_deployment() {
        let registry = SessionRegistry::new();
        let id = Uuid::new_v4();

        registry.open("session-a", id, "line");
        registry.append("session-b", &event(id, "pushed", LogSeverity::Info));

        assert_eq!(registry.snapshot("session-a", id).unwrap().len(), 1);
        assert_eq!(registry.snapshot("session-b", id).unwrap().len(), 1);
        registry.close("session-a", id);
        assert!(registry.snapshot("session-a", id).is_none());
    }
}
