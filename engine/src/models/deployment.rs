//! Deployment model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Deployment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Created, waiting for a worker to pick it up
    Pending,

    /// A worker is executing it
    Running,

    /// Finished successfully (terminal)
    Success,

    /// Finished with an error (terminal)
    Failed,
}

impl DeploymentStatus {
    /// Active statuses block new deployments for the same project
    pub fn is_active(self) -> bool {
        matches!(self, DeploymentStatus::Pending | DeploymentStatus::Running)
    }

    /// Terminal statuses admit no further transitions
    pub fn is_terminal(self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Running => "running",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// How a deployment was triggered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggeredBy {
    Manual,
    Webhook,
    Scheduled,
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TriggeredBy::Manual => "manual",
            TriggeredBy::Webhook => "webhook",
            TriggeredBy::Scheduled => "scheduled",
        };
        f.write_str(s)
    }
}

/// A deployment record
///
/// Created by the orchestrator in `pending`; the execution worker moves it
/// to `running` and then to a terminal status. Immutable once terminal,
/// apart from log lines appended before completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deployment {
    /// Unique deployment ID
    pub id: Uuid,

    /// Owning project
    pub project_id: Uuid,

    /// Target server
    pub server_id: Uuid,

    /// User who triggered the deployment
    pub user_id: Uuid,

    /// Branch being deployed
    pub branch: String,

    /// Deployed commit hash, once recorded
    pub commit_hash: Option<String>,

    /// Deployed commit message, once recorded
    pub commit_message: Option<String>,

    /// Current status
    pub status: DeploymentStatus,

    /// Trigger source
    pub triggered_by: TriggeredBy,

    /// Append-only execution log
    pub output_log: String,

    /// Error text captured on failure
    pub error_log: Option<String>,

    /// When the record was created
    pub created_at: DateTime<Utc>,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution finished
    pub completed_at: Option<DateTime<Utc>>,

    /// Wall-clock execution time
    pub duration_seconds: Option<i64>,
}

impl Deployment {
    /// Duration in seconds form, e.g. `"180s"`
    pub fn duration_display(&self) -> Option<String> {
        self.duration_seconds.map(|secs| format!("{}s", secs))
    }

    /// Duration in minutes form, e.g. `"3.0 min"`
    pub fn duration_minutes_display(&self) -> Option<String> {
        self.duration_seconds
            .map(|secs| format!("{:.1} min", secs as f64 / 60.0))
    }
}

/// Fields required to create a deployment row
#[derive(Debug, Clone)]
pub struct NewDeployment {
    pub project_id: Uuid,
    pub server_id: Uuid,
    pub user_id: Uuid,
    pub branch: String,
    pub commit_hash: Option<String>,
    pub commit_message: Option<String>,
    pub triggered_by: TriggeredBy,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment_with_duration(secs: i64) -> Deployment {
        Deployment {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            server_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            branch: "main".to_string(),
            commit_hash: None,
            commit_message: None,
            status: DeploymentStatus::Success,
            triggered_by: TriggeredBy::Manual,
            output_log: String::new(),
            error_log: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_seconds: Some(secs),
        }
    }

    #[test]
    fn test_duration_display_forms() {
        let deployment = deployment_with_duration(180);
        assert_eq!(deployment.duration_display(), Some("180s".to_string()));
        assert_eq!(deployment.duration_minutes_display(), Some("3.0 min".to_string()));
    }

    #[test]
    fn test_duration_display_absent_until_completed() {
        let mut deployment = deployment_with_duration(0);
        deployment.duration_seconds = None;
        assert_eq!(deployment.duration_display(), None);
        assert_eq!(deployment.duration_minutes_display(), None);
    }

    #[test]
    fn test_status_classification() {
        assert!(DeploymentStatus::Pending.is_active());
        assert!(DeploymentStatus::Running.is_active());
        assert!(!DeploymentStatus::Success.is_active());
        assert!(DeploymentStatus::Success.is_terminal());
        assert!(DeploymentStatus::Failed.is_terminal());
        assert!(!DeploymentStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&DeploymentStatus::Running).unwrap();
        assert_eq!(json, "\"running\"");
        assert_eq!(TriggeredBy::Webhook.to_string(), "webhook");
    }
}
