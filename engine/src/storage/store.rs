//! Deployment store contract

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::deployment::{Deployment, NewDeployment};
use crate::models::project::Project;

/// Terminal outcome reported by the execution worker
#[derive(Debug, Clone)]
pub enum CompletionOutcome {
    Success,
    Failure(String),
}

/// Persistence contract for projects and deployments
///
/// `create_deployment` must be atomic with respect to the
/// active-deployment check: two concurrent creates for the same project
/// must never both succeed while either row is still active.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Insert or replace a project record
    async fn upsert_project(&self, project: Project) -> Result<(), EngineError>;

    /// Fetch a project by id
    async fn project(&self, id: Uuid) -> Result<Project, EngineError>;

    /// Atomically check for an active deployment and create a pending row.
    /// Rejects with `EngineError::Conflict` when an active row exists.
    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, EngineError>;

    /// Fetch a deployment by id
    async fn deployment(&self, id: Uuid) -> Result<Deployment, EngineError>;

    /// The active (pending or running) deployment for a project, if any
    async fn active_deployment(&self, project_id: Uuid) -> Result<Option<Deployment>, EngineError>;

    /// Whether an active deployment exists for a project
    async fn has_active_deployment(&self, project_id: Uuid) -> Result<bool, EngineError> {
        Ok(self.active_deployment(project_id).await?.is_some())
    }

    /// All deployments for a project, newest first
    async fn deployments_for_project(&self, project_id: Uuid) -> Result<Vec<Deployment>, EngineError>;

    /// Transition `pending -> running` and stamp `started_at`
    async fn mark_running(&self, id: Uuid, at: DateTime<Utc>) -> Result<Deployment, EngineError>;

    /// Transition to a terminal status, stamping `completed_at`,
    /// `duration_seconds` and (on failure) `error_log`
    async fn complete(
        &self,
        id: Uuid,
        outcome: CompletionOutcome,
        at: DateTime<Utc>,
    ) -> Result<Deployment, EngineError>;

    /// Append one line to the output log. Rejected once terminal.
    async fn append_output(&self, id: Uuid, line: &str) -> Result<(), EngineError>;

    /// Record the deployed commit on an active deployment
    async fn record_commit(
        &self,
        id: Uuid,
        hash: &str,
        message: Option<&str>,
    ) -> Result<(), EngineError>;
}
