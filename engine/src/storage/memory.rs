//! In-memory deployment store
//!
//! All tables live behind one async mutex, which is what makes the
//! check-then-create in `create_deployment` atomic (the analog of the
//! database transaction the production store uses).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::deploy::state;
use crate::errors::EngineError;
use crate::models::deployment::{Deployment, DeploymentStatus, NewDeployment};
use crate::models::project::Project;
use crate::storage::store::{CompletionOutcome, DeploymentStore};

#[derive(Debug, Default)]
struct Tables {
    projects: HashMap<Uuid, Project>,
    deployments: HashMap<Uuid, Deployment>,
    // Insertion order, for newest-first listings
    order: Vec<Uuid>,
}

/// In-memory [`DeploymentStore`] implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(what: &str, id: Uuid) -> EngineError {
    EngineError::NotFound(format!("{} {} does not exist", what, id))
}

#[async_trait]
impl DeploymentStore for MemoryStore {
    async fn upsert_project(&self, project: Project) -> Result<(), EngineError> {
        let mut tables = self.tables.lock().await;
        tables.projects.insert(project.id, project);
        Ok(())
    }

    async fn project(&self, id: Uuid) -> Result<Project, EngineError> {
        let tables = self.tables.lock().await;
        tables
            .projects
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("project", id))
    }

    async fn create_deployment(&self, new: NewDeployment) -> Result<Deployment, EngineError> {
        let mut tables = self.tables.lock().await;

        let blocked = tables
            .deployments
            .values()
            .any(|d| d.project_id == new.project_id && d.status.is_active());
        if blocked {
            return Err(EngineError::Conflict(state::CONFLICT_MESSAGE.to_string()));
        }

        let deployment = Deployment {
            id: Uuid::new_v4(),
            project_id: new.project_id,
            server_id: new.server_id,
            user_id: new.user_id,
            branch: new.branch,
            commit_hash: new.commit_hash,
            commit_message: new.commit_message,
            status: DeploymentStatus::Pending,
            triggered_by: new.triggered_by,
            output_log: String::new(),
            error_log: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_seconds: None,
        };

        tables.order.push(deployment.id);
        tables.deployments.insert(deployment.id, deployment.clone());
        Ok(deployment)
    }

    async fn deployment(&self, id: Uuid) -> Result<Deployment, EngineError> {
        let tables = self.tables.lock().await;
        tables
            .deployments
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("deployment", id))
    }

    async fn active_deployment(&self, project_id: Uuid) -> Result<Option<Deployment>, EngineError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .deployments
            .values()
            .find(|d| d.project_id == project_id && d.status.is_active())
            .cloned())
    }

    async fn deployments_for_project(&self, project_id: Uuid) -> Result<Vec<Deployment>, EngineError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .order
            .iter()
            .rev()
            .filter_map(|id| tables.deployments.get(id))
            .filter(|d| d.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn mark_running(&self, id: Uuid, at: DateTime<Utc>) -> Result<Deployment, EngineError> {
        let mut tables = self.tables.lock().await;
        let deployment = tables
            .deployments
            .get_mut(&id)
            .ok_or_else(|| not_found("deployment", id))?;

        state::ensure_transition(deployment.status, DeploymentStatus::Running)?;
        deployment.status = DeploymentStatus::Running;
        deployment.started_at = Some(at);
        Ok(deployment.clone())
    }

    async fn complete(
        &self,
        id: Uuid,
        outcome: CompletionOutcome,
        at: DateTime<Utc>,
    ) -> Result<Deployment, EngineError> {
        let mut tables = self.tables.lock().await;
        let deployment = tables
            .deployments
            .get_mut(&id)
            .ok_or_else(|| not_found("deployment", id))?;

        let (status, error_log) = match outcome {
            CompletionOutcome::Success => (DeploymentStatus::Success, None),
            CompletionOutcome::Failure(error) => (DeploymentStatus::Failed, Some(error)),
        };

        state::ensure_transition(deployment.status, status)?;
        deployment.status = status;
        deployment.error_log = error_log;
        deployment.completed_at = Some(at);
        let started = deployment.started_at.unwrap_or(deployment.created_at);
        deployment.duration_seconds = Some((at - started).num_seconds().max(0));
        Ok(deployment.clone())
    }

    async fn append_output(&self, id: Uuid, line: &str) -> Result<(), EngineError> {
        let mut tables = self.tables.lock().await;
        let deployment = tables
            .deployments
            .get_mut(&id)
            .ok_or_else(|| not_found("deployment", id))?;

        if deployment.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "deployment {} is already complete",
                id
            )));
        }

        if !deployment.output_log.is_empty() {
            deployment.output_log.push('\n');
        }
        deployment.output_log.push_str(line);
        Ok(())
    }

    async fn record_commit(
        &self,
        id: Uuid,
        hash: &str,
        message: Option<&str>,
    ) -> Result<(), EngineError> {
        let mut tables = self.tables.lock().await;
        let deployment = tables
            .deployments
            .get_mut(&id)
            .ok_or_else(|| not_found("deployment", id))?;

        if deployment.status.is_terminal() {
            return Err(EngineError::Conflict(format!(
                "deployment {} is already complete",
                id
            )));
        }

        deployment.commit_hash = Some(hash.to_string());
        deployment.commit_message = message.map(|m| m.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::deployment::TriggeredBy;

    fn new_deployment(project_id: Uuid) -> NewDeployment {
        NewDeployment {
            project_id,
            server_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            branch: "main".to_string(),
            commit_hash: None,
            commit_message: None,
            triggered_by: TriggeredBy::Manual,
        }
    }

    #[tokio::test]
    async fn test_create_rejects_second_active_row() {
        let store = MemoryStore::new();
        let project_id = Uuid::new_v4();

        store.create_deployment(new_deployment(project_id)).await.unwrap();
        let err = store
            .create_deployment(new_deployment(project_id))
            .await
            .expect_err("second active create must fail");
        assert!(matches!(err, EngineError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_terminal_rows_do_not_block_new_deployments() {
        let store = MemoryStore::new();
        let project_id = Uuid::new_v4();

        let first = store.create_deployment(new_deployment(project_id)).await.unwrap();
        store.mark_running(first.id, Utc::now()).await.unwrap();
        store
            .complete(first.id, CompletionOutcome::Success, Utc::now())
            .await
            .unwrap();

        assert!(!store.has_active_deployment(project_id).await.unwrap());
        store.create_deployment(new_deployment(project_id)).await.unwrap();
    }

    #[tokio::test]
    async fn test_append_rejected_once_terminal() {
        let store = MemoryStore::new();
        let deployment = store.create_deployment(new_deployment(Uuid::new_v4())).await.unwrap();

        store.append_output(deployment.id, "before").await.unwrap();
        store.mark_running(deployment.id, Utc::now()).await.unwrap();
        store
            .complete(deployment.id, CompletionOutcome::Failure("boom".into()), Utc::now())
            .await
            .unwrap();

        let err = store
            .append_output(deployment.id, "after")
            .await
            .expect_err("append after completion must fail");
        assert!(matches!(err, EngineError::Conflict(_)));

        let row = store.deployment(deployment.id).await.unwrap();
        assert_eq!(row.output_log, "before");
        assert_eq!(row.error_log.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_complete_stamps_duration() {
        let store = MemoryStore::new();
        let deployment = store.create_deployment(new_deployment(Uuid::new_v4())).await.unwrap();

        let started = Utc::now();
        store.mark_running(deployment.id, started).await.unwrap();
        let finished = started + chrono::Duration::seconds(180);
        let row = store
            .complete(deployment.id, CompletionOutcome::Success, finished)
            .await
            .unwrap();

        assert_eq!(row.duration_seconds, Some(180));
        assert_eq!(row.completed_at, Some(finished));
    }
}
