//! Deployment status state machine
//!
//! `pending -> running -> {success, failed}`, plus `pending -> failed` for
//! jobs that die before their run transition lands. At most one active
//! (pending or running) deployment may exist per project; the store's
//! check-and-create makes that check atomic.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use crate::errors::EngineError;
use crate::models::deployment::{Deployment, DeploymentStatus, NewDeployment, TriggeredBy};
use crate::models::project::Project;
use crate::storage::store::DeploymentStore;

/// Message returned when an active deployment blocks a new one
pub const CONFLICT_MESSAGE: &str = "A deployment is already in progress for this project";

/// Whether a status transition is allowed
pub fn can_transition(from: DeploymentStatus, to: DeploymentStatus) -> bool {
    matches!(
        (from, to),
        (DeploymentStatus::Pending, DeploymentStatus::Running)
            | (DeploymentStatus::Pending, DeploymentStatus::Failed)
            | (DeploymentStatus::Running, DeploymentStatus::Success)
            | (DeploymentStatus::Running, DeploymentStatus::Failed)
    )
}

/// Validate a status transition, rejecting violations as conflicts
pub fn ensure_transition(from: DeploymentStatus, to: DeploymentStatus) -> Result<(), EngineError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(EngineError::Conflict(format!(
            "Invalid status transition: {} -> {}",
            from, to
        )))
    }
}

/// Governs deployment creation against the single-active-per-project rule
pub struct DeploymentStateMachine {
    store: Arc<dyn DeploymentStore>,
}

impl DeploymentStateMachine {
    pub fn new(store: Arc<dyn DeploymentStore>) -> Self {
        Self { store }
    }

    /// Advisory check: can a new deployment start for this project?
    ///
    /// False iff an active (pending or running) deployment exists. The
    /// authoritative check happens inside [`Self::start_deployment`].
    pub async fn can_start_new_deployment(&self, project_id: Uuid) -> Result<bool, EngineError> {
        Ok(!self.store.has_active_deployment(project_id).await?)
    }

    /// Validate the project and create a pending deployment row.
    ///
    /// The store's create is atomic with respect to the active-deployment
    /// check; a concurrent active row yields `EngineError::Conflict` and
    /// nothing is created. No retries at this layer.
    pub async fn start_deployment(
        &self,
        project: &Project,
        user_id: Uuid,
        triggered_by: TriggeredBy,
    ) -> Result<Deployment, EngineError> {
        let server_id = project.server_id.ok_or_else(|| {
            EngineError::Validation(format!("project '{}' has no server assigned", project.name))
        })?;

        if project.branch.trim().is_empty() {
            return Err(EngineError::Validation(format!(
                "project '{}' has no branch configured",
                project.name
            )));
        }

        debug!("Creating pending deployment for project {}", project.id);

        self.store
            .create_deployment(NewDeployment {
                project_id: project.id,
                server_id,
                user_id,
                branch: project.branch.clone(),
                commit_hash: None,
                commit_message: None,
                triggered_by,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_transitions() {
        use DeploymentStatus::*;

        assert!(can_transition(Pending, Running));
        assert!(can_transition(Pending, Failed));
        assert!(can_transition(Running, Success));
        assert!(can_transition(Running, Failed));
    }

    #[test]
    fn test_terminal_states_admit_nothing() {
        use DeploymentStatus::*;

        for from in [Success, Failed] {
            for to in [Pending, Running, Success, Failed] {
                assert!(!can_transition(from, to), "{} -> {} should be rejected", from, to);
            }
        }
    }

    #[test]
    fn test_no_backwards_transitions() {
        use DeploymentStatus::*;

        assert!(!can_transition(Running, Pending));
        assert!(!can_transition(Pending, Success));
        assert!(!can_transition(Pending, Pending));
        assert!(!can_transition(Running, Running));
    }

    #[test]
    fn test_ensure_transition_reports_conflict() {
        let err = ensure_transition(DeploymentStatus::Success, DeploymentStatus::Running)
            .expect_err("terminal transition must fail");
        assert!(matches!(err, EngineError::Conflict(_)));
    }
}
