//! Deployment orchestration
//!
//! Entry point for starting deployments: serializes per project, checks the
//! state machine, creates the pending row and hands the id to the deploy
//! queue. Execution itself happens in the worker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::deploy::state::DeploymentStateMachine;
use crate::errors::EngineError;
use crate::models::deployment::{Deployment, TriggeredBy};
use crate::queue::DeployQueue;
use crate::storage::store::{CompletionOutcome, DeploymentStore};

/// Per-project serialization for check-then-create
///
/// Concurrent deploy requests for the same project queue up on one async
/// mutex; requests for different projects do not contend.
#[derive(Debug, Default)]
pub struct ProjectLocks {
    locks: StdMutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, project_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Creates deployments and dispatches them for execution
pub struct DeploymentOrchestrator {
    store: Arc<dyn DeploymentStore>,
    queue: Arc<dyn DeployQueue>,
    state: DeploymentStateMachine,
    locks: ProjectLocks,
}

impl DeploymentOrchestrator {
    pub fn new(store: Arc<dyn DeploymentStore>, queue: Arc<dyn DeployQueue>) -> Self {
        Self {
            state: DeploymentStateMachine::new(store.clone()),
            store,
            queue,
            locks: ProjectLocks::new(),
        }
    }

    pub fn state_machine(&self) -> &DeploymentStateMachine {
        &self.state
    }

    /// Start a manually triggered deployment
    pub async fn deploy(&self, project_id: Uuid, user_id: Uuid) -> Result<Deployment, EngineError> {
        self.deploy_with(project_id, user_id, TriggeredBy::Manual).await
    }

    /// Start a deployment with an explicit trigger source
    ///
    /// Creates the pending row and enqueues the execution task. Rejected
    /// with `EngineError::Conflict` while the project has an active
    /// deployment; the caller may retry later, this layer never does.
    pub async fn deploy_with(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        triggered_by: TriggeredBy,
    ) -> Result<Deployment, EngineError> {
        let lock = self.locks.lock_for(project_id);
        let _guard = lock.lock().await;

        let project = match self.store.project(project_id).await {
            Ok(project) => project,
            Err(EngineError::NotFound(_)) => {
                return Err(EngineError::Validation(format!(
                    "project {} does not exist",
                    project_id
                )));
            }
            Err(e) => return Err(e),
        };

        let deployment = self
            .state
            .start_deployment(&project, user_id, triggered_by)
            .await?;

        info!(
            "Deployment {} created for project '{}' (trigger: {})",
            deployment.id, project.name, triggered_by
        );

        if let Err(e) = self.queue.enqueue(deployment.id) {
            // Do not leave an orphaned active row behind a dead queue
            warn!("Enqueue failed for deployment {}: {}", deployment.id, e);
            if let Err(rollback) = self
                .store
                .complete(
                    deployment.id,
                    CompletionOutcome::Failure(format!("Failed to enqueue deployment: {}", e)),
                    Utc::now(),
                )
                .await
            {
                warn!(
                    "Could not mark deployment {} failed after enqueue error: {}",
                    deployment.id, rollback
                );
            }
            return Err(e);
        }

        Ok(deployment)
    }
}
