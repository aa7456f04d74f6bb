//! Engine facade
//!
//! Wires the store, queue, push channel and derived-view components behind
//! the surface the UI layer consumes: deploy, classified log, progress
//! view, live log sessions and explicit refresh.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::deploy::classifier::{self, LogEntry};
use crate::deploy::live_log::{DeploymentLogEvent, SessionRegistry};
use crate::deploy::orchestrator::DeploymentOrchestrator;
use crate::deploy::progress::{ProgressEstimator, ProgressView};
use crate::errors::EngineError;
use crate::models::deployment::{Deployment, TriggeredBy};
use crate::options::EngineOptions;
use crate::queue::{self, DeployQueue};
use crate::storage::store::DeploymentStore;

/// Deployment engine entry point for the UI layer
pub struct DeploymentEngine {
    store: Arc<dyn DeploymentStore>,
    orchestrator: DeploymentOrchestrator,
    estimator: ProgressEstimator,
    sessions: SessionRegistry,
    events: broadcast::Sender<DeploymentLogEvent>,
}

impl DeploymentEngine {
    /// Build an engine over a store and deploy queue
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        deploy_queue: Arc<dyn DeployQueue>,
        options: EngineOptions,
    ) -> Self {
        let (events, _) = broadcast::channel(options.event_capacity.max(1));
        Self {
            orchestrator: DeploymentOrchestrator::new(store.clone(), deploy_queue),
            estimator: ProgressEstimator::new(options.milestones),
            sessions: SessionRegistry::new(),
            events,
            store,
        }
    }

    /// Build an engine with a channel-backed queue, returning the receiver
    /// the execution worker consumes
    pub fn with_channel_queue(
        store: Arc<dyn DeploymentStore>,
        options: EngineOptions,
    ) -> (Self, tokio::sync::mpsc::UnboundedReceiver<Uuid>) {
        let (deploy_queue, queue_rx) = queue::channel_queue();
        (Self::new(store, Arc::new(deploy_queue), options), queue_rx)
    }

    /// Sender side of the push channel, for wiring the worker
    pub fn events(&self) -> broadcast::Sender<DeploymentLogEvent> {
        self.events.clone()
    }

    /// Subscribe to live log events
    pub fn subscribe(&self) -> broadcast::Receiver<DeploymentLogEvent> {
        self.events.subscribe()
    }

    /// Start a manually triggered deployment for a project
    pub async fn deploy(&self, project_id: Uuid, user_id: Uuid) -> Result<Deployment, EngineError> {
        self.orchestrator.deploy(project_id, user_id).await
    }

    /// Start a deployment with an explicit trigger source
    pub async fn deploy_with(
        &self,
        project_id: Uuid,
        user_id: Uuid,
        triggered_by: TriggeredBy,
    ) -> Result<Deployment, EngineError> {
        self.orchestrator
            .deploy_with(project_id, user_id, triggered_by)
            .await
    }

    /// Whether a new deployment may start for a project right now
    pub async fn can_deploy(&self, project_id: Uuid) -> Result<bool, EngineError> {
        self.orchestrator
            .state_machine()
            .can_start_new_deployment(project_id)
            .await
    }

    /// Re-fetch a deployment row (explicit read-refresh contract; the
    /// worker mutates rows out-of-band)
    pub async fn refresh(&self, deployment_id: Uuid) -> Result<Deployment, EngineError> {
        self.store.deployment(deployment_id).await
    }

    /// Derived progress for a deployment
    pub async fn progress_view(&self, deployment_id: Uuid) -> Result<ProgressView, EngineError> {
        let deployment = self.store.deployment(deployment_id).await?;
        Ok(self.estimator.estimate(&deployment))
    }

    /// Classified view of the stored output log
    pub async fn classified_log(&self, deployment_id: Uuid) -> Result<Vec<LogEntry>, EngineError> {
        let deployment = self.store.deployment(deployment_id).await?;
        Ok(classifier::classify_all(&deployment.output_log))
    }

    /// Classified view of the stored error log (empty when none)
    pub async fn classified_error_log(
        &self,
        deployment_id: Uuid,
    ) -> Result<Vec<LogEntry>, EngineError> {
        let deployment = self.store.deployment(deployment_id).await?;
        Ok(deployment
            .error_log
            .as_deref()
            .map(classifier::classify_all)
            .unwrap_or_default())
    }

    /// Deployment history for a project, newest first
    pub async fn deployment_history(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<Deployment>, EngineError> {
        self.store.deployments_for_project(project_id).await
    }

    /// Open a live log session seeded from the stored log
    pub async fn open_live_log(
        &self,
        session_id: &str,
        deployment_id: Uuid,
    ) -> Result<Vec<LogEntry>, EngineError> {
        let deployment = self.store.deployment(deployment_id).await?;
        Ok(self
            .sessions
            .open(session_id, deployment_id, &deployment.output_log))
    }

    /// Push-channel handler: merge one event into a session's live view
    ///
    /// A session that never opened the deployment is seeded from the
    /// stored log first, then the event is appended. Returns the updated
    /// entries.
    pub async fn on_live_log_line(
        &self,
        session_id: &str,
        event: &DeploymentLogEvent,
    ) -> Result<Vec<LogEntry>, EngineError> {
        if !self.sessions.is_open(session_id, event.deployment_id) {
            let deployment = self.store.deployment(event.deployment_id).await?;
            self.sessions
                .open(session_id, event.deployment_id, &deployment.output_log);
        }
        Ok(self.sessions.append(session_id, event))
    }

    /// Drop a live log session
    pub fn close_live_log(&self, session_id: &str, deployment_id: Uuid) {
        self.sessions.close(session_id, deployment_id);
    }
}
