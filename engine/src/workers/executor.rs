//! Deployment execution worker
//!
//! Consumes deployment ids from the deploy queue and drives the runner:
//! `pending -> running -> {success, failed}`. Queue delivery is
//! at-least-once, so ids whose row already left `pending` are skipped.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::deploy::live_log::DeploymentLogEvent;
use crate::deploy::runner::{DeploymentRunner, LogSink};
use crate::errors::EngineError;
use crate::models::deployment::DeploymentStatus;
use crate::storage::store::{CompletionOutcome, DeploymentStore};

/// Run the execution worker until shutdown or queue close
pub async fn run(
    store: Arc<dyn DeploymentStore>,
    runner: Arc<dyn DeploymentRunner>,
    events: broadcast::Sender<DeploymentLogEvent>,
    mut queue_rx: mpsc::UnboundedReceiver<Uuid>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Deployment worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Deployment worker shutting down...");
                return;
            }
            next = queue_rx.recv() => {
                let Some(deployment_id) = next else {
                    info!("Deploy queue closed, worker exiting");
                    return;
                };

                if let Err(e) = execute_deployment(
                    deployment_id,
                    store.clone(),
                    runner.clone(),
                    events.clone(),
                )
                .await
                {
                    error!("Deployment {} failed: {}", deployment_id, e);
                }
            }
        }
    }
}

async fn execute_deployment(
    deployment_id: Uuid,
    store: Arc<dyn DeploymentStore>,
    runner: Arc<dyn DeploymentRunner>,
    events: broadcast::Sender<DeploymentLogEvent>,
) -> Result<(), EngineError> {
    let deployment = match store.deployment(deployment_id).await {
        Ok(deployment) => deployment,
        Err(EngineError::NotFound(_)) => {
            warn!("Deployment {} vanished before execution, skipping", deployment_id);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    // At-least-once delivery: a redelivered id whose row already moved on
    // is consumed without effect.
    if deployment.status != DeploymentStatus::Pending {
        debug!(
            "Deployment {} is {}, ignoring duplicate delivery",
            deployment_id, deployment.status
        );
        return Ok(());
    }

    let deployment = store.mark_running(deployment_id, Utc::now()).await?;
    let project = store.project(deployment.project_id).await?;
    info!(
        "Executing deployment {} for project '{}'",
        deployment_id, project.name
    );

    // Run the runner in its own task so a panic is contained there and
    // lands as a failed completion instead of taking the loop down.
    let sink = LogSink::new(deployment_id, store.clone(), events);
    let task = {
        let runner = runner.clone();
        let deployment = deployment.clone();
        let project = project.clone();
        tokio::spawn(async move { runner.execute(&deployment, &project, &sink).await })
    };
    let result = match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            error!("Deployment {} runner panicked", deployment_id);
            Err(EngineError::Execution(
                "Deployment runner panicked".to_string(),
            ))
        }
        Err(e) => Err(EngineError::Execution(format!(
            "Deployment task aborted: {}",
            e
        ))),
    };
    let finished_at = Utc::now();

    match result {
        Ok(()) => {
            store
                .complete(deployment_id, CompletionOutcome::Success, finished_at)
                .await?;
            info!("Deployment {} completed successfully", deployment_id);
            Ok(())
        }
        Err(e) => {
            store
                .complete(
                    deployment_id,
                    CompletionOutcome::Failure(e.to_string()),
                    finished_at,
                )
                .await?;
            Err(e)
        }
    }
}
