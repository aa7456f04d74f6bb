//! Deployment execution
//!
//! The worker drives a [`DeploymentRunner`] against a deployment row. Every
//! emitted line goes through the [`LogSink`]: severity-classified, appended
//! to the stored log and broadcast to live UI sessions.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use crate::deploy::classifier::severity_of;
use crate::deploy::live_log::DeploymentLogEvent;
use crate::errors::EngineError;
use crate::models::deployment::Deployment;
use crate::models::project::Project;
use crate::storage::store::DeploymentStore;

/// Worker-side handle to one deployment row
///
/// Appends log lines to the persisted record and pushes them to live
/// sessions over the broadcast channel in the same call.
pub struct LogSink {
    deployment_id: Uuid,
    store: Arc<dyn DeploymentStore>,
    events: broadcast::Sender<DeploymentLogEvent>,
}

impl LogSink {
    pub fn new(
        deployment_id: Uuid,
        store: Arc<dyn DeploymentStore>,
        events: broadcast::Sender<DeploymentLogEvent>,
    ) -> Self {
        Self {
            deployment_id,
            store,
            events,
        }
    }

    /// Append one line to the deployment log and broadcast it
    pub async fn emit(&self, line: &str) -> Result<(), EngineError> {
        self.store.append_output(self.deployment_id, line).await?;

        // No live sessions listening is fine
        let _ = self.events.send(DeploymentLogEvent {
            deployment_id: self.deployment_id,
            line: line.to_string(),
            level: severity_of(line),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    /// Record the deployed commit on the row
    pub async fn record_commit(&self, hash: &str, message: Option<&str>) -> Result<(), EngineError> {
        self.store
            .record_commit(self.deployment_id, hash, message)
            .await
    }
}

/// Executes one deployment, streaming its log through the sink
///
/// A failure is reported as `Err`; the worker captures it into the row's
/// error log and terminal status. Runners never retry.
#[async_trait]
pub trait DeploymentRunner: Send + Sync {
    async fn execute(
        &self,
        deployment: &Deployment,
        project: &Project,
        log: &LogSink,
    ) -> Result<(), EngineError>;
}

/// Options for [`ProcessRunner`]
#[derive(Debug, Clone)]
pub struct ProcessRunnerOptions {
    /// Directory that holds one checkout per project
    pub work_root: PathBuf,

    /// Prefix for built image names
    pub image_prefix: String,

    /// Optional post-start optimization command (run with `bash -c`)
    pub optimize_cmd: Option<String>,
}

impl Default for ProcessRunnerOptions {
    fn default() -> Self {
        Self {
            work_root: PathBuf::from("/var/lib/devflow/deployments"),
            image_prefix: "devflow".to_string(),
            optimize_cmd: None,
        }
    }
}

/// Real deployment runner: git checkout, docker build, container swap
///
/// Emits the standard milestone log script the progress estimator scores.
pub struct ProcessRunner {
    options: ProcessRunnerOptions,
}

impl ProcessRunner {
    pub fn new(options: ProcessRunnerOptions) -> Self {
        Self { options }
    }
}

// Display prefix of a commit hash; falls back to the whole string when it
// is short or byte 8 is not a char boundary (lossy-decoded output).
fn short_hash(hash: &str) -> &str {
    hash.get(..8).unwrap_or(hash)
}

async fn run_step(mut cmd: Command, what: &str) -> Result<(), EngineError> {
    let status = cmd
        .status()
        .await
        .map_err(|e| EngineError::Execution(format!("Failed to run {}: {}", what, e)))?;

    if !status.success() {
        return Err(EngineError::Execution(format!("{} failed", what)));
    }
    Ok(())
}

async fn capture_step(mut cmd: Command, what: &str) -> Result<String, EngineError> {
    let output = cmd
        .output()
        .await
        .map_err(|e| EngineError::Execution(format!("Failed to run {}: {}", what, e)))?;

    if !output.status.success() {
        return Err(EngineError::Execution(format!("{} failed", what)));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[async_trait]
impl DeploymentRunner for ProcessRunner {
    async fn execute(
        &self,
        deployment: &Deployment,
        project: &Project,
        log: &LogSink,
    ) -> Result<(), EngineError> {
        let repo_url = project.repository_url.as_deref().ok_or_else(|| {
            EngineError::Validation(format!("project '{}' has no repository URL", project.name))
        })?;
        let target = self.options.work_root.join(project.id.to_string());
        let container = format!("{}-{}", self.options.image_prefix, project.id);
        let image = format!("{}/{}", self.options.image_prefix, project.id);

        info!(
            "Deploying project {} (branch: {}) for deployment {}",
            project.id, deployment.branch, deployment.id
        );

        // 1. Clone or update the repository
        if target.join(".git").exists() {
            log.emit("=== Setting Up Repository ===").await?;
            debug!("Checkout exists, pulling updates into {}", target.display());

            let mut cmd = Command::new("git");
            cmd.current_dir(&target)
                .args(["pull", "origin", &deployment.branch]);
            if let Err(e) = run_step(cmd, "git pull").await {
                log.emit("✗ Git pull failed").await?;
                return Err(e);
            }
            log.emit("✓ Repository updated successfully").await?;
        } else {
            log.emit("=== Cloning Repository ===").await?;
            debug!("Cloning {} into {}", repo_url, target.display());

            let mut cmd = Command::new("git");
            cmd.args(["clone", "-b", &deployment.branch, repo_url]).arg(&target);
            if let Err(e) = run_step(cmd, "git clone").await {
                log.emit("✗ Git clone failed").await?;
                return Err(e);
            }
            log.emit("✓ Repository cloned successfully").await?;
        }

        // 2. Record the deployed commit
        log.emit("=== Recording Commit Information ===").await?;
        let mut hash_cmd = Command::new("git");
        hash_cmd.current_dir(&target).args(["rev-parse", "HEAD"]);
        let mut message_cmd = Command::new("git");
        message_cmd
            .current_dir(&target)
            .args(["log", "-1", "--pretty=%s"]);

        match capture_step(hash_cmd, "git rev-parse").await {
            Ok(hash) => {
                let message = capture_step(message_cmd, "git log").await.ok();
                log.emit(&format!("Commit: {}", short_hash(&hash))).await?;
                if let Some(ref message) = message {
                    log.emit(&format!("Message: {}", message)).await?;
                }
                log.record_commit(&hash, message.as_deref()).await?;
                log.emit("✓ Commit information recorded").await?;
            }
            Err(_) => {
                log.emit("⚠ Could not retrieve commit information").await?;
            }
        }

        // 3. Build the image
        log.emit("=== Building Docker Container ===").await?;
        let mut cmd = Command::new("docker");
        cmd.args(["build", "-t", &image]).arg(&target);
        if let Err(e) = run_step(cmd, "docker build").await {
            log.emit("✗ Build failed").await?;
            return Err(e);
        }
        log.emit("✓ Build successful").await?;

        // 4. Stop the previous container, if any
        log.emit("=== Stopping Old Container ===").await?;
        let mut stop = Command::new("docker");
        stop.args(["stop", &container]);
        let _ = stop.status().await;
        let mut rm = Command::new("docker");
        rm.args(["rm", &container]);
        let _ = rm.status().await;
        log.emit("✓ Old container stopped (if any)").await?;

        // 5. Start the new container
        log.emit("=== Starting Container ===").await?;
        let mut cmd = Command::new("docker");
        cmd.args([
            "run",
            "-d",
            "--name",
            &container,
            "--restart",
            "unless-stopped",
            &image,
        ]);
        if let Err(e) = run_step(cmd, "docker run").await {
            log.emit("✗ Container start failed").await?;
            return Err(e);
        }
        log.emit("Container started successfully").await?;

        // 6. Optional application optimization hook
        log.emit("=== Optimizing Application ===").await?;
        if let Some(ref optimize_cmd) = self.options.optimize_cmd {
            let mut cmd = Command::new("bash");
            cmd.current_dir(&target).args(["-c", optimize_cmd]);
            // Optimization is best-effort; a failing hook does not fail
            // the deployment.
            if run_step(cmd, "optimization hook").await.is_err() {
                log.emit("⚠ Optimization hook skipped").await?;
            }
        }
        log.emit("✓ Application optimization completed").await?;

        info!("Deployment {} executed successfully", deployment.id);
        Ok(())
    }
}
