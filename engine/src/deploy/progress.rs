//! Deployment progress inference
//!
//! Derives a coarse completion percentage and a "what's happening now"
//! label from the deployment status and the milestone markers found in
//! its raw log.

use serde::{Deserialize, Serialize};

use crate::models::deployment::{Deployment, DeploymentStatus};

/// Label shown for terminal success
pub const STEP_SUCCESSFUL: &str = "Deployment successful";

/// Label shown for terminal failure
pub const STEP_FAILED: &str = "Deployment failed";

/// Generic label when the log carries no recognizable milestone
pub const STEP_IN_PROGRESS: &str = "Deployment in progress";

/// Derived progress state for a deployment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressView {
    /// Completion percentage, 0-100
    pub percent: u8,

    /// Human label of the step presumed in flight
    pub current_step: String,
}

/// One recognizable step boundary in the deployment log
///
/// `markers` are alternative substrings evidencing the boundary; `label`
/// names the work in flight once the *previous* boundary has appeared.
#[derive(Debug, Clone)]
pub struct Milestone {
    pub markers: Vec<String>,
    pub label: String,
}

impl Milestone {
    pub fn new(markers: &[&str], label: &str) -> Self {
        Self {
            markers: markers.iter().map(|m| m.to_string()).collect(),
            label: label.to_string(),
        }
    }

    fn matches(&self, log: &str) -> bool {
        self.markers.iter().any(|marker| log.contains(marker))
    }
}

/// Ordered milestone list used to score a log
///
/// The default table mirrors the standard deployment script. Callers with
/// a different log script supply their own table.
#[derive(Debug, Clone)]
pub struct MilestoneTable {
    steps: Vec<Milestone>,
}

impl MilestoneTable {
    pub fn new(steps: Vec<Milestone>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Milestone] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl Default for MilestoneTable {
    fn default() -> Self {
        Self::new(vec![
            Milestone::new(
                &["=== Cloning Repository ===", "=== Setting Up Repository ==="],
                "Preparing deployment",
            ),
            Milestone::new(
                &["✓ Repository cloned successfully", "✓ Repository updated successfully"],
                "Cloning repository",
            ),
            Milestone::new(&["✓ Commit information recorded"], "Recording commit information"),
            Milestone::new(&["=== Building Docker Container ==="], "Building Docker container"),
            Milestone::new(&["✓ Build successful"], "Building Docker container"),
            Milestone::new(&["✓ Old container stopped"], "Stopping old container"),
            Milestone::new(&["=== Starting Container ==="], "Starting container"),
            Milestone::new(&["Container started successfully"], "Starting container"),
            Milestone::new(&["=== Optimizing Application ==="], "Optimizing application"),
            Milestone::new(&["✓ Application optimization completed"], "Optimizing application"),
        ])
    }
}

/// Maps deployment state and log content to a [`ProgressView`]
///
/// Total: never fails, whatever the log contains.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    table: MilestoneTable,
}

impl ProgressEstimator {
    pub fn new(table: MilestoneTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &MilestoneTable {
        &self.table
    }

    /// Estimate progress for a deployment
    pub fn estimate(&self, deployment: &Deployment) -> ProgressView {
        match deployment.status {
            DeploymentStatus::Success => ProgressView {
                percent: 100,
                current_step: STEP_SUCCESSFUL.to_string(),
            },
            DeploymentStatus::Failed => ProgressView {
                percent: 0,
                current_step: STEP_FAILED.to_string(),
            },
            DeploymentStatus::Pending | DeploymentStatus::Running => {
                self.scan(&deployment.output_log)
            }
        }
    }

    fn scan(&self, log: &str) -> ProgressView {
        let steps = self.table.steps();
        let last_matched = steps.iter().rposition(|m| m.matches(log));

        match last_matched {
            None => {
                // Nothing recognized yet: a blank log means the first step
                // has not begun; a non-blank log means the script is not
                // one we know how to score.
                let current_step = match steps.first() {
                    Some(first) if log.trim().is_empty() => first.label.clone(),
                    _ => STEP_IN_PROGRESS.to_string(),
                };
                ProgressView { percent: 0, current_step }
            }
            Some(k) => {
                let percent = ((k + 1) * 100 / steps.len()) as u8;
                let current_step = steps
                    .get(k + 1)
                    .map(|next| next.label.clone())
                    .unwrap_or_else(|| STEP_IN_PROGRESS.to_string());
                ProgressView { percent, current_step }
            }
        }
    }
}
