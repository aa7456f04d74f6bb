//! Progress estimator integration tests

use chrono::Utc;
use devflow_engine::deploy::progress::{
    Milestone, MilestoneTable, ProgressEstimator, STEP_FAILED, STEP_SUCCESSFUL,
};
use devflow_engine::models::deployment::{Deployment, DeploymentStatus, TriggeredBy};
use uuid::Uuid;

fn deployment(status: DeploymentStatus, log: &str) -> Deployment {
    Deployment {
        id: Uuid::new_v4(),
        project_id: Uuid::new_v4(),
        server_id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        branch: "main".to_string(),
        commit_hash: None,
        commit_message: None,
        status,
        triggered_by: TriggeredBy::Manual,
        output_log: log.to_string(),
        error_log: None,
        created_at: Utc::now(),
        started_at: None,
        completed_at: None,
        duration_seconds: None,
    }
}

#[test]
fn test_success_is_always_complete() {
    let estimator = ProgressEstimator::default();
    for log in ["", "garbage", "=== Cloning Repository ===", "error everywhere"] {
        let view = estimator.estimate(&deployment(DeploymentStatus::Success, log));
        assert_eq!(view.percent, 100);
        assert_eq!(view.current_step, STEP_SUCCESSFUL);
    }
}

#[test]
fn test_failed_is_always_zero() {
    let estimator = ProgressEstimator::default();
    for log in ["", "✓ Build successful\nContainer started successfully"] {
        let view = estimator.estimate(&deployment(DeploymentStatus::Failed, log));
        assert_eq!(view.percent, 0);
        assert_eq!(view.current_step, STEP_FAILED);
    }
}

#[test]
fn test_clone_started_scores_ten_percent() {
    let estimator = ProgressEstimator::default();
    let view = estimator.estimate(&deployment(
        DeploymentStatus::Running,
        "=== Cloning Repository ===",
    ));
    assert_eq!(view.percent, 10);
    assert_eq!(view.current_step, "Cloning repository");
}

#[test]
fn test_clone_complete_moves_to_commit_recording() {
    let estimator = ProgressEstimator::default();
    let view = estimator.estimate(&deployment(
        DeploymentStatus::Running,
        "=== Cloning Repository ===\n✓ Repository cloned successfully",
    ));
    assert_eq!(view.percent, 20);
    assert_eq!(view.current_step, "Recording commit information");
}

#[test]
fn test_commit_recorded_moves_past_twenty_percent() {
    let estimator = ProgressEstimator::default();
    let view = estimator.estimate(&deployment(
        DeploymentStatus::Running,
        "=== Cloning Repository ===\n✓ Repository cloned successfully\n✓ Commit information recorded",
    ));
    assert!(view.percent >= 20, "got {}", view.percent);
    assert_eq!(view.percent, 30);
    assert_eq!(view.current_step, "Building Docker container");
}

#[test]
fn test_updated_checkout_counts_like_a_clone() {
    let estimator = ProgressEstimator::default();
    let view = estimator.estimate(&deployment(
        DeploymentStatus::Running,
        "=== Setting Up Repository ===\n✓ Repository updated successfully",
    ));
    assert_eq!(view.percent, 20);
    assert_eq!(view.current_step, "Recording commit information");
}

#[test]
fn test_pending_with_empty_log_names_first_step() {
    let estimator = ProgressEstimator::default();
    let view = estimator.estimate(&deployment(DeploymentStatus::Pending, ""));
    assert_eq!(view.percent, 0);
    assert_eq!(view.current_step, "Preparing deployment");
}

#[test]
fn test_milestones_out_of_order_score_by_furthest() {
    // The worker only appends, but an upstream log can mention a later
    // marker first; the furthest matched milestone wins.
    let estimator = ProgressEstimator::default();
    let view = estimator.estimate(&deployment(
        DeploymentStatus::Running,
        "✓ Build successful\n=== Cloning Repository ===",
    ));
    assert_eq!(view.percent, 50);
    assert_eq!(view.current_step, "Stopping old container");
}

#[test]
fn test_custom_milestone_table_weighting() {
    let estimator = ProgressEstimator::new(MilestoneTable::new(vec![
        Milestone::new(&["unpacked"], "Unpacking"),
        Milestone::new(&["verified"], "Verifying"),
        Milestone::new(&["installed"], "Installing"),
    ]));

    let view = estimator.estimate(&deployment(DeploymentStatus::Running, "unpacked\nverified"));
    assert_eq!(view.percent, 66);
    assert_eq!(view.current_step, "Installing");
}
