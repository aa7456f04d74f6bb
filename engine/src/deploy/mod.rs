//! Deployment core

pub mod classifier;
pub mod live_log;
pub mod orchestrator;
pub mod progress;
pub mod runner;
pub mod state;
