//! Engine configuration options

use crate::deploy::progress::MilestoneTable;
use crate::logs::LogOptions;

/// Main engine options
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Milestone table used by the progress estimator
    pub milestones: MilestoneTable,

    /// Capacity of the live log broadcast channel
    pub event_capacity: usize,

    /// Logging configuration (for binaries embedding the engine)
    pub log: LogOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            milestones: MilestoneTable::default(),
            event_capacity: 256,
            log: LogOptions::default(),
        }
    }
}
