//! DevFlow Deployment Engine
//!
//! Core library for the DevFlow platform's deployment lifecycle:
//! orchestration, log classification, progress inference and live
//! log streaming.

pub mod deploy;
pub mod engine;
pub mod errors;
pub mod logs;
pub mod models;
pub mod options;
pub mod queue;
pub mod storage;
pub mod workers;
