//! Persistence layer

pub mod memory;
pub mod store;
