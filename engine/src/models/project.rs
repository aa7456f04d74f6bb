//! Project model

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A deployable project owned by a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique project ID
    pub id: Uuid,

    /// Human-readable project name
    pub name: String,

    /// Server this project deploys to (deploying without one is rejected)
    pub server_id: Option<Uuid>,

    /// Branch deployed by default
    pub branch: String,

    /// Git repository URL
    pub repository_url: Option<String>,
}

impl Project {
    /// Create a project with a fresh ID
    pub fn new(name: impl Into<String>, server_id: Option<Uuid>, branch: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            server_id,
            branch: branch.into(),
            repository_url: None,
        }
    }
}
