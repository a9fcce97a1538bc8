use serde::{Deserialize, Serialize};

/// A named release cut from a completed build task. Always hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub project_id: String,
    pub task_id: String,
    pub name: String,
    pub created_at: String,
}
