use serde::{Deserialize, Serialize};

/// A file-copy pattern of a build plan. Always hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pattern {
    pub id: String,
    pub build_plan_id: String,
    pub name: String,
    pub copy_pattern: String,
}
