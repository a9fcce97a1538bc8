use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub repository: String,
    pub branch: String,
    pub description: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}
