use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub deploy_plan_id: String,
    pub name: String,
    pub created_at: String,
}
