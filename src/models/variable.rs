use serde::{Deserialize, Serialize};

use super::plan::PlanRef;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    pub id: String,
    pub target: PlanRef,
    pub name: String,
    pub value: String,
}
