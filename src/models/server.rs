use serde::{Deserialize, Serialize};

/// What a server is attached to. Servers attached directly to a deploy
/// plan form a static pool ("cabinet"); servers on a build plan are agents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ServerTarget {
    Environment(String),
    BuildPlan(String),
    DeployPlan(String),
}

impl ServerTarget {
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Environment(_) => "environment",
            Self::BuildPlan(_) => "build_plan",
            Self::DeployPlan(_) => "deploy_plan",
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Environment(id) | Self::BuildPlan(id) | Self::DeployPlan(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: &str) -> Option<Self> {
        match kind {
            "environment" => Some(Self::Environment(id.to_string())),
            "build_plan" => Some(Self::BuildPlan(id.to_string())),
            "deploy_plan" => Some(Self::DeployPlan(id.to_string())),
            _ => None,
        }
    }

    pub fn is_environment(&self) -> bool {
        matches!(self, Self::Environment(_))
    }

    pub fn is_build_plan(&self) -> bool {
        matches!(self, Self::BuildPlan(_))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: String,
    pub name: String,
    pub host: String,
    pub target: ServerTarget,
    pub created_at: String,
}
