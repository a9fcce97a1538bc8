use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Build,
    Deploy,
}

impl PlanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Deploy => "deploy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "build" => Some(Self::Build),
            "deploy" => Some(Self::Deploy),
            _ => None,
        }
    }
}

/// Tagged reference to the plan an entity is scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum PlanRef {
    Build(String),
    Deploy(String),
}

impl PlanRef {
    pub fn kind(&self) -> PlanKind {
        match self {
            Self::Build(_) => PlanKind::Build,
            Self::Deploy(_) => PlanKind::Deploy,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Build(id) | Self::Deploy(id) => id,
        }
    }

    pub fn from_parts(kind: &str, id: &str) -> Option<Self> {
        match PlanKind::from_str(kind)? {
            PlanKind::Build => Some(Self::Build(id.to_string())),
            PlanKind::Deploy => Some(Self::Deploy(id.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildPlan {
    pub id: String,
    pub project_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployPlan {
    pub id: String,
    pub project_id: String,
    pub name: String,
}
