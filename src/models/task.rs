use serde::{Deserialize, Serialize};

use super::plan::PlanRef;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Draft,
    Queued,
    Running,
    Completed,
    Failed,
    Aborting,
    Aborted,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborting => "aborting",
            Self::Aborted => "aborted",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(Self::Draft),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "aborting" => Some(Self::Aborting),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, Self::Draft)
    }

    pub fn is_aborting(&self) -> bool {
        matches!(self, Self::Aborting)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Aborted)
    }
}

/// One execution attempt of a build or deploy plan.
///
/// `started_at` is set only once execution has actually begun; tasks with
/// a NULL `started_at` never appear in the latest-task listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub target: PlanRef,
    pub user: Option<String>,
    pub branch: String,
    pub commit: Option<String>,
    pub reason: Option<String>,
    pub payload: Option<String>,
    pub status: TaskStatus,
    pub created_at: String,
    pub updated_at: String,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl Task {
    /// First seven characters of the commit hash, for display.
    pub fn short_commit(&self) -> Option<&str> {
        self.commit
            .as_deref()
            .map(|c| &c[..std::cmp::min(7, c.len())])
    }
}
