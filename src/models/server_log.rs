use serde::{Deserialize, Serialize};

/// Per-server step status. Persisted and surfaced as the integer code.
///
/// COMPLETED is the zero value, so new logs must be written as PENDING
/// explicitly rather than relying on a column default of 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Completed,
    Pending,
    Running,
    Failed,
    Cancelled,
}

impl LogStatus {
    pub fn code(&self) -> i64 {
        match self {
            Self::Completed => 0,
            Self::Pending => 1,
            Self::Running => 2,
            Self::Failed => 3,
            Self::Cancelled => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Completed),
            1 => Some(Self::Pending),
            2 => Some(Self::Running),
            3 => Some(Self::Failed),
            4 => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

}

/// One materialized step of a task, created when execution begins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStep {
    pub id: String,
    pub task_id: String,
    pub step: i64,
}

/// The execution record of one step on one server within one task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerLog {
    pub id: String,
    pub task_step_id: String,
    pub server_id: String,
    pub environment_id: Option<String>,
    pub status: LogStatus,
    pub output: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
    pub created_at: String,
}

impl ServerLog {
    /// How long the commands ran on the server, in whole seconds.
    /// None until the log has finished.
    pub fn runtime(&self) -> Option<i64> {
        let finished = parse_datetime(self.finished_at.as_deref()?)?;
        let started = parse_datetime(self.started_at.as_deref()?)?;
        Some((finished - started).num_seconds())
    }
}

fn parse_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(started_at: Option<&str>, finished_at: Option<&str>) -> ServerLog {
        ServerLog {
            id: "log".into(),
            task_step_id: "step".into(),
            server_id: "srv".into(),
            environment_id: None,
            status: LogStatus::Pending,
            output: None,
            started_at: started_at.map(String::from),
            finished_at: finished_at.map(String::from),
            created_at: "2024-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn test_runtime_unfinished() {
        assert_eq!(log(Some("2024-01-01 10:00:00"), None).runtime(), None);
        assert_eq!(log(None, None).runtime(), None);
    }

    #[test]
    fn test_runtime_seconds() {
        let l = log(Some("2024-01-01 10:00:00"), Some("2024-01-01 10:01:30"));
        assert_eq!(l.runtime(), Some(90));
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(LogStatus::Completed.code(), 0);
        assert_eq!(LogStatus::Pending.code(), 1);
        assert_eq!(LogStatus::Running.code(), 2);
        assert_eq!(LogStatus::Failed.code(), 3);
        assert_eq!(LogStatus::Cancelled.code(), 4);
        assert_eq!(LogStatus::from_code(4), Some(LogStatus::Cancelled));
        assert_eq!(LogStatus::from_code(5), None);
    }
}
