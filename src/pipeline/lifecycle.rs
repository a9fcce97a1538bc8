use crate::error::ShipwayError;
use crate::models::{Task, TaskStatus};

/// The task state machine:
/// draft → queued → running → completed | failed, with an aborting →
/// aborted path reachable from queued or running.
///
/// Abort idempotence (no-op on a task that is already aborting or
/// terminal) is handled by the caller; this table only answers which
/// transitions are legal.
pub fn validate_transition(current: &TaskStatus, action: &str) -> Result<TaskStatus, ShipwayError> {
    match (current, action) {
        (TaskStatus::Draft, "deploy") => Ok(TaskStatus::Queued),
        (TaskStatus::Queued, "begin") => Ok(TaskStatus::Running),
        (TaskStatus::Running, "complete") => Ok(TaskStatus::Completed),
        (TaskStatus::Running, "fail") => Ok(TaskStatus::Failed),
        (TaskStatus::Queued | TaskStatus::Running, "abort") => Ok(TaskStatus::Aborting),
        (TaskStatus::Aborting, "aborted") => Ok(TaskStatus::Aborted),
        _ => Err(ShipwayError::invalid_transition(current.as_str(), action)),
    }
}

/// The reason string recorded on a rollback task. References the
/// original task's id and short commit; the original is never modified.
pub fn rollback_reason(previous: &Task, extra: Option<&str>) -> String {
    let commit = previous.short_commit().unwrap_or(&previous.branch);
    let mut reason = format!("Rollback to task {} ({})", previous.id, commit);
    if let Some(extra) = extra {
        if !extra.is_empty() {
            reason.push_str(": ");
            reason.push_str(extra);
        }
    }
    reason
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlanRef;

    fn task(status: TaskStatus, commit: Option<&str>) -> Task {
        Task {
            id: "01ARZ3NDEKTSV4RRFFQ69G5FAV".into(),
            project_id: "p".into(),
            target: PlanRef::Deploy("d".into()),
            user: None,
            branch: "main".into(),
            commit: commit.map(String::from),
            reason: None,
            payload: None,
            status,
            created_at: "2024-01-01 00:00:00".into(),
            updated_at: "2024-01-01 00:00:00".into(),
            started_at: None,
            finished_at: None,
        }
    }

    #[test]
    fn test_happy_path() {
        assert_eq!(
            validate_transition(&TaskStatus::Draft, "deploy").unwrap(),
            TaskStatus::Queued
        );
        assert_eq!(
            validate_transition(&TaskStatus::Queued, "begin").unwrap(),
            TaskStatus::Running
        );
        assert_eq!(
            validate_transition(&TaskStatus::Running, "complete").unwrap(),
            TaskStatus::Completed
        );
        assert_eq!(
            validate_transition(&TaskStatus::Running, "fail").unwrap(),
            TaskStatus::Failed
        );
    }

    #[test]
    fn test_abort_path() {
        assert_eq!(
            validate_transition(&TaskStatus::Queued, "abort").unwrap(),
            TaskStatus::Aborting
        );
        assert_eq!(
            validate_transition(&TaskStatus::Running, "abort").unwrap(),
            TaskStatus::Aborting
        );
        assert_eq!(
            validate_transition(&TaskStatus::Aborting, "aborted").unwrap(),
            TaskStatus::Aborted
        );
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(validate_transition(&TaskStatus::Draft, "begin").is_err());
        assert!(validate_transition(&TaskStatus::Draft, "abort").is_err());
        assert!(validate_transition(&TaskStatus::Queued, "complete").is_err());
        assert!(validate_transition(&TaskStatus::Completed, "begin").is_err());
        assert!(validate_transition(&TaskStatus::Aborted, "aborted").is_err());
    }

    #[test]
    fn test_rollback_reason_references_original() {
        let previous = task(TaskStatus::Completed, Some("abc123def456"));
        let reason = rollback_reason(&previous, Some("bad release"));
        assert!(reason.contains("01ARZ3NDEKTSV4RRFFQ69G5FAV"));
        assert!(reason.contains("abc123d"));
        assert!(reason.contains("bad release"));
    }

    #[test]
    fn test_rollback_reason_without_commit_uses_branch() {
        let previous = task(TaskStatus::Completed, None);
        let reason = rollback_reason(&previous, None);
        assert!(reason.contains("main"));
    }
}
