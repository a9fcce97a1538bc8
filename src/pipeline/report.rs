use std::collections::HashSet;

use serde::Serialize;

use crate::models::{LogStatus, ServerLog, TaskStep};

use super::stage;

/// One server log joined with the names the report needs.
#[derive(Debug, Clone)]
pub struct LogRow {
    pub log: ServerLog,
    pub server_name: String,
    pub server_on_environment: bool,
    pub server_on_build_plan: bool,
    pub environment_name: Option<String>,
}

/// A rendered report line for one server log.
#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub log_id: String,
    pub step: i64,
    pub step_label: String,
    pub server_name: String,
    pub status: i64,
    pub status_name: &'static str,
    /// True when the log ran on a server from the plan's static pool
    /// rather than one owned by the deploy environment.
    pub cabinet: bool,
    /// Resolved display name, suppressed on repeats within the same step.
    pub environment_name: Option<String>,
    pub runtime: Option<i64>,
    pub has_output: bool,
}

/// Produce the ordered rendering of a task's per-server step logs.
///
/// Iteration order is step order as persisted, then log insertion order
/// within a step. The per-(step, environment) name dedup is scoped to
/// this single pass; it is never persisted.
pub fn aggregate(steps: &[(TaskStep, Vec<LogRow>)]) -> Vec<ReportEntry> {
    let mut env_locks: HashSet<(String, String)> = HashSet::new();
    let mut entries = Vec::new();

    for (step, rows) in steps {
        for row in rows {
            let mut cabinet = false;
            let mut environment_name = None;

            if let Some(env_id) = &row.log.environment_id {
                if !row.server_on_environment {
                    cabinet = true;
                }
                if env_locks.insert((step.id.clone(), env_id.clone())) {
                    environment_name = row.environment_name.clone();
                }
            } else if row.server_on_build_plan {
                environment_name = Some("agent".to_string());
            }

            entries.push(ReportEntry {
                log_id: row.log.id.clone(),
                step: step.step,
                step_label: stage::step_label(step.step),
                server_name: row.server_name.clone(),
                status: row.log.status.code(),
                status_name: row.log.status.as_str(),
                cabinet,
                environment_name,
                runtime: row.log.runtime(),
                has_output: row.log.output.as_deref().is_some_and(|o| !o.is_empty()),
            });
        }
    }

    entries
}

/// Fold per-server log statuses into a single displayable task progress:
/// counts per status over every log of the task.
#[derive(Debug, Default, Clone, Serialize)]
pub struct LogProgress {
    pub total: i64,
    pub completed: i64,
    pub pending: i64,
    pub running: i64,
    pub failed: i64,
    pub cancelled: i64,
}

pub fn progress(steps: &[(TaskStep, Vec<LogRow>)]) -> LogProgress {
    let mut p = LogProgress::default();
    for (_, rows) in steps {
        for row in rows {
            p.total += 1;
            match row.log.status {
                LogStatus::Completed => p.completed += 1,
                LogStatus::Pending => p.pending += 1,
                LogStatus::Running => p.running += 1,
                LogStatus::Failed => p.failed += 1,
                LogStatus::Cancelled => p.cancelled += 1,
            }
        }
    }
    p
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(id: &str, code: i64) -> TaskStep {
        TaskStep {
            id: id.into(),
            task_id: "task".into(),
            step: code,
        }
    }

    fn row(
        log_id: &str,
        env: Option<(&str, &str)>,
        on_environment: bool,
        on_build_plan: bool,
    ) -> LogRow {
        LogRow {
            log: ServerLog {
                id: log_id.into(),
                task_step_id: "step".into(),
                server_id: "srv".into(),
                environment_id: env.map(|(id, _)| id.to_string()),
                status: LogStatus::Pending,
                output: None,
                started_at: None,
                finished_at: None,
                created_at: "2024-01-01 00:00:00".into(),
            },
            server_name: "web-1".into(),
            server_on_environment: on_environment,
            server_on_build_plan: on_build_plan,
            environment_name: env.map(|(_, name)| name.to_string()),
        }
    }

    #[test]
    fn test_environment_name_deduped_within_step() {
        let steps = vec![(
            step("s1", 2),
            vec![
                row("l1", Some(("e1", "production")), true, false),
                row("l2", Some(("e1", "production")), true, false),
            ],
        )];
        let entries = aggregate(&steps);
        assert_eq!(entries[0].environment_name.as_deref(), Some("production"));
        assert_eq!(entries[1].environment_name, None);
    }

    #[test]
    fn test_environment_name_re_emitted_per_step() {
        let steps = vec![
            (
                step("s1", 2),
                vec![row("l1", Some(("e1", "production")), true, false)],
            ),
            (
                step("s2", 5),
                vec![row("l2", Some(("e1", "production")), true, false)],
            ),
        ];
        let entries = aggregate(&steps);
        assert_eq!(entries[0].environment_name.as_deref(), Some("production"));
        assert_eq!(entries[1].environment_name.as_deref(), Some("production"));
    }

    #[test]
    fn test_cabinet_flag() {
        let steps = vec![(
            step("s1", 2),
            vec![
                row("l1", Some(("e1", "production")), true, false),
                row("l2", Some(("e1", "production")), false, false),
            ],
        )];
        let entries = aggregate(&steps);
        assert!(!entries[0].cabinet);
        assert!(entries[1].cabinet);
    }

    #[test]
    fn test_build_agent_label() {
        let steps = vec![(step("s1", 32), vec![row("l1", None, false, true)])];
        let entries = aggregate(&steps);
        assert!(!entries[0].cabinet);
        assert_eq!(entries[0].environment_name.as_deref(), Some("agent"));
    }

    #[test]
    fn test_progress_counts() {
        let mut failed = row("l2", None, false, true);
        failed.log.status = LogStatus::Failed;
        let steps = vec![(step("s1", 32), vec![row("l1", None, false, true), failed])];
        let p = progress(&steps);
        assert_eq!(p.total, 2);
        assert_eq!(p.pending, 1);
        assert_eq!(p.failed, 1);
    }
}
