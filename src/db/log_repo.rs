use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::{LogStatus, ServerLog, ServerTarget, TaskStep};
use crate::pipeline::report::LogRow;

const LOG_COLUMNS: &str = "id, task_step_id, server_id, environment_id, status, output,
                started_at, finished_at, created_at";

pub fn create_task_step(
    conn: &Connection,
    id: &str,
    task_id: &str,
    step: i64,
) -> Result<TaskStep, ShipwayError> {
    conn.execute(
        "INSERT INTO task_steps (id, task_id, step) VALUES (?1, ?2, ?3)",
        params![id, task_id, step],
    )?;
    Ok(TaskStep {
        id: id.to_string(),
        task_id: task_id.to_string(),
        step,
    })
}

/// Create a server log in PENDING state. The status is written explicitly;
/// the numeric zero is COMPLETED and must never be the initial value.
pub fn create_server_log(
    conn: &Connection,
    id: &str,
    task_step_id: &str,
    server_id: &str,
    environment_id: Option<&str>,
) -> Result<ServerLog, ShipwayError> {
    conn.execute(
        "INSERT INTO server_logs (id, task_step_id, server_id, environment_id, status)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, task_step_id, server_id, environment_id, LogStatus::Pending.code()],
    )?;
    get_log_by_id(conn, id)
}

pub fn get_log_by_id(conn: &Connection, id: &str) -> Result<ServerLog, ShipwayError> {
    conn.query_row(
        &format!("SELECT {LOG_COLUMNS} FROM server_logs WHERE id = ?1"),
        params![id],
        row_to_log,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::log_not_found(id),
        _ => ShipwayError::from(e),
    })
}

/// Resolve a server log by ID prefix.
pub fn resolve_log(conn: &Connection, reference: &str) -> Result<ServerLog, ShipwayError> {
    if let Ok(log) = get_log_by_id(conn, reference) {
        return Ok(log);
    }

    let mut stmt =
        conn.prepare(&format!("SELECT {LOG_COLUMNS} FROM server_logs WHERE id LIKE ?1"))?;
    let prefix = format!("{reference}%");
    let logs: Vec<ServerLog> = stmt
        .query_map(params![prefix], row_to_log)?
        .collect::<Result<Vec<_>, _>>()?;

    match logs.len() {
        0 => Err(ShipwayError::log_not_found(reference)),
        1 => Ok(logs.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = logs.iter().map(|l| l.id.clone()).collect();
            Err(ShipwayError::ambiguous_ref(reference, &candidates))
        }
    }
}

/// The materialized steps of a task, in step-code order.
pub fn steps_of_task(conn: &Connection, task_id: &str) -> Result<Vec<TaskStep>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, task_id, step FROM task_steps WHERE task_id = ?1 ORDER BY step ASC",
    )?;
    let steps = stmt
        .query_map(params![task_id], |row| {
            Ok(TaskStep {
                id: row.get(0)?,
                task_id: row.get(1)?,
                step: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(steps)
}

/// PENDING → RUNNING, stamping started_at.
pub fn start_log(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let log = get_log_by_id(conn, id)?;
    if log.status != LogStatus::Pending {
        return Err(ShipwayError::invalid_transition(log.status.as_str(), "start"));
    }
    conn.execute(
        "UPDATE server_logs SET status = ?1, started_at = datetime('now') WHERE id = ?2",
        params![LogStatus::Running.code(), id],
    )?;
    Ok(())
}

/// RUNNING → COMPLETED or FAILED, stamping finished_at and storing output.
pub fn finish_log(
    conn: &Connection,
    id: &str,
    failed: bool,
    output: Option<&str>,
) -> Result<(), ShipwayError> {
    let log = get_log_by_id(conn, id)?;
    if log.status != LogStatus::Running {
        return Err(ShipwayError::invalid_transition(log.status.as_str(), "finish"));
    }
    let status = if failed {
        LogStatus::Failed
    } else {
        LogStatus::Completed
    };
    conn.execute(
        "UPDATE server_logs SET status = ?1, output = ?2, finished_at = datetime('now')
         WHERE id = ?3",
        params![status.code(), output, id],
    )?;
    Ok(())
}

/// Cancel every log of a task that has not reached a terminal state.
/// Used when an abort is confirmed.
pub fn cancel_open_logs(conn: &Connection, task_id: &str) -> Result<usize, ShipwayError> {
    let changed = conn.execute(
        "UPDATE server_logs SET status = ?1, finished_at = datetime('now')
         WHERE task_step_id IN (SELECT id FROM task_steps WHERE task_id = ?2)
           AND status IN (?3, ?4)",
        params![
            LogStatus::Cancelled.code(),
            task_id,
            LogStatus::Pending.code(),
            LogStatus::Running.code()
        ],
    )?;
    Ok(changed)
}

/// The report input: every step of the task with its logs joined against
/// server and environment names.
pub fn report_rows(
    conn: &Connection,
    task_id: &str,
) -> Result<Vec<(TaskStep, Vec<LogRow>)>, ShipwayError> {
    let steps = steps_of_task(conn, task_id)?;
    let mut stmt = conn.prepare(
        "SELECT l.id, l.task_step_id, l.server_id, l.environment_id, l.status,
                l.output, l.started_at, l.finished_at, l.created_at,
                s.name, s.targetable_type, s.targetable_id, e.name
         FROM server_logs l
         JOIN servers s ON s.id = l.server_id
         LEFT JOIN environments e ON e.id = l.environment_id
         WHERE l.task_step_id = ?1
         ORDER BY l.rowid ASC",
    )?;

    let mut result = Vec::with_capacity(steps.len());
    for step in steps {
        let rows = stmt
            .query_map(params![step.id], |row| {
                let kind: String = row.get(10)?;
                let target_id: String = row.get(11)?;
                let target = ServerTarget::from_parts(&kind, &target_id)
                    .unwrap_or(ServerTarget::DeployPlan(target_id));
                Ok(LogRow {
                    log: row_to_log(row)?,
                    server_name: row.get(9)?,
                    server_on_environment: target.is_environment(),
                    server_on_build_plan: target.is_build_plan(),
                    environment_name: row.get(12)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        result.push((step, rows));
    }
    Ok(result)
}

fn row_to_log(row: &rusqlite::Row) -> rusqlite::Result<ServerLog> {
    Ok(ServerLog {
        id: row.get(0)?,
        task_step_id: row.get(1)?,
        server_id: row.get(2)?,
        environment_id: row.get(3)?,
        status: LogStatus::from_code(row.get(4)?).unwrap_or(LogStatus::Pending),
        output: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        created_at: row.get(8)?,
    })
}
