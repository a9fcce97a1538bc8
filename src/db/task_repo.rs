use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::{Environment, PlanRef, Task, TaskStatus};

const TASK_COLUMNS: &str = "id, project_id, targetable_type, targetable_id, user, branch,
                commit_hash, reason, payload, status, created_at, updated_at,
                started_at, finished_at";

#[allow(clippy::too_many_arguments)]
pub fn create_task(
    conn: &Connection,
    id: &str,
    project_id: &str,
    target: &PlanRef,
    user: Option<&str>,
    branch: &str,
    commit: Option<&str>,
    reason: Option<&str>,
    payload: Option<&str>,
    status: &TaskStatus,
) -> Result<Task, ShipwayError> {
    conn.execute(
        "INSERT INTO tasks (id, project_id, targetable_type, targetable_id, user,
                            branch, commit_hash, reason, payload, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            project_id,
            target.kind().as_str(),
            target.id(),
            user,
            branch,
            commit,
            reason,
            payload,
            status.as_str()
        ],
    )?;
    get_task_by_id(conn, id)
}

pub fn get_task_by_id(conn: &Connection, id: &str) -> Result<Task, ShipwayError> {
    conn.query_row(
        &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
        params![id],
        row_to_task,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::task_not_found(id),
        _ => ShipwayError::from(e),
    })
}

/// Resolve a task by ID prefix.
pub fn resolve_task(conn: &Connection, reference: &str) -> Result<Task, ShipwayError> {
    if let Ok(task) = get_task_by_id(conn, reference) {
        return Ok(task);
    }

    let mut stmt =
        conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id LIKE ?1"))?;
    let prefix = format!("{reference}%");
    let tasks: Vec<Task> = stmt
        .query_map(params![prefix], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;

    match tasks.len() {
        0 => Err(ShipwayError::task_not_found(reference)),
        1 => Ok(tasks.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = tasks.iter().map(|t| t.id.clone()).collect();
            Err(ShipwayError::ambiguous_ref(reference, &candidates))
        }
    }
}

/// The latest tasks of a plan. Tasks that never started (drafts, queued
/// work not yet picked up) are excluded.
pub fn latest_tasks(
    conn: &Connection,
    target: &PlanRef,
    limit: i64,
) -> Result<Vec<Task>, ShipwayError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE targetable_type = ?1 AND targetable_id = ?2
           AND started_at IS NOT NULL
         ORDER BY started_at DESC
         LIMIT ?3"
    ))?;
    let tasks = stmt
        .query_map(params![target.kind().as_str(), target.id(), limit], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// Every task of a plan, newest first, drafts included.
pub fn list_all_tasks(conn: &Connection, target: &PlanRef) -> Result<Vec<Task>, ShipwayError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE targetable_type = ?1 AND targetable_id = ?2
         ORDER BY created_at DESC"
    ))?;
    let tasks = stmt
        .query_map(params![target.kind().as_str(), target.id()], row_to_task)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

/// Write a task status. Entering Running stamps started_at; entering a
/// terminal state stamps finished_at.
pub fn update_task_status(
    conn: &Connection,
    id: &str,
    status: &TaskStatus,
) -> Result<(), ShipwayError> {
    let (started_clause, finished_clause) = match status {
        TaskStatus::Running => ("started_at = datetime('now'),", ""),
        s if s.is_terminal() => ("", "finished_at = datetime('now'),"),
        _ => ("", ""),
    };

    let sql = format!(
        "UPDATE tasks SET status = ?1, {started_clause} {finished_clause}
         updated_at = datetime('now')
         WHERE id = ?2"
    );
    conn.execute(&sql, params![status.as_str(), id])?;
    Ok(())
}

pub fn add_task_environment(
    conn: &Connection,
    task_id: &str,
    environment_id: &str,
) -> Result<(), ShipwayError> {
    conn.execute(
        "INSERT OR IGNORE INTO task_environments (task_id, environment_id) VALUES (?1, ?2)",
        params![task_id, environment_id],
    )?;
    Ok(())
}

pub fn add_task_optional_command(
    conn: &Connection,
    task_id: &str,
    command_id: &str,
) -> Result<(), ShipwayError> {
    conn.execute(
        "INSERT OR IGNORE INTO task_optional_commands (task_id, command_id) VALUES (?1, ?2)",
        params![task_id, command_id],
    )?;
    Ok(())
}

/// The environments a task was created for, ordered by name.
pub fn task_environments(conn: &Connection, task_id: &str) -> Result<Vec<Environment>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.deploy_plan_id, e.name, e.created_at
         FROM environments e
         JOIN task_environments te ON te.environment_id = e.id
         WHERE te.task_id = ?1
         ORDER BY e.name ASC",
    )?;
    let environments = stmt
        .query_map(params![task_id], |row| {
            Ok(Environment {
                id: row.get(0)?,
                deploy_plan_id: row.get(1)?,
                name: row.get(2)?,
                created_at: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(environments)
}

/// The optional command ids selected at task creation.
pub fn task_optional_command_ids(
    conn: &Connection,
    task_id: &str,
) -> Result<Vec<String>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT command_id FROM task_optional_commands WHERE task_id = ?1",
    )?;
    let ids = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(ids)
}

/// Record a hand-off to the external executor. The outbox row is the
/// observable dispatch; the worker drains it out of band.
pub fn enqueue_job(conn: &Connection, task_id: &str, job: &str) -> Result<(), ShipwayError> {
    conn.execute(
        "INSERT INTO job_outbox (task_id, job) VALUES (?1, ?2)",
        params![task_id, job],
    )?;
    Ok(())
}

/// The jobs enqueued for a task, in dispatch order.
pub fn outbox_jobs(conn: &Connection, task_id: &str) -> Result<Vec<String>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT job FROM job_outbox WHERE task_id = ?1 ORDER BY id ASC",
    )?;
    let jobs = stmt
        .query_map(params![task_id], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(jobs)
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let kind: String = row.get(2)?;
    let target_id: String = row.get(3)?;
    Ok(Task {
        id: row.get(0)?,
        project_id: row.get(1)?,
        target: PlanRef::from_parts(&kind, &target_id)
            .unwrap_or(PlanRef::Deploy(target_id)),
        user: row.get(4)?,
        branch: row.get(5)?,
        commit: row.get(6)?,
        reason: row.get(7)?,
        payload: row.get(8)?,
        status: TaskStatus::from_str(&row.get::<_, String>(9)?).unwrap_or(TaskStatus::Draft),
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        started_at: row.get(12)?,
        finished_at: row.get(13)?,
    })
}
