use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::{Command, Environment, Pattern, PlanRef};

const COMMAND_COLUMNS: &str = "id, name, user, script, targetable_type, targetable_id,
                step, sort_order, optional, default_on, created_at, updated_at, deleted_at";

/// Create a command at the end of its (plan, step) group: the new
/// sort_order is one past the highest live sibling, or 0 in an empty group.
#[allow(clippy::too_many_arguments)]
pub fn create_command(
    conn: &Connection,
    id: &str,
    target: &PlanRef,
    name: &str,
    user: Option<&str>,
    script: &str,
    step: i64,
    optional: bool,
    default_on: bool,
) -> Result<Command, ShipwayError> {
    let sort_order: i64 = conn.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM commands
         WHERE targetable_type = ?1 AND targetable_id = ?2 AND step = ?3
           AND deleted_at IS NULL",
        params![target.kind().as_str(), target.id(), step],
        |row| row.get(0),
    )?;

    conn.execute(
        "INSERT INTO commands (id, name, user, script, targetable_type, targetable_id,
                               step, sort_order, optional, default_on)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            id,
            name,
            user,
            script,
            target.kind().as_str(),
            target.id(),
            step,
            sort_order,
            optional,
            default_on
        ],
    )?;
    get_command_by_id(conn, id)
}

/// Fetch a live (non-retired) command.
pub fn get_command_by_id(conn: &Connection, id: &str) -> Result<Command, ShipwayError> {
    conn.query_row(
        &format!("SELECT {COMMAND_COLUMNS} FROM commands WHERE id = ?1 AND deleted_at IS NULL"),
        params![id],
        row_to_command,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::command_not_found(id),
        _ => ShipwayError::from(e),
    })
}

/// Fetch a command including retired ones (for restore).
pub fn get_command_any(conn: &Connection, id: &str) -> Result<Command, ShipwayError> {
    conn.query_row(
        &format!("SELECT {COMMAND_COLUMNS} FROM commands WHERE id = ?1"),
        params![id],
        row_to_command,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::command_not_found(id),
        _ => ShipwayError::from(e),
    })
}

/// Resolve a live command by ID prefix.
pub fn resolve_command(conn: &Connection, reference: &str) -> Result<Command, ShipwayError> {
    if let Ok(command) = get_command_by_id(conn, reference) {
        return Ok(command);
    }

    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMAND_COLUMNS} FROM commands WHERE id LIKE ?1 AND deleted_at IS NULL"
    ))?;
    let prefix = format!("{reference}%");
    let commands: Vec<Command> = stmt
        .query_map(params![prefix], row_to_command)?
        .collect::<Result<Vec<_>, _>>()?;

    match commands.len() {
        0 => Err(ShipwayError::command_not_found(reference)),
        1 => Ok(commands.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = commands
                .iter()
                .map(|c| format!("{} ({})", c.name, c.id))
                .collect();
            Err(ShipwayError::ambiguous_ref(reference, &candidates))
        }
    }
}

/// The before/after commands surrounding a stage's "do" step, ordered by
/// sort_order ascending. The "do" action itself is rendered by the caller.
pub fn list_for_stage(
    conn: &Connection,
    target: &PlanRef,
    codes: [i64; 2],
) -> Result<Vec<Command>, ShipwayError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMAND_COLUMNS} FROM commands
         WHERE targetable_type = ?1 AND targetable_id = ?2
           AND step IN (?3, ?4) AND deleted_at IS NULL
         ORDER BY sort_order ASC, step ASC"
    ))?;
    let commands = stmt
        .query_map(
            params![target.kind().as_str(), target.id(), codes[0], codes[1]],
            row_to_command,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(commands)
}

/// All live commands in one step of a plan, ordered by sort_order.
pub fn list_for_step(
    conn: &Connection,
    target: &PlanRef,
    step: i64,
) -> Result<Vec<Command>, ShipwayError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COMMAND_COLUMNS} FROM commands
         WHERE targetable_type = ?1 AND targetable_id = ?2
           AND step = ?3 AND deleted_at IS NULL
         ORDER BY sort_order ASC"
    ))?;
    let commands = stmt
        .query_map(
            params![target.kind().as_str(), target.id(), step],
            row_to_command,
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(commands)
}

pub fn update_command(
    conn: &Connection,
    id: &str,
    name: &str,
    user: Option<&str>,
    script: &str,
    optional: bool,
    default_on: bool,
) -> Result<(), ShipwayError> {
    let changed = conn.execute(
        "UPDATE commands SET name = ?1, user = ?2, script = ?3, optional = ?4,
                default_on = ?5, updated_at = datetime('now')
         WHERE id = ?6 AND deleted_at IS NULL",
        params![name, user, script, optional, default_on, id],
    )?;
    if changed == 0 {
        return Err(ShipwayError::command_not_found(id));
    }
    Ok(())
}

/// Assign each command the dense 0-based order of its position in the
/// supplied sequence. Must run inside a transaction: an unknown id fails
/// the whole batch so readers never observe a partial renumbering.
pub fn reorder_commands(conn: &Connection, ids: &[String]) -> Result<(), ShipwayError> {
    for (position, id) in ids.iter().enumerate() {
        let changed = conn.execute(
            "UPDATE commands SET sort_order = ?1, updated_at = datetime('now')
             WHERE id = ?2 AND deleted_at IS NULL",
            params![position as i64, id],
        )?;
        if changed == 0 {
            return Err(ShipwayError::command_not_found(id));
        }
    }
    Ok(())
}

/// Tombstone a command. It disappears from listings, stage resolution,
/// and sibling-order computation, but stays recoverable.
pub fn retire_command(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute(
        "UPDATE commands SET deleted_at = datetime('now') WHERE id = ?1 AND deleted_at IS NULL",
        params![id],
    )?;
    if changed == 0 {
        return Err(ShipwayError::command_not_found(id));
    }
    Ok(())
}

pub fn restore_command(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute(
        "UPDATE commands SET deleted_at = NULL WHERE id = ?1 AND deleted_at IS NOT NULL",
        params![id],
    )?;
    if changed == 0 {
        return Err(ShipwayError::command_not_found(id));
    }
    Ok(())
}

/// Unconditional hard delete.
pub fn purge_command(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute("DELETE FROM commands WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ShipwayError::command_not_found(id));
    }
    Ok(())
}

/// Replace a command's environment set.
pub fn sync_environments(
    conn: &Connection,
    command_id: &str,
    environment_ids: &[String],
) -> Result<(), ShipwayError> {
    conn.execute(
        "DELETE FROM command_environments WHERE command_id = ?1",
        params![command_id],
    )?;
    for environment_id in environment_ids {
        conn.execute(
            "INSERT INTO command_environments (command_id, environment_id) VALUES (?1, ?2)",
            params![command_id, environment_id],
        )?;
    }
    Ok(())
}

/// Replace a command's pattern set.
pub fn sync_patterns(
    conn: &Connection,
    command_id: &str,
    pattern_ids: &[String],
) -> Result<(), ShipwayError> {
    conn.execute(
        "DELETE FROM command_patterns WHERE command_id = ?1",
        params![command_id],
    )?;
    for pattern_id in pattern_ids {
        conn.execute(
            "INSERT INTO command_patterns (command_id, pattern_id) VALUES (?1, ?2)",
            params![command_id, pattern_id],
        )?;
    }
    Ok(())
}

pub fn environments_of_command(
    conn: &Connection,
    command_id: &str,
) -> Result<Vec<Environment>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT e.id, e.deploy_plan_id, e.name, e.created_at
         FROM environments e
         JOIN command_environments ce ON ce.environment_id = e.id
         WHERE ce.command_id = ?1
         ORDER BY e.name ASC",
    )?;
    let environments = stmt
        .query_map(params![command_id], |row| {
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

pub fn patterns_of_command(
    conn: &Connection,
    command_id: &str,
) -> Result<Vec<Pattern>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT p.id, p.build_plan_id, p.name, p.copy_pattern
         FROM patterns p
         JOIN command_patterns cp ON cp.pattern_id = p.id
         WHERE cp.command_id = ?1
         ORDER BY p.name ASC",
    )?;
    let patterns = stmt
        .query_map(params![command_id], |row| {
            Ok(Pattern {
                id: row.get(0)?,
                build_plan_id: row.get(1)?,
                name: row.get(2)?,
                copy_pattern: row.get(3)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(patterns)
}

fn row_to_command(row: &rusqlite::Row) -> rusqlite::Result<Command> {
    let kind: String = row.get(4)?;
    let target_id: String = row.get(5)?;
    Ok(Command {
        id: row.get(0)?,
        name: row.get(1)?,
        user: row.get(2)?,
        script: row.get(3)?,
        target: PlanRef::from_parts(&kind, &target_id)
            .unwrap_or(PlanRef::Deploy(target_id)),
        step: row.get(6)?,
        sort_order: row.get(7)?,
        optional: row.get(8)?,
        default_on: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
        deleted_at: row.get(12)?,
    })
}
