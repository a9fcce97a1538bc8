use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::Pattern;

pub fn create_pattern(
    conn: &Connection,
    id: &str,
    build_plan_id: &str,
    name: &str,
    copy_pattern: &str,
) -> Result<Pattern, ShipwayError> {
    if find_pattern_by_name(conn, build_plan_id, name)?.is_some() {
        return Err(ShipwayError::name_conflict("Pattern", name));
    }
    conn.execute(
        "INSERT INTO patterns (id, build_plan_id, name, copy_pattern) VALUES (?1, ?2, ?3, ?4)",
        params![id, build_plan_id, name, copy_pattern],
    )?;
    get_pattern_by_id(conn, id)
}

pub fn get_pattern_by_id(conn: &Connection, id: &str) -> Result<Pattern, ShipwayError> {
    conn.query_row(
        "SELECT id, build_plan_id, name, copy_pattern FROM patterns WHERE id = ?1",
        params![id],
        row_to_pattern,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::pattern_not_found(id),
        _ => ShipwayError::from(e),
    })
}

pub fn find_pattern_by_name(
    conn: &Connection,
    build_plan_id: &str,
    name: &str,
) -> Result<Option<Pattern>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, build_plan_id, name, copy_pattern FROM patterns
         WHERE build_plan_id = ?1 AND name = ?2",
    )?;
    let mut rows = stmt.query(params![build_plan_id, name])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_pattern(row)?)),
        None => Ok(None),
    }
}

pub fn list_patterns(conn: &Connection, build_plan_id: &str) -> Result<Vec<Pattern>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, build_plan_id, name, copy_pattern FROM patterns
         WHERE build_plan_id = ?1 ORDER BY name ASC",
    )?;
    let patterns = stmt
        .query_map(params![build_plan_id], row_to_pattern)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(patterns)
}

/// Patterns are never tombstoned; removal is always a purge.
pub fn purge_pattern(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute("DELETE FROM patterns WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ShipwayError::pattern_not_found(id));
    }
    Ok(())
}

fn row_to_pattern(row: &rusqlite::Row) -> rusqlite::Result<Pattern> {
    Ok(Pattern {
        id: row.get(0)?,
        build_plan_id: row.get(1)?,
        name: row.get(2)?,
        copy_pattern: row.get(3)?,
    })
}
