use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::Release;

pub fn create_release(
    conn: &Connection,
    id: &str,
    project_id: &str,
    task_id: &str,
    name: &str,
) -> Result<Release, ShipwayError> {
    conn.execute(
        "INSERT INTO releases (id, project_id, task_id, name) VALUES (?1, ?2, ?3, ?4)",
        params![id, project_id, task_id, name],
    )?;
    get_release_by_id(conn, id)
}

pub fn get_release_by_id(conn: &Connection, id: &str) -> Result<Release, ShipwayError> {
    conn.query_row(
        "SELECT id, project_id, task_id, name, created_at FROM releases WHERE id = ?1",
        params![id],
        row_to_release,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::release_not_found(id),
        _ => ShipwayError::from(e),
    })
}

/// Resolve a release by ID prefix.
pub fn resolve_release(conn: &Connection, reference: &str) -> Result<Release, ShipwayError> {
    if let Ok(release) = get_release_by_id(conn, reference) {
        return Ok(release);
    }

    let mut stmt = conn.prepare(
        "SELECT id, project_id, task_id, name, created_at FROM releases WHERE id LIKE ?1",
    )?;
    let prefix = format!("{reference}%");
    let releases: Vec<Release> = stmt
        .query_map(params![prefix], row_to_release)?
        .collect::<Result<Vec<_>, _>>()?;

    match releases.len() {
        0 => Err(ShipwayError::release_not_found(reference)),
        1 => Ok(releases.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = releases
                .iter()
                .map(|r| format!("{} ({})", r.name, r.id))
                .collect();
            Err(ShipwayError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_releases(conn: &Connection, project_id: &str) -> Result<Vec<Release>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, project_id, task_id, name, created_at FROM releases
         WHERE project_id = ?1 ORDER BY created_at DESC",
    )?;
    let releases = stmt
        .query_map(params![project_id], row_to_release)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(releases)
}

/// The next release number for a project: one past the count so far.
pub fn next_release_number(conn: &Connection, project_id: &str) -> Result<i64, ShipwayError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM releases WHERE project_id = ?1",
        params![project_id],
        |row| row.get(0),
    )?;
    Ok(count + 1)
}

/// Releases are never tombstoned; removal is always a purge.
pub fn purge_release(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute("DELETE FROM releases WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ShipwayError::release_not_found(id));
    }
    Ok(())
}

fn row_to_release(row: &rusqlite::Row) -> rusqlite::Result<Release> {
    Ok(Release {
        id: row.get(0)?,
        project_id: row.get(1)?,
        task_id: row.get(2)?,
        name: row.get(3)?,
        created_at: row.get(4)?,
    })
}
