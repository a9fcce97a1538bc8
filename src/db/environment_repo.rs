use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::Environment;

pub fn create_environment(
    conn: &Connection,
    id: &str,
    deploy_plan_id: &str,
    name: &str,
) -> Result<Environment, ShipwayError> {
    if find_environment_by_name(conn, deploy_plan_id, name)?.is_some() {
        return Err(ShipwayError::name_conflict("Environment", name));
    }
    conn.execute(
        "INSERT INTO environments (id, deploy_plan_id, name) VALUES (?1, ?2, ?3)",
        params![id, deploy_plan_id, name],
    )?;
    get_environment_by_id(conn, id)
}

pub fn get_environment_by_id(conn: &Connection, id: &str) -> Result<Environment, ShipwayError> {
    conn.query_row(
        "SELECT id, deploy_plan_id, name, created_at FROM environments WHERE id = ?1",
        params![id],
        row_to_environment,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::environment_not_found(id),
        _ => ShipwayError::from(e),
    })
}

pub fn find_environment_by_name(
    conn: &Connection,
    deploy_plan_id: &str,
    name: &str,
) -> Result<Option<Environment>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, deploy_plan_id, name, created_at FROM environments
         WHERE deploy_plan_id = ?1 AND name = ?2",
    )?;
    let mut rows = stmt.query(params![deploy_plan_id, name])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_environment(row)?)),
        None => Ok(None),
    }
}

pub fn list_environments(
    conn: &Connection,
    deploy_plan_id: &str,
) -> Result<Vec<Environment>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, deploy_plan_id, name, created_at FROM environments
         WHERE deploy_plan_id = ?1 ORDER BY name ASC",
    )?;
    let environments = stmt
        .query_map(params![deploy_plan_id], row_to_environment)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(environments)
}

pub fn delete_environment(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute("DELETE FROM environments WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ShipwayError::environment_not_found(id));
    }
    Ok(())
}

fn row_to_environment(row: &rusqlite::Row) -> rusqlite::Result<Environment> {
    Ok(Environment {
        id: row.get(0)?,
        deploy_plan_id: row.get(1)?,
        name: row.get(2)?,
        created_at: row.get(3)?,
    })
}
