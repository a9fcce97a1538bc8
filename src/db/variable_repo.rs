use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::{PlanRef, Variable};

/// Insert or update a variable on a plan.
pub fn set_variable(
    conn: &Connection,
    id: &str,
    target: &PlanRef,
    name: &str,
    value: &str,
) -> Result<Variable, ShipwayError> {
    conn.execute(
        "INSERT INTO variables (id, targetable_type, targetable_id, name, value)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (targetable_type, targetable_id, name)
         DO UPDATE SET value = excluded.value",
        params![id, target.kind().as_str(), target.id(), name, value],
    )?;
    get_variable(conn, target, name)
}

pub fn get_variable(
    conn: &Connection,
    target: &PlanRef,
    name: &str,
) -> Result<Variable, ShipwayError> {
    conn.query_row(
        "SELECT id, targetable_type, targetable_id, name, value FROM variables
         WHERE targetable_type = ?1 AND targetable_id = ?2 AND name = ?3",
        params![target.kind().as_str(), target.id(), name],
        row_to_variable,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::variable_not_found(name),
        _ => ShipwayError::from(e),
    })
}

pub fn list_variables(conn: &Connection, target: &PlanRef) -> Result<Vec<Variable>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, targetable_type, targetable_id, name, value FROM variables
         WHERE targetable_type = ?1 AND targetable_id = ?2 ORDER BY name ASC",
    )?;
    let variables = stmt
        .query_map(params![target.kind().as_str(), target.id()], row_to_variable)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(variables)
}

pub fn unset_variable(conn: &Connection, target: &PlanRef, name: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute(
        "DELETE FROM variables WHERE targetable_type = ?1 AND targetable_id = ?2 AND name = ?3",
        params![target.kind().as_str(), target.id(), name],
    )?;
    if changed == 0 {
        return Err(ShipwayError::variable_not_found(name));
    }
    Ok(())
}

fn row_to_variable(row: &rusqlite::Row) -> rusqlite::Result<Variable> {
    let kind: String = row.get(1)?;
    let target_id: String = row.get(2)?;
    Ok(Variable {
        id: row.get(0)?,
        target: PlanRef::from_parts(&kind, &target_id)
            .unwrap_or(PlanRef::Deploy(target_id)),
        name: row.get(3)?,
        value: row.get(4)?,
    })
}
