use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::{Server, ServerTarget};

pub fn create_server(
    conn: &Connection,
    id: &str,
    name: &str,
    host: &str,
    target: &ServerTarget,
) -> Result<Server, ShipwayError> {
    conn.execute(
        "INSERT INTO servers (id, name, host, targetable_type, targetable_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, host, target.kind_str(), target.id()],
    )?;
    get_server_by_id(conn, id)
}

pub fn get_server_by_id(conn: &Connection, id: &str) -> Result<Server, ShipwayError> {
    conn.query_row(
        "SELECT id, name, host, targetable_type, targetable_id, created_at
         FROM servers WHERE id = ?1",
        params![id],
        row_to_server,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::server_not_found(id),
        _ => ShipwayError::from(e),
    })
}

pub fn list_servers_by_target(
    conn: &Connection,
    target: &ServerTarget,
) -> Result<Vec<Server>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, host, targetable_type, targetable_id, created_at
         FROM servers WHERE targetable_type = ?1 AND targetable_id = ?2
         ORDER BY name ASC",
    )?;
    let servers = stmt
        .query_map(params![target.kind_str(), target.id()], row_to_server)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(servers)
}

pub fn delete_server(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute("DELETE FROM servers WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ShipwayError::server_not_found(id));
    }
    Ok(())
}

fn row_to_server(row: &rusqlite::Row) -> rusqlite::Result<Server> {
    let kind: String = row.get(3)?;
    let target_id: String = row.get(4)?;
    Ok(Server {
        id: row.get(0)?,
        name: row.get(1)?,
        host: row.get(2)?,
        target: ServerTarget::from_parts(&kind, &target_id)
            .unwrap_or(ServerTarget::DeployPlan(target_id)),
        created_at: row.get(5)?,
    })
}
