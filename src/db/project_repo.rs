use rusqlite::{params, Connection};

use crate::error::ShipwayError;
use crate::models::{BuildPlan, DeployPlan, PlanKind, PlanRef, Project};

/// Create a project together with its plan skeleton: every project owns
/// exactly one build plan and one deploy plan.
pub fn create_project(
    conn: &Connection,
    id: &str,
    name: &str,
    repository: &str,
    branch: &str,
    description: Option<&str>,
    build_plan_id: &str,
    deploy_plan_id: &str,
) -> Result<Project, ShipwayError> {
    if find_project_by_name(conn, name)?.is_some() {
        return Err(ShipwayError::name_conflict("Project", name));
    }

    conn.execute(
        "INSERT INTO projects (id, name, repository, branch, description)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, repository, branch, description],
    )?;
    conn.execute(
        "INSERT INTO build_plans (id, project_id, name) VALUES (?1, ?2, ?3)",
        params![build_plan_id, id, format!("{name} build plan")],
    )?;
    conn.execute(
        "INSERT INTO deploy_plans (id, project_id, name) VALUES (?1, ?2, ?3)",
        params![deploy_plan_id, id, format!("{name} deploy plan")],
    )?;

    get_project_by_id(conn, id)
}

pub fn get_project_by_id(conn: &Connection, id: &str) -> Result<Project, ShipwayError> {
    conn.query_row(
        "SELECT id, name, repository, branch, description, created_at, updated_at
         FROM projects WHERE id = ?1",
        params![id],
        row_to_project,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::project_not_found(id),
        _ => ShipwayError::from(e),
    })
}

pub fn find_project_by_name(conn: &Connection, name: &str) -> Result<Option<Project>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, repository, branch, description, created_at, updated_at
         FROM projects WHERE name = ?1",
    )?;
    let mut rows = stmt.query(params![name])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_project(row)?)),
        None => Ok(None),
    }
}

/// Resolve a project reference: exact name → ULID prefix → name partial match.
pub fn resolve_project(conn: &Connection, reference: &str) -> Result<Project, ShipwayError> {
    if let Some(project) = find_project_by_name(conn, reference)? {
        return Ok(project);
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, repository, branch, description, created_at, updated_at
         FROM projects WHERE id LIKE ?1",
    )?;
    let prefix = format!("{reference}%");
    let projects: Vec<Project> = stmt
        .query_map(params![prefix], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;

    if projects.len() == 1 {
        return Ok(projects.into_iter().next().unwrap());
    }
    if projects.len() > 1 {
        let candidates: Vec<String> = projects
            .iter()
            .map(|p| format!("{} ({})", p.name, p.id))
            .collect();
        return Err(ShipwayError::ambiguous_ref(reference, &candidates));
    }

    let mut stmt = conn.prepare(
        "SELECT id, name, repository, branch, description, created_at, updated_at
         FROM projects WHERE name LIKE ?1",
    )?;
    let pattern = format!("%{reference}%");
    let projects: Vec<Project> = stmt
        .query_map(params![pattern], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;

    match projects.len() {
        0 => Err(ShipwayError::project_not_found(reference)),
        1 => Ok(projects.into_iter().next().unwrap()),
        _ => {
            let candidates: Vec<String> = projects
                .iter()
                .map(|p| format!("{} ({})", p.name, p.id))
                .collect();
            Err(ShipwayError::ambiguous_ref(reference, &candidates))
        }
    }
}

pub fn list_projects(conn: &Connection) -> Result<Vec<Project>, ShipwayError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, repository, branch, description, created_at, updated_at
         FROM projects ORDER BY created_at DESC",
    )?;
    let projects = stmt
        .query_map([], row_to_project)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(projects)
}

pub fn delete_project(conn: &Connection, id: &str) -> Result<(), ShipwayError> {
    let changed = conn.execute("DELETE FROM projects WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(ShipwayError::project_not_found(id));
    }
    Ok(())
}

pub fn build_plan_of(conn: &Connection, project_id: &str) -> Result<BuildPlan, ShipwayError> {
    conn.query_row(
        "SELECT id, project_id, name FROM build_plans WHERE project_id = ?1",
        params![project_id],
        |row| {
            Ok(BuildPlan {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::project_not_found(project_id),
        _ => ShipwayError::from(e),
    })
}

pub fn deploy_plan_of(conn: &Connection, project_id: &str) -> Result<DeployPlan, ShipwayError> {
    conn.query_row(
        "SELECT id, project_id, name FROM deploy_plans WHERE project_id = ?1",
        params![project_id],
        |row| {
            Ok(DeployPlan {
                id: row.get(0)?,
                project_id: row.get(1)?,
                name: row.get(2)?,
            })
        },
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => ShipwayError::project_not_found(project_id),
        _ => ShipwayError::from(e),
    })
}

/// The plan reference of the given kind for a project.
pub fn plan_ref(conn: &Connection, project_id: &str, kind: PlanKind) -> Result<PlanRef, ShipwayError> {
    match kind {
        PlanKind::Build => Ok(PlanRef::Build(build_plan_of(conn, project_id)?.id)),
        PlanKind::Deploy => Ok(PlanRef::Deploy(deploy_plan_of(conn, project_id)?.id)),
    }
}

fn row_to_project(row: &rusqlite::Row) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        repository: row.get(2)?,
        branch: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}
