use rusqlite::Connection;
use serde_json::json;

use crate::cli::commands::ProjectCommands;
use crate::db::{connection, project_repo};
use crate::error::ShipwayError;
use crate::output;

pub fn run(cmd: ProjectCommands, json_output: bool) -> i32 {
    let result = match cmd {
        ProjectCommands::Add {
            name,
            repository,
            branch,
            description,
        } => run_add(
            &name,
            &repository,
            branch.as_deref(),
            description.as_deref(),
            json_output,
        ),
        ProjectCommands::List => run_list(json_output),
        ProjectCommands::Show { reference } => run_show(&reference, json_output),
        ProjectCommands::Activate { name } => run_activate(&name, json_output),
        ProjectCommands::Delete { reference } => run_delete(&reference, json_output),
    };
    match result {
        Ok(code) => code,
        Err(e) => {
            if json_output {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&output::json::error(&e)).unwrap()
                );
            } else {
                eprintln!("Error: {}", e.message);
            }
            1
        }
    }
}

fn validate_project_name(name: &str) -> Result<(), ShipwayError> {
    if !slug_ok(name) {
        return Err(ShipwayError::validation(
            "Project name must match ^[a-z0-9][a-z0-9-]*[a-z0-9]$ (or single char [a-z0-9])",
        ));
    }
    Ok(())
}

fn slug_ok(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    if name.len() == 1 {
        return name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    }
    let chars: Vec<char> = name.chars().collect();
    let first = chars[0];
    let last = *chars.last().unwrap();
    if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
        return false;
    }
    if !(last.is_ascii_lowercase() || last.is_ascii_digit()) {
        return false;
    }
    chars
        .iter()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
}

fn run_add(
    name: &str,
    repository: &str,
    branch: Option<&str>,
    description: Option<&str>,
    json_output: bool,
) -> Result<i32, ShipwayError> {
    validate_project_name(name)?;
    let conn = connection::open_db()?;

    let id = ulid::Ulid::new().to_string();
    let build_plan_id = ulid::Ulid::new().to_string();
    let deploy_plan_id = ulid::Ulid::new().to_string();
    let branch = branch.unwrap_or("master");

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = project_repo::create_project(
        &conn,
        &id,
        name,
        repository,
        branch,
        description,
        &build_plan_id,
        &deploy_plan_id,
    );
    match result {
        Ok(_) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    let project = project_repo::get_project_by_id(&conn, &id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "project": output::json::project_json(&project),
                "build_plan_id": build_plan_id,
                "deploy_plan_id": deploy_plan_id
            })))
            .unwrap()
        );
    } else {
        println!("Created project: {} ({})", project.name, project.id);
    }
    Ok(0)
}

fn run_list(json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let projects = project_repo::list_projects(&conn)?;
    let active_id = get_active_project_id();

    if json_output {
        let projects_json: Vec<_> = projects
            .iter()
            .map(|p| {
                let mut v = output::json::project_json(p);
                if Some(&p.id) == active_id.as_ref() {
                    v["active"] = json!(true);
                }
                v
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "projects": projects_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_project_list(&projects, active_id.as_deref());
    }
    Ok(0)
}

fn run_show(reference: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project = project_repo::resolve_project(&conn, reference)?;
    let build_plan = project_repo::build_plan_of(&conn, &project.id)?;
    let deploy_plan = project_repo::deploy_plan_of(&conn, &project.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "project": output::json::project_json(&project),
                "build_plan": { "id": build_plan.id, "name": build_plan.name },
                "deploy_plan": { "id": deploy_plan.id, "name": deploy_plan.name }
            })))
            .unwrap()
        );
    } else {
        output::text::print_project(&project);
        println!("  Build plan: {} ({})", build_plan.name, build_plan.id);
        println!("  Deploy plan: {} ({})", deploy_plan.name, deploy_plan.id);
    }
    Ok(0)
}

fn run_activate(name: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project = project_repo::resolve_project(&conn, name)?;

    write_active_project(&project.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "activated": { "id": project.id, "name": project.name }
            })))
            .unwrap()
        );
    } else {
        println!("Activated project: {} ({})", project.name, project.id);
    }
    Ok(0)
}

fn run_delete(reference: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project = project_repo::resolve_project(&conn, reference)?;
    project_repo::delete_project(&conn, &project.id)?;

    // Clear active project if we just deleted it
    if get_active_project_id().as_deref() == Some(project.id.as_str()) {
        if let Ok(config_path) = connection::config_path() {
            let _ = std::fs::remove_file(config_path);
        }
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "deleted": { "id": project.id, "name": project.name }
            })))
            .unwrap()
        );
    } else {
        println!("Deleted project: {} ({})", project.name, project.id);
    }
    Ok(0)
}

fn write_active_project(project_id: &str) -> Result<(), ShipwayError> {
    let config_path = connection::config_path()?;
    let config = json!({ "active_project_id": project_id });
    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ShipwayError::database(e.to_string()))?;
    }
    std::fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap())
        .map_err(|e| ShipwayError::database(e.to_string()))?;
    Ok(())
}

pub fn get_active_project_id() -> Option<String> {
    let config_path = connection::config_path().ok()?;
    let content = std::fs::read_to_string(config_path).ok()?;
    let config: serde_json::Value = serde_json::from_str(&content).ok()?;
    config["active_project_id"].as_str().map(|s| s.to_string())
}

pub fn resolve_project_id(
    conn: &Connection,
    project_flag: Option<&str>,
) -> Result<String, ShipwayError> {
    if let Some(reference) = project_flag {
        let project = project_repo::resolve_project(conn, reference)?;
        return Ok(project.id);
    }
    let id = get_active_project_id().ok_or_else(ShipwayError::no_active_project)?;
    // Validate that the active project still exists
    project_repo::get_project_by_id(conn, &id)?;
    Ok(id)
}
