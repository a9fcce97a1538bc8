use serde_json::json;

use crate::cli::commands::ReleaseCommands;
use crate::cli::project::resolve_project_id;
use crate::db::{connection, release_repo, task_repo};
use crate::error::ShipwayError;
use crate::models::{PlanRef, TaskStatus};
use crate::output;

pub fn run(cmd: ReleaseCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        ReleaseCommands::Add { task, name } => run_add(&task, name.as_deref(), json_output),
        ReleaseCommands::List => run_list(json_output, project_flag),
        ReleaseCommands::Remove { id } => run_remove(&id, json_output),
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

fn run_add(task_ref: &str, name: Option<&str>, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, task_ref)?;

    if !matches!(task.target, PlanRef::Build(_)) {
        return Err(ShipwayError::validation(
            "Releases are cut from build tasks",
        ));
    }
    if task.status != TaskStatus::Completed {
        return Err(ShipwayError::validation(format!(
            "Task {} is {}; only completed builds are releasable",
            task.id,
            task.status.as_str()
        )));
    }

    let name = match name {
        Some(name) => name.to_string(),
        None => {
            let number = release_repo::next_release_number(&conn, &task.project_id)?;
            format!("Release-{number}")
        }
    };

    let id = ulid::Ulid::new().to_string();
    let release = release_repo::create_release(&conn, &id, &task.project_id, &task.id, &name)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "release": output::json::release_json(&release)
            })))
            .unwrap()
        );
    } else {
        println!("Created release: {} ({})", release.name, release.id);
    }
    Ok(0)
}

fn run_list(json_output: bool, project_flag: Option<&str>) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let releases = release_repo::list_releases(&conn, &project_id)?;

    if json_output {
        let releases_json: Vec<_> = releases.iter().map(output::json::release_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "releases": releases_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_release_list(&releases);
    }
    Ok(0)
}

fn run_remove(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let release = release_repo::resolve_release(&conn, id)?;
    release_repo::purge_release(&conn, &release.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "removed": { "id": release.id, "name": release.name }
            })))
            .unwrap()
        );
    } else {
        println!("Removed release: {}", release.name);
    }
    Ok(0)
}
