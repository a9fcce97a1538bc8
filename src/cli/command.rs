use rusqlite::Connection;
use serde_json::json;

use crate::cli::commands::CommandCommands;
use crate::cli::project::resolve_project_id;
use crate::db::{command_repo, connection, environment_repo, pattern_repo, project_repo};
use crate::error::ShipwayError;
use crate::models::{Command, PlanKind};
use crate::output;
use crate::pipeline::stage::{self, Stage, Timing};

pub fn run(cmd: CommandCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        CommandCommands::Add {
            name,
            plan,
            stage,
            timing,
            script,
            user,
            optional,
            default_on,
            envs,
            patterns,
        } => run_add(
            &name,
            &plan,
            &stage,
            &timing,
            &script,
            user.as_deref(),
            optional,
            default_on,
            &envs,
            &patterns,
            json_output,
            project_flag,
        ),
        CommandCommands::List { stage, plan } => {
            run_list(&stage, plan.as_deref(), json_output, project_flag)
        }
        CommandCommands::Update {
            id,
            name,
            script,
            user,
            optional,
            default_on,
            envs,
            patterns,
        } => run_update(
            &id,
            name.as_deref(),
            script.as_deref(),
            user.as_deref(),
            optional,
            default_on,
            envs.as_deref(),
            patterns.as_deref(),
            json_output,
            project_flag,
        ),
        CommandCommands::Reorder { ids } => run_reorder(&ids, json_output),
        CommandCommands::Retire { id } => run_retire(&id, json_output),
        CommandCommands::Restore { id } => run_restore(&id, json_output),
        CommandCommands::Purge { id } => run_purge(&id, json_output),
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

/// Parse and cross-check the plan kind and stage keyword. The stage must
/// belong to the requested plan kind.
fn parse_stage(plan: &str, keyword: &str) -> Result<(PlanKind, Stage), ShipwayError> {
    let kind = PlanKind::from_str(plan)
        .ok_or_else(|| ShipwayError::validation("--plan must be 'build' or 'deploy'"))?;
    let stage = Stage::parse(keyword)?;
    if stage.plan_kind() != kind {
        return Err(ShipwayError::validation(format!(
            "Stage '{}' belongs to {} plans",
            stage.as_str(),
            stage.plan_kind().as_str()
        )));
    }
    Ok((kind, stage))
}

fn resolve_environment_ids(
    conn: &Connection,
    project_id: &str,
    names: &[String],
) -> Result<Vec<String>, ShipwayError> {
    let deploy_plan = project_repo::deploy_plan_of(conn, project_id)?;
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let environment = environment_repo::find_environment_by_name(conn, &deploy_plan.id, name)?
            .ok_or_else(|| ShipwayError::environment_not_found(name))?;
        ids.push(environment.id);
    }
    Ok(ids)
}

fn resolve_pattern_ids(
    conn: &Connection,
    project_id: &str,
    names: &[String],
) -> Result<Vec<String>, ShipwayError> {
    let build_plan = project_repo::build_plan_of(conn, project_id)?;
    let mut ids = Vec::with_capacity(names.len());
    for name in names {
        let pattern = pattern_repo::find_pattern_by_name(conn, &build_plan.id, name)?
            .ok_or_else(|| ShipwayError::pattern_not_found(name))?;
        ids.push(pattern.id);
    }
    Ok(ids)
}

fn command_with_associations(
    conn: &Connection,
    command: &Command,
) -> Result<serde_json::Value, ShipwayError> {
    let (environments, patterns) = match command.target.kind() {
        PlanKind::Deploy => (
            command_repo::environments_of_command(conn, &command.id)?,
            Vec::new(),
        ),
        PlanKind::Build => (
            Vec::new(),
            command_repo::patterns_of_command(conn, &command.id)?,
        ),
    };
    Ok(output::json::command_json(command, &environments, &patterns))
}

#[allow(clippy::too_many_arguments)]
fn run_add(
    name: &str,
    plan: &str,
    stage_keyword: &str,
    timing: &str,
    script: &str,
    user: Option<&str>,
    optional: bool,
    default_on: bool,
    envs: &[String],
    patterns: &[String],
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let (kind, stage) = parse_stage(plan, stage_keyword)?;
    let timing = Timing::parse(timing)?;
    if timing == Timing::Do {
        return Err(ShipwayError::validation(
            "Only before/after commands can be created; the do step is built in",
        ));
    }
    if kind == PlanKind::Build && !envs.is_empty() {
        return Err(ShipwayError::validation(
            "Build commands take --pattern, not --env",
        ));
    }
    if kind == PlanKind::Deploy && !patterns.is_empty() {
        return Err(ShipwayError::validation(
            "Deploy commands take --env, not --pattern",
        ));
    }

    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let target = project_repo::plan_ref(&conn, &project_id, kind)?;

    // Resolve associations before any writes to fail fast
    let environment_ids = resolve_environment_ids(&conn, &project_id, envs)?;
    let pattern_ids = resolve_pattern_ids(&conn, &project_id, patterns)?;

    let step = stage::step_code(stage, timing);
    let id = ulid::Ulid::new().to_string();

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(), ShipwayError> {
        command_repo::create_command(
            &conn, &id, &target, name, user, script, step, optional, default_on,
        )?;
        command_repo::sync_environments(&conn, &id, &environment_ids)?;
        command_repo::sync_patterns(&conn, &id, &pattern_ids)?;
        Ok(())
    })();

    match result {
        Ok(()) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    let command = command_repo::get_command_by_id(&conn, &id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "command": command_with_associations(&conn, &command)?
            })))
            .unwrap()
        );
    } else {
        println!(
            "Added command: {} ({}) at {}",
            command.name,
            command.id,
            stage::step_label(command.step)
        );
    }
    Ok(0)
}

fn run_list(
    stage_keyword: &str,
    plan: Option<&str>,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    // Infer the plan kind from the stage keyword unless given explicitly
    let stage = Stage::parse(stage_keyword)?;
    let kind = match plan {
        Some(p) => parse_stage(p, stage_keyword)?.0,
        None => stage.plan_kind(),
    };

    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let target = project_repo::plan_ref(&conn, &project_id, kind)?;

    let commands = command_repo::list_for_stage(&conn, &target, stage.surrounding_codes())?;

    if json_output {
        let commands_json: Vec<_> = commands
            .iter()
            .map(|c| command_with_associations(&conn, c))
            .collect::<Result<Vec<_>, _>>()?;
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "stage": stage.as_str(),
                "commands": commands_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_command_list(&commands);
    }
    Ok(0)
}

#[allow(clippy::too_many_arguments)]
fn run_update(
    id: &str,
    name: Option<&str>,
    script: Option<&str>,
    user: Option<&str>,
    optional: Option<bool>,
    default_on: Option<bool>,
    envs: Option<&[String]>,
    patterns: Option<&[String]>,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let command = command_repo::resolve_command(&conn, id)?;

    if command.target.kind() == PlanKind::Build && envs.is_some() {
        return Err(ShipwayError::validation(
            "Build commands take --pattern, not --env",
        ));
    }
    if command.target.kind() == PlanKind::Deploy && patterns.is_some() {
        return Err(ShipwayError::validation(
            "Deploy commands take --env, not --pattern",
        ));
    }

    let environment_ids = match envs {
        Some(names) => {
            let project_id = resolve_project_id(&conn, project_flag)?;
            Some(resolve_environment_ids(&conn, &project_id, names)?)
        }
        None => None,
    };
    let pattern_ids = match patterns {
        Some(names) => {
            let project_id = resolve_project_id(&conn, project_flag)?;
            Some(resolve_pattern_ids(&conn, &project_id, names)?)
        }
        None => None,
    };

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(), ShipwayError> {
        command_repo::update_command(
            &conn,
            &command.id,
            name.unwrap_or(&command.name),
            user.or(command.user.as_deref()),
            script.unwrap_or(&command.script),
            optional.unwrap_or(command.optional),
            default_on.unwrap_or(command.default_on),
        )?;
        if let Some(ids) = &environment_ids {
            command_repo::sync_environments(&conn, &command.id, ids)?;
        }
        if let Some(ids) = &pattern_ids {
            command_repo::sync_patterns(&conn, &command.id, ids)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    let updated = command_repo::get_command_by_id(&conn, &command.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "command": command_with_associations(&conn, &updated)?
            })))
            .unwrap()
        );
    } else {
        println!("Updated command: {} ({})", updated.name, updated.id);
    }
    Ok(0)
}

fn run_reorder(ids: &[String], json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;

    // All-or-nothing: an unknown id rolls the whole batch back
    conn.execute_batch("BEGIN IMMEDIATE")?;
    match command_repo::reorder_commands(&conn, ids) {
        Ok(()) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "reordered": ids.len()
            })))
            .unwrap()
        );
    } else {
        println!("Reordered {} commands", ids.len());
    }
    Ok(0)
}

fn run_retire(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let command = command_repo::resolve_command(&conn, id)?;
    command_repo::retire_command(&conn, &command.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "retired": { "id": command.id, "name": command.name }
            })))
            .unwrap()
        );
    } else {
        println!("Retired command: {} ({})", command.name, command.id);
    }
    Ok(0)
}

fn run_restore(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let command = command_repo::get_command_any(&conn, id)?;
    command_repo::restore_command(&conn, &command.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "restored": { "id": command.id, "name": command.name }
            })))
            .unwrap()
        );
    } else {
        println!("Restored command: {} ({})", command.name, command.id);
    }
    Ok(0)
}

fn run_purge(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let command = command_repo::get_command_any(&conn, id)?;
    command_repo::purge_command(&conn, &command.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "purged": { "id": command.id, "name": command.name }
            })))
            .unwrap()
        );
    } else {
        println!("Purged command: {} ({})", command.name, command.id);
    }
    Ok(0)
}
