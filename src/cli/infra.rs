use rusqlite::Connection;
use serde_json::json;

use crate::cli::commands::{EnvCommands, PatternCommands, ServerCommands, VarCommands};
use crate::cli::project::resolve_project_id;
use crate::db::{connection, environment_repo, pattern_repo, project_repo, server_repo, variable_repo};
use crate::error::ShipwayError;
use crate::models::{PlanKind, ServerTarget};
use crate::output;

fn report(result: Result<i32, ShipwayError>, json_output: bool) -> i32 {
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

pub fn run_env(cmd: EnvCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        EnvCommands::Add { name } => env_add(&name, json_output, project_flag),
        EnvCommands::List => env_list(json_output, project_flag),
        EnvCommands::Remove { name } => env_remove(&name, json_output, project_flag),
    };
    report(result, json_output)
}

fn env_add(name: &str, json_output: bool, project_flag: Option<&str>) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let deploy_plan = project_repo::deploy_plan_of(&conn, &project_id)?;

    let id = ulid::Ulid::new().to_string();
    let environment = environment_repo::create_environment(&conn, &id, &deploy_plan.id, name)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "environment": output::json::environment_json(&environment)
            })))
            .unwrap()
        );
    } else {
        println!("Added environment: {} ({})", environment.name, environment.id);
    }
    Ok(0)
}

fn env_list(json_output: bool, project_flag: Option<&str>) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let deploy_plan = project_repo::deploy_plan_of(&conn, &project_id)?;
    let environments = environment_repo::list_environments(&conn, &deploy_plan.id)?;

    if json_output {
        let environments_json: Vec<_> = environments
            .iter()
            .map(output::json::environment_json)
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "environments": environments_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_environment_list(&environments);
    }
    Ok(0)
}

fn env_remove(
    name: &str,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let deploy_plan = project_repo::deploy_plan_of(&conn, &project_id)?;
    let environment = environment_repo::find_environment_by_name(&conn, &deploy_plan.id, name)?
        .ok_or_else(|| ShipwayError::environment_not_found(name))?;
    environment_repo::delete_environment(&conn, &environment.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "removed": { "id": environment.id, "name": environment.name }
            })))
            .unwrap()
        );
    } else {
        println!("Removed environment: {}", environment.name);
    }
    Ok(0)
}

pub fn run_server(cmd: ServerCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        ServerCommands::Add {
            name,
            host,
            env,
            plan,
        } => server_add(&name, &host, env.as_deref(), plan.as_deref(), json_output, project_flag),
        ServerCommands::List => server_list(json_output, project_flag),
        ServerCommands::Remove { id } => server_remove(&id, json_output),
    };
    report(result, json_output)
}

fn server_add(
    name: &str,
    host: &str,
    env: Option<&str>,
    plan: Option<&str>,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;

    let target = match (env, plan) {
        (Some(env_name), None) => {
            let deploy_plan = project_repo::deploy_plan_of(&conn, &project_id)?;
            let environment =
                environment_repo::find_environment_by_name(&conn, &deploy_plan.id, env_name)?
                    .ok_or_else(|| ShipwayError::environment_not_found(env_name))?;
            ServerTarget::Environment(environment.id)
        }
        (None, Some(kind)) => match PlanKind::from_str(kind) {
            Some(PlanKind::Build) => {
                ServerTarget::BuildPlan(project_repo::build_plan_of(&conn, &project_id)?.id)
            }
            Some(PlanKind::Deploy) => {
                ServerTarget::DeployPlan(project_repo::deploy_plan_of(&conn, &project_id)?.id)
            }
            None => {
                return Err(ShipwayError::validation(
                    "--plan must be 'build' or 'deploy'",
                ))
            }
        },
        _ => {
            return Err(ShipwayError::validation(
                "Specify exactly one of --env <name> or --plan build|deploy",
            ))
        }
    };

    let id = ulid::Ulid::new().to_string();
    let server = server_repo::create_server(&conn, &id, name, host, &target)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "server": output::json::server_json(&server)
            })))
            .unwrap()
        );
    } else {
        println!("Added server: {} ({})", server.name, server.id);
    }
    Ok(0)
}

fn server_list(json_output: bool, project_flag: Option<&str>) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let build_plan = project_repo::build_plan_of(&conn, &project_id)?;
    let deploy_plan = project_repo::deploy_plan_of(&conn, &project_id)?;

    let mut groups: Vec<(String, Vec<crate::models::Server>)> = Vec::new();
    for environment in environment_repo::list_environments(&conn, &deploy_plan.id)? {
        let servers = server_repo::list_servers_by_target(
            &conn,
            &ServerTarget::Environment(environment.id.clone()),
        )?;
        groups.push((environment.name, servers));
    }
    let cabinet = server_repo::list_servers_by_target(
        &conn,
        &ServerTarget::DeployPlan(deploy_plan.id.clone()),
    )?;
    groups.push(("cabinet".to_string(), cabinet));
    let agents =
        server_repo::list_servers_by_target(&conn, &ServerTarget::BuildPlan(build_plan.id.clone()))?;
    groups.push(("agents".to_string(), agents));

    if json_output {
        let groups_json: Vec<_> = groups
            .iter()
            .map(|(label, servers)| {
                json!({
                    "group": label,
                    "servers": servers.iter().map(output::json::server_json).collect::<Vec<_>>()
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "groups": groups_json
            })))
            .unwrap()
        );
    } else {
        let mut any = false;
        for (label, servers) in &groups {
            any = any || !servers.is_empty();
            output::text::print_server_list(servers, label);
        }
        if !any {
            println!("No servers found.");
        }
    }
    Ok(0)
}

fn server_remove(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let server = server_repo::get_server_by_id(&conn, id)?;
    server_repo::delete_server(&conn, &server.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "removed": { "id": server.id, "name": server.name }
            })))
            .unwrap()
        );
    } else {
        println!("Removed server: {}", server.name);
    }
    Ok(0)
}

pub fn run_pattern(cmd: PatternCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        PatternCommands::Add { name, copy } => pattern_add(&name, &copy, json_output, project_flag),
        PatternCommands::List => pattern_list(json_output, project_flag),
        PatternCommands::Remove { name } => pattern_remove(&name, json_output, project_flag),
    };
    report(result, json_output)
}

fn pattern_add(
    name: &str,
    copy: &str,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let build_plan = project_repo::build_plan_of(&conn, &project_id)?;

    let id = ulid::Ulid::new().to_string();
    let pattern = pattern_repo::create_pattern(&conn, &id, &build_plan.id, name, copy)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "pattern": output::json::pattern_json(&pattern)
            })))
            .unwrap()
        );
    } else {
        println!("Added pattern: {} ({})", pattern.name, pattern.id);
    }
    Ok(0)
}

fn pattern_list(json_output: bool, project_flag: Option<&str>) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let build_plan = project_repo::build_plan_of(&conn, &project_id)?;
    let patterns = pattern_repo::list_patterns(&conn, &build_plan.id)?;

    if json_output {
        let patterns_json: Vec<_> = patterns.iter().map(output::json::pattern_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "patterns": patterns_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_pattern_list(&patterns);
    }
    Ok(0)
}

fn pattern_remove(
    name: &str,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let build_plan = project_repo::build_plan_of(&conn, &project_id)?;
    let pattern = pattern_repo::find_pattern_by_name(&conn, &build_plan.id, name)?
        .ok_or_else(|| ShipwayError::pattern_not_found(name))?;
    pattern_repo::purge_pattern(&conn, &pattern.id)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "removed": { "id": pattern.id, "name": pattern.name }
            })))
            .unwrap()
        );
    } else {
        println!("Removed pattern: {}", pattern.name);
    }
    Ok(0)
}

pub fn run_var(cmd: VarCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        VarCommands::Set { name, value, plan } => {
            var_set(&name, &value, &plan, json_output, project_flag)
        }
        VarCommands::List { plan } => var_list(&plan, json_output, project_flag),
        VarCommands::Unset { name, plan } => var_unset(&name, &plan, json_output, project_flag),
    };
    report(result, json_output)
}

fn plan_ref_for(
    conn: &Connection,
    project_id: &str,
    plan: &str,
) -> Result<crate::models::PlanRef, ShipwayError> {
    let kind = PlanKind::from_str(plan)
        .ok_or_else(|| ShipwayError::validation("--plan must be 'build' or 'deploy'"))?;
    project_repo::plan_ref(conn, project_id, kind)
}

fn var_set(
    name: &str,
    value: &str,
    plan: &str,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let target = plan_ref_for(&conn, &project_id, plan)?;

    let id = ulid::Ulid::new().to_string();
    let variable = variable_repo::set_variable(&conn, &id, &target, name, value)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "variable": output::json::variable_json(&variable)
            })))
            .unwrap()
        );
    } else {
        println!("Set {}={}", variable.name, variable.value);
    }
    Ok(0)
}

fn var_list(
    plan: &str,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let target = plan_ref_for(&conn, &project_id, plan)?;
    let variables = variable_repo::list_variables(&conn, &target)?;

    if json_output {
        let variables_json: Vec<_> = variables.iter().map(output::json::variable_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "variables": variables_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_variable_list(&variables);
    }
    Ok(0)
}

fn var_unset(
    name: &str,
    plan: &str,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let target = plan_ref_for(&conn, &project_id, plan)?;
    variable_repo::unset_variable(&conn, &target, name)?;

    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "removed": { "name": name }
            })))
            .unwrap()
        );
    } else {
        println!("Removed variable: {name}");
    }
    Ok(0)
}
