use rusqlite::Connection;
use serde_json::json;

use crate::cli::commands::TaskCommands;
use crate::cli::project::resolve_project_id;
use crate::db::{
    command_repo, connection, environment_repo, log_repo, project_repo, server_repo, task_repo,
};
use crate::error::ShipwayError;
use crate::models::{Environment, PlanKind, PlanRef, ServerTarget, Task, TaskStatus};
use crate::output;
use crate::pipeline::stage::{self, Stage, Timing};
use crate::pipeline::{lifecycle, report};

pub fn run(cmd: TaskCommands, json_output: bool, project_flag: Option<&str>) -> i32 {
    let result = match cmd {
        TaskCommands::Create {
            plan,
            branch,
            commit,
            reason,
            payload,
            user,
            draft,
            envs,
            optional,
        } => run_create(
            &plan,
            branch.as_deref(),
            commit.as_deref(),
            reason.as_deref(),
            payload.as_deref(),
            user.as_deref(),
            draft,
            &envs,
            &optional,
            json_output,
            project_flag,
        ),
        TaskCommands::List { plan, limit, all } => {
            run_list(&plan, limit, all, json_output, project_flag)
        }
        TaskCommands::Show { id } => run_show(&id, json_output),
        TaskCommands::Deploy { id } => run_deploy(&id, json_output),
        TaskCommands::Rollback { id, reason } => run_rollback(&id, reason.as_deref(), json_output),
        TaskCommands::Abort { id } => run_abort(&id, json_output),
        TaskCommands::Begin { id } => run_begin(&id, json_output),
        TaskCommands::Complete { id } => run_transition(&id, "complete", json_output),
        TaskCommands::Fail { id } => run_transition(&id, "fail", json_output),
        TaskCommands::Aborted { id } => run_aborted(&id, json_output),
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

fn task_json_full(conn: &Connection, task: &Task) -> Result<serde_json::Value, ShipwayError> {
    let environments = task_repo::task_environments(conn, &task.id)?;
    let optional = task_repo::task_optional_command_ids(conn, &task.id)?;
    let mut v = output::json::task_json(task, &environments, &optional);
    v["jobs"] = json!(task_repo::outbox_jobs(conn, &task.id)?);
    Ok(v)
}

#[allow(clippy::too_many_arguments)]
fn run_create(
    plan: &str,
    branch: Option<&str>,
    commit: Option<&str>,
    reason: Option<&str>,
    payload: Option<&str>,
    user: Option<&str>,
    draft: bool,
    envs: &[String],
    optional: &[String],
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let kind = PlanKind::from_str(plan)
        .ok_or_else(|| ShipwayError::validation("--plan must be 'build' or 'deploy'"))?;
    if kind == PlanKind::Build && !envs.is_empty() {
        return Err(ShipwayError::validation(
            "Build tasks run on the plan's agents; --env applies to deploy tasks",
        ));
    }
    if let Some(payload) = payload {
        serde_json::from_str::<serde_json::Value>(payload)
            .map_err(|e| ShipwayError::validation(format!("Invalid payload JSON: {e}")))?;
    }

    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let project = project_repo::get_project_by_id(&conn, &project_id)?;
    let target = project_repo::plan_ref(&conn, &project_id, kind)?;

    // Resolve selections before any writes to fail fast
    let deploy_plan = project_repo::deploy_plan_of(&conn, &project_id)?;
    let mut environments: Vec<Environment> = Vec::with_capacity(envs.len());
    for name in envs {
        let environment = environment_repo::find_environment_by_name(&conn, &deploy_plan.id, name)?
            .ok_or_else(|| ShipwayError::environment_not_found(name))?;
        environments.push(environment);
    }

    let mut optional_ids = Vec::with_capacity(optional.len());
    for reference in optional {
        let command = command_repo::resolve_command(&conn, reference)?;
        if !command.optional {
            return Err(ShipwayError::validation(format!(
                "Command {} is not optional",
                command.id
            )));
        }
        if command.target != target {
            return Err(ShipwayError::validation(format!(
                "Command {} does not belong to the {} plan",
                command.id,
                kind.as_str()
            )));
        }
        optional_ids.push(command.id);
    }

    let branch = branch.unwrap_or(&project.branch);
    let status = if draft {
        TaskStatus::Draft
    } else {
        TaskStatus::Queued
    };
    let id = ulid::Ulid::new().to_string();

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(), ShipwayError> {
        task_repo::create_task(
            &conn, &id, &project_id, &target, user, branch, commit, reason, payload, &status,
        )?;
        for environment in &environments {
            task_repo::add_task_environment(&conn, &id, &environment.id)?;
        }
        for command_id in &optional_ids {
            task_repo::add_task_optional_command(&conn, &id, command_id)?;
        }
        // Drafts wait for explicit promotion; everything else is handed off
        if !draft {
            task_repo::enqueue_job(&conn, &id, "create_task")?;
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

    let task = task_repo::get_task_by_id(&conn, &id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": task_json_full(&conn, &task)?
            })))
            .unwrap()
        );
    } else {
        println!("Created task: {} [{}]", task.id, task.status.as_str());
    }
    Ok(0)
}

fn run_list(
    plan: &str,
    limit: i64,
    all: bool,
    json_output: bool,
    project_flag: Option<&str>,
) -> Result<i32, ShipwayError> {
    let kind = PlanKind::from_str(plan)
        .ok_or_else(|| ShipwayError::validation("--plan must be 'build' or 'deploy'"))?;

    let conn = connection::open_db()?;
    let project_id = resolve_project_id(&conn, project_flag)?;
    let target = project_repo::plan_ref(&conn, &project_id, kind)?;

    let tasks = if all {
        task_repo::list_all_tasks(&conn, &target)?
    } else {
        task_repo::latest_tasks(&conn, &target, limit)?
    };

    if json_output {
        let tasks_json: Vec<_> = tasks.iter().map(output::json::task_summary).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "plan": kind.as_str(),
                "tasks": tasks_json
            })))
            .unwrap()
        );
    } else {
        output::text::print_task_list(&tasks);
    }
    Ok(0)
}

fn run_show(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, id)?;

    let rows = log_repo::report_rows(&conn, &task.id)?;
    let entries = report::aggregate(&rows);
    let progress = report::progress(&rows);

    if json_output {
        let entries_json: Vec<_> = entries.iter().map(output::json::report_entry_json).collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": task_json_full(&conn, &task)?,
                "logs": entries_json,
                "log_progress": output::json::log_progress_json(&progress)
            })))
            .unwrap()
        );
    } else {
        output::text::print_task(&task);
        println!();
        output::text::print_report(&entries);
        output::text::print_log_progress(&progress);
    }
    Ok(0)
}

fn run_deploy(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, id)?;

    // Promoting a non-draft is a no-op, not an error
    let promoted = task.status.is_draft();
    if promoted {
        let next = lifecycle::validate_transition(&task.status, "deploy")?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = (|| -> Result<(), ShipwayError> {
            task_repo::update_task_status(&conn, &task.id, &next)?;
            task_repo::enqueue_job(&conn, &task.id, "deploy_draft")?;
            Ok(())
        })();
        match result {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
    }

    let task = task_repo::get_task_by_id(&conn, &task.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "promoted": promoted,
                "task": task_json_full(&conn, &task)?
            })))
            .unwrap()
        );
    } else if promoted {
        println!("Task {} → {}", task.id, task.status.as_str());
    } else {
        println!("Task {} is not a draft; nothing to do", task.id);
    }
    Ok(0)
}

fn run_rollback(id: &str, extra: Option<&str>, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let previous = task_repo::resolve_task(&conn, id)?;
    let environments = task_repo::task_environments(&conn, &previous.id)?;

    let reason = lifecycle::rollback_reason(&previous, extra);
    let new_id = ulid::Ulid::new().to_string();

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(), ShipwayError> {
        task_repo::create_task(
            &conn,
            &new_id,
            &previous.project_id,
            &previous.target,
            previous.user.as_deref(),
            &previous.branch,
            previous.commit.as_deref(),
            Some(&reason),
            previous.payload.as_deref(),
            &TaskStatus::Queued,
        )?;
        for environment in &environments {
            task_repo::add_task_environment(&conn, &new_id, &environment.id)?;
        }
        task_repo::enqueue_job(&conn, &new_id, "create_task")?;
        Ok(())
    })();

    match result {
        Ok(()) => conn.execute_batch("COMMIT")?,
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    }

    let task = task_repo::get_task_by_id(&conn, &new_id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": task_json_full(&conn, &task)?,
                "rolled_back_from": previous.id
            })))
            .unwrap()
        );
    } else {
        println!("Created rollback task: {} [{}]", task.id, task.status.as_str());
    }
    Ok(0)
}

fn run_abort(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, id)?;

    // Two-phase abort: request now, confirm later. Repeating the request,
    // or aborting a finished task, changes nothing and enqueues nothing.
    let requested = if task.status.is_aborting() || task.status.is_terminal() {
        false
    } else {
        let next = lifecycle::validate_transition(&task.status, "abort")?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        let result = (|| -> Result<(), ShipwayError> {
            // Status first, so readers see ABORTING before the worker acts
            task_repo::update_task_status(&conn, &task.id, &next)?;
            task_repo::enqueue_job(&conn, &task.id, "abort_task")?;
            Ok(())
        })();
        match result {
            Ok(()) => conn.execute_batch("COMMIT")?,
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK");
                return Err(e);
            }
        }
        true
    };

    let task = task_repo::get_task_by_id(&conn, &task.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "abort_requested": requested,
                "task": task_json_full(&conn, &task)?
            })))
            .unwrap()
        );
    } else if requested {
        println!("Task {} → {}", task.id, task.status.as_str());
    } else {
        println!("Task {} is {}; nothing to do", task.id, task.status.as_str());
    }
    Ok(0)
}

fn run_begin(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, id)?;
    let next = lifecycle::validate_transition(&task.status, "begin")?;

    let kind = task.target.kind();
    let environments = task_repo::task_environments(&conn, &task.id)?;
    let selected_optional = task_repo::task_optional_command_ids(&conn, &task.id)?;

    // The server fan-out per step: deploy tasks hit each selected
    // environment's servers plus the plan's cabinet pool; build tasks hit
    // the plan's agents with no environment.
    let mut fan_out: Vec<(Option<String>, Vec<String>)> = Vec::new();
    match &task.target {
        PlanRef::Deploy(plan_id) => {
            let cabinet =
                server_repo::list_servers_by_target(&conn, &ServerTarget::DeployPlan(plan_id.clone()))?;
            for environment in &environments {
                let mut server_ids: Vec<String> = server_repo::list_servers_by_target(
                    &conn,
                    &ServerTarget::Environment(environment.id.clone()),
                )?
                .into_iter()
                .map(|s| s.id)
                .collect();
                server_ids.extend(cabinet.iter().map(|s| s.id.clone()));
                fan_out.push((Some(environment.id.clone()), server_ids));
            }
        }
        PlanRef::Build(plan_id) => {
            let agents =
                server_repo::list_servers_by_target(&conn, &ServerTarget::BuildPlan(plan_id.clone()))?;
            fan_out.push((None, agents.into_iter().map(|s| s.id).collect()));
        }
    }

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<(usize, usize), ShipwayError> {
        task_repo::update_task_status(&conn, &task.id, &next)?;

        let mut step_count = 0;
        let mut log_count = 0;
        for phase in Stage::for_kind(kind) {
            for timing in [Timing::Before, Timing::Do, Timing::After] {
                let code = stage::step_code(phase, timing);
                // Do-steps always run; before/after steps only when they
                // have at least one enabled command
                let applicable = timing == Timing::Do || {
                    let commands = command_repo::list_for_step(&conn, &task.target, code)?;
                    commands
                        .iter()
                        .any(|c| !c.optional || selected_optional.contains(&c.id))
                };
                if !applicable {
                    continue;
                }

                let step_id = ulid::Ulid::new().to_string();
                log_repo::create_task_step(&conn, &step_id, &task.id, code)?;
                step_count += 1;

                for (environment_id, server_ids) in &fan_out {
                    for server_id in server_ids {
                        let log_id = ulid::Ulid::new().to_string();
                        log_repo::create_server_log(
                            &conn,
                            &log_id,
                            &step_id,
                            server_id,
                            environment_id.as_deref(),
                        )?;
                        log_count += 1;
                    }
                }
            }
        }
        Ok((step_count, log_count))
    })();

    let (steps, logs) = match result {
        Ok(counts) => {
            conn.execute_batch("COMMIT")?;
            counts
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    };

    let task = task_repo::get_task_by_id(&conn, &task.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": task_json_full(&conn, &task)?,
                "steps": steps,
                "logs": logs
            })))
            .unwrap()
        );
    } else {
        println!(
            "Task {} → {} ({} steps, {} server logs)",
            task.id,
            task.status.as_str(),
            steps,
            logs
        );
    }
    Ok(0)
}

fn run_transition(id: &str, action: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, id)?;
    let next = lifecycle::validate_transition(&task.status, action)?;
    task_repo::update_task_status(&conn, &task.id, &next)?;

    let task = task_repo::get_task_by_id(&conn, &task.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": task_json_full(&conn, &task)?
            })))
            .unwrap()
        );
    } else {
        println!("Task {} → {}", task.id, task.status.as_str());
    }
    Ok(0)
}

fn run_aborted(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let task = task_repo::resolve_task(&conn, id)?;
    let next = lifecycle::validate_transition(&task.status, "aborted")?;

    conn.execute_batch("BEGIN IMMEDIATE")?;
    let result = (|| -> Result<usize, ShipwayError> {
        task_repo::update_task_status(&conn, &task.id, &next)?;
        log_repo::cancel_open_logs(&conn, &task.id)
    })();

    let cancelled = match result {
        Ok(count) => {
            conn.execute_batch("COMMIT")?;
            count
        }
        Err(e) => {
            let _ = conn.execute_batch("ROLLBACK");
            return Err(e);
        }
    };

    let task = task_repo::get_task_by_id(&conn, &task.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "task": task_json_full(&conn, &task)?,
                "cancelled_logs": cancelled
            })))
            .unwrap()
        );
    } else {
        println!(
            "Task {} → {} ({} logs cancelled)",
            task.id,
            task.status.as_str(),
            cancelled
        );
    }
    Ok(0)
}
