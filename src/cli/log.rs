use serde_json::json;

use crate::cli::commands::LogCommands;
use crate::db::{connection, log_repo};
use crate::error::ShipwayError;
use crate::output;

pub fn run(cmd: LogCommands, json_output: bool) -> i32 {
    let result = match cmd {
        LogCommands::Start { id } => run_start(&id, json_output),
        LogCommands::Finish { id, failed, output } => {
            run_finish(&id, failed, output.as_deref(), json_output)
        }
        LogCommands::Show { id } => run_show(&id, json_output),
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

fn run_start(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let log = log_repo::resolve_log(&conn, id)?;
    log_repo::start_log(&conn, &log.id)?;

    let log = log_repo::get_log_by_id(&conn, &log.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "log": output::json::log_json(&log)
            })))
            .unwrap()
        );
    } else {
        println!("Log {} → {}", log.id, log.status.as_str());
    }
    Ok(0)
}

fn run_finish(
    id: &str,
    failed: bool,
    captured: Option<&str>,
    json_output: bool,
) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let log = log_repo::resolve_log(&conn, id)?;
    log_repo::finish_log(&conn, &log.id, failed, captured)?;

    let log = log_repo::get_log_by_id(&conn, &log.id)?;
    if json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({
                "log": output::json::log_json(&log)
            })))
            .unwrap()
        );
    } else {
        println!("Log {} → {}", log.id, log.status.as_str());
    }
    Ok(0)
}

fn run_show(id: &str, json_output: bool) -> Result<i32, ShipwayError> {
    let conn = connection::open_db()?;
    let log = log_repo::resolve_log(&conn, id)?;

    if json_output {
        let mut v = output::json::log_json(&log);
        v["output"] = json!(log.output);
        println!(
            "{}",
            serde_json::to_string_pretty(&output::json::success(json!({ "log": v }))).unwrap()
        );
    } else {
        println!("Log: {} [{}]", log.id, log.status.as_str());
        if let Some(ref started) = log.started_at {
            println!("  Started: {started}");
        }
        if let Some(ref finished) = log.finished_at {
            println!("  Finished: {finished}");
        }
        match log.runtime() {
            Some(secs) => println!("  Runtime: {secs}s"),
            None => println!("  Runtime: -"),
        }
        if let Some(ref captured) = log.output {
            if !captured.is_empty() {
                println!("--- output ---");
                println!("{captured}");
            }
        }
    }
    Ok(0)
}
