use crate::models::{Command, Environment, Pattern, Project, Release, Server, Task, Variable};
use crate::pipeline::report::{LogProgress, ReportEntry};
use crate::pipeline::stage;

fn short(id: &str) -> &str {
    &id[..std::cmp::min(8, id.len())]
}

pub fn print_project(p: &Project) {
    println!("Project: {} ({})", p.name, p.id);
    println!("  Repository: {}", p.repository);
    println!("  Branch: {}", p.branch);
    if let Some(ref desc) = p.description {
        println!("  Description: {desc}");
    }
    println!("  Created: {}", p.created_at);
}

pub fn print_project_list(projects: &[Project], active_id: Option<&str>) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    for p in projects {
        let marker = if Some(p.id.as_str()) == active_id { " *" } else { "" };
        println!("  {} ({}) {} [{}]{}", p.name, short(&p.id), p.repository, p.branch, marker);
    }
}

pub fn print_environment_list(environments: &[Environment]) {
    if environments.is_empty() {
        println!("No environments found.");
        return;
    }
    for e in environments {
        println!("  {} ({})", e.name, short(&e.id));
    }
}

pub fn print_server_list(servers: &[Server], label: &str) {
    if servers.is_empty() {
        return;
    }
    println!("{label}:");
    for s in servers {
        println!("  {} ({}) {}", s.name, short(&s.id), s.host);
    }
}

pub fn print_pattern_list(patterns: &[Pattern]) {
    if patterns.is_empty() {
        println!("No patterns found.");
        return;
    }
    for p in patterns {
        println!("  {} ({}) -> {}", p.name, short(&p.id), p.copy_pattern);
    }
}

pub fn print_variable_list(variables: &[Variable]) {
    if variables.is_empty() {
        println!("No variables found.");
        return;
    }
    for v in variables {
        println!("  {}={}", v.name, v.value);
    }
}

pub fn print_command_list(commands: &[Command]) {
    if commands.is_empty() {
        println!("No commands found.");
        return;
    }
    for c in commands {
        let flags = match (c.optional, c.default_on) {
            (true, true) => " [optional, on]",
            (true, false) => " [optional]",
            _ => "",
        };
        println!(
            "  {}. {} ({}) <{}>{}",
            c.sort_order,
            c.name,
            short(&c.id),
            stage::step_label(c.step),
            flags
        );
    }
}

pub fn print_task(t: &Task) {
    println!("Task: {} [{}]", t.id, t.status.as_str());
    println!("  Plan: {}", t.target.kind().as_str());
    println!("  Branch: {}", t.branch);
    if let Some(commit) = t.short_commit() {
        println!("  Commit: {commit}");
    }
    if let Some(ref reason) = t.reason {
        println!("  Reason: {reason}");
    }
    if let Some(ref started) = t.started_at {
        println!("  Started: {started}");
    }
    if let Some(ref finished) = t.finished_at {
        println!("  Finished: {finished}");
    }
}

pub fn print_task_list(tasks: &[Task]) {
    if tasks.is_empty() {
        println!("No tasks found.");
        return;
    }
    for t in tasks {
        let commit = t.short_commit().unwrap_or("-");
        println!(
            "  [{}] {} {} @ {} ({})",
            t.status.as_str(),
            short(&t.id),
            t.branch,
            commit,
            t.started_at.as_deref().unwrap_or("not started")
        );
    }
}

pub fn print_report(entries: &[ReportEntry]) {
    if entries.is_empty() {
        println!("No server logs.");
        return;
    }
    let mut last_label = "";
    for e in entries {
        if e.step_label != last_label {
            println!("{}:", e.step_label);
            last_label = &e.step_label;
        }
        let env = match (&e.environment_name, e.cabinet) {
            (Some(name), true) => format!(" [{name}, cabinet]"),
            (Some(name), false) => format!(" [{name}]"),
            (None, true) => " [cabinet]".to_string(),
            (None, false) => String::new(),
        };
        let runtime = match e.runtime {
            Some(secs) => format!("{secs}s"),
            None => "-".to_string(),
        };
        println!(
            "  {} ({}) {}{} {}",
            e.server_name,
            short(&e.log_id),
            e.status_name,
            env,
            runtime
        );
    }
}

pub fn print_log_progress(p: &LogProgress) {
    println!(
        "Logs: total={} completed={} pending={} running={} failed={} cancelled={}",
        p.total, p.completed, p.pending, p.running, p.failed, p.cancelled
    );
}

pub fn print_release_list(releases: &[Release]) {
    if releases.is_empty() {
        println!("No releases found.");
        return;
    }
    for r in releases {
        println!("  {} ({}) task {}", r.name, short(&r.id), short(&r.task_id));
    }
}
