use serde_json::{json, Value};

use crate::error::ShipwayError;
use crate::models::{
    Command, Environment, Pattern, Project, Release, Server, ServerLog, Task, Variable,
};
use crate::pipeline::report::{LogProgress, ReportEntry};
use crate::pipeline::stage;

pub fn success(data: Value) -> Value {
    json!({
        "success": true,
        "data": data
    })
}

pub fn error(err: &ShipwayError) -> Value {
    json!({
        "success": false,
        "error": {
            "code": err.code.as_str(),
            "message": err.message
        }
    })
}

pub fn project_json(p: &Project) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "repository": p.repository,
        "branch": p.branch,
        "description": p.description,
        "created_at": p.created_at,
        "updated_at": p.updated_at
    })
}

pub fn environment_json(e: &Environment) -> Value {
    json!({
        "id": e.id,
        "name": e.name
    })
}

pub fn server_json(s: &Server) -> Value {
    json!({
        "id": s.id,
        "name": s.name,
        "host": s.host,
        "target": { "kind": s.target.kind_str(), "id": s.target.id() }
    })
}

pub fn pattern_json(p: &Pattern) -> Value {
    json!({
        "id": p.id,
        "name": p.name,
        "copy_pattern": p.copy_pattern
    })
}

pub fn variable_json(v: &Variable) -> Value {
    json!({
        "id": v.id,
        "name": v.name,
        "value": v.value
    })
}

pub fn command_json(c: &Command, environments: &[Environment], patterns: &[Pattern]) -> Value {
    json!({
        "id": c.id,
        "name": c.name,
        "user": c.user,
        "script": c.script,
        "plan": c.target.kind().as_str(),
        "step": c.step,
        "step_label": stage::step_label(c.step),
        "order": c.sort_order,
        "optional": c.optional,
        "default_on": c.default_on,
        "environments": environments.iter().map(environment_json).collect::<Vec<_>>(),
        "patterns": patterns.iter().map(pattern_json).collect::<Vec<_>>()
    })
}

pub fn task_summary(t: &Task) -> Value {
    json!({
        "id": t.id,
        "plan": t.target.kind().as_str(),
        "branch": t.branch,
        "commit": t.commit,
        "status": t.status.as_str(),
        "started_at": t.started_at
    })
}

pub fn task_json(t: &Task, environments: &[Environment], optional: &[String]) -> Value {
    json!({
        "id": t.id,
        "project_id": t.project_id,
        "plan": t.target.kind().as_str(),
        "user": t.user,
        "branch": t.branch,
        "commit": t.commit,
        "short_commit": t.short_commit(),
        "reason": t.reason,
        "payload": t.payload,
        "status": t.status.as_str(),
        "created_at": t.created_at,
        "started_at": t.started_at,
        "finished_at": t.finished_at,
        "environments": environments.iter().map(environment_json).collect::<Vec<_>>(),
        "optional_commands": optional
    })
}

pub fn log_json(l: &ServerLog) -> Value {
    json!({
        "id": l.id,
        "task_step_id": l.task_step_id,
        "server_id": l.server_id,
        "environment_id": l.environment_id,
        "status": l.status.code(),
        "status_name": l.status.as_str(),
        "runtime": l.runtime(),
        "started_at": l.started_at,
        "finished_at": l.finished_at
    })
}

pub fn report_entry_json(e: &ReportEntry) -> Value {
    json!({
        "log_id": e.log_id,
        "step": e.step,
        "step_label": e.step_label,
        "server": e.server_name,
        "status": e.status,
        "status_name": e.status_name,
        "cabinet": e.cabinet,
        "environment_name": e.environment_name,
        "runtime": e.runtime,
        "has_output": e.has_output
    })
}

pub fn log_progress_json(p: &LogProgress) -> Value {
    json!({
        "total": p.total,
        "completed": p.completed,
        "pending": p.pending,
        "running": p.running,
        "failed": p.failed,
        "cancelled": p.cancelled
    })
}

pub fn release_json(r: &Release) -> Value {
    json!({
        "id": r.id,
        "task_id": r.task_id,
        "name": r.name,
        "created_at": r.created_at
    })
}
