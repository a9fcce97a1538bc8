#[allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::PathBuf;
use tempfile::TempDir;

// ─── helpers ───────────────────────────────────────────────────────

struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        let dir = TempDir::new().expect("create tempdir");
        std::process::Command::new("git")
            .args(["init"])
            .current_dir(dir.path())
            .output()
            .expect("git init");
        Self { dir }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("shipway").expect("binary");
        cmd.current_dir(self.dir.path());
        cmd
    }

    fn run_json(&self, args: &[&str]) -> Value {
        let mut a: Vec<&str> = args.to_vec();
        a.push("--json");
        let output = self.cmd().args(&a).output().expect("run");
        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(&stdout)
            .unwrap_or_else(|e| panic!("parse JSON failed: {e}\nstdout: {stdout}"))
    }

    fn run_ok(&self, args: &[&str]) -> Value {
        let v = self.run_json(args);
        assert_eq!(v["success"], true, "expected success=true: {v}");
        v
    }

    fn run_err(&self, args: &[&str]) -> Value {
        let v = self.run_json(args);
        assert_eq!(v["success"], false, "expected success=false: {v}");
        v
    }
}

/// init + a project named "demo", activated.
fn setup_project(env: &TestEnv) {
    env.run_ok(&["init"]);
    env.run_ok(&[
        "project",
        "add",
        "demo",
        "--repository",
        "git@example.com:demo.git",
        "--branch",
        "main",
    ]);
    env.run_ok(&["project", "activate", "demo"]);
}

/// A deploy setup: environment "prod" with two servers plus one cabinet
/// server attached directly to the deploy plan.
fn setup_deploy_servers(env: &TestEnv) {
    env.run_ok(&["env", "add", "prod"]);
    env.run_ok(&["server", "add", "web-1", "--host", "10.0.0.1", "--env", "prod"]);
    env.run_ok(&["server", "add", "web-2", "--host", "10.0.0.2", "--env", "prod"]);
    env.run_ok(&["server", "add", "store-1", "--host", "10.0.0.9", "--plan", "deploy"]);
}

fn add_command(env: &TestEnv, name: &str, stage: &str, timing: &str, extra: &[&str]) -> String {
    let mut args = vec![
        "command", "add", name, "--plan", "deploy", "--stage", stage, "--timing", timing,
        "--script", "echo hi",
    ];
    args.extend_from_slice(extra);
    let v = env.run_ok(&args);
    v["data"]["command"]["id"].as_str().unwrap().to_string()
}

fn create_deploy_task(env: &TestEnv, extra: &[&str]) -> String {
    let mut args = vec!["task", "create", "--plan", "deploy", "--env", "prod"];
    args.extend_from_slice(extra);
    let v = env.run_ok(&args);
    v["data"]["task"]["id"].as_str().unwrap().to_string()
}

// ─── 1. init ───────────────────────────────────────────────────────

#[test]
fn test_init() {
    let env = TestEnv::new();
    let v = env.run_ok(&["init"]);
    let path = v["data"]["path"].as_str().unwrap();
    assert!(path.ends_with(".shipway/shipway.db"));
    assert!(PathBuf::from(path).exists());
}

#[test]
fn test_init_idempotent() {
    let env = TestEnv::new();
    env.run_ok(&["init"]);
    let v = env.run_ok(&["init"]);
    assert!(v["data"]["path"].as_str().unwrap().contains("shipway.db"));
}

#[test]
fn test_init_required_before_commands() {
    let env = TestEnv::new();
    let v = env.run_err(&["project", "list"]);
    assert_eq!(v["error"]["code"], "NOT_INITIALIZED");
}

// ─── 2. project crud ───────────────────────────────────────────────

#[test]
fn test_project_crud() {
    let env = TestEnv::new();
    env.run_ok(&["init"]);

    let v = env.run_ok(&[
        "project", "add", "my-app",
        "--repository", "git@example.com:my-app.git",
        "--description", "desc",
    ]);
    let project_id = v["data"]["project"]["id"].as_str().unwrap().to_string();
    assert_eq!(v["data"]["project"]["name"], "my-app");
    assert_eq!(v["data"]["project"]["branch"], "master");
    assert!(v["data"]["build_plan_id"].is_string());
    assert!(v["data"]["deploy_plan_id"].is_string());

    let v = env.run_ok(&["project", "list"]);
    assert_eq!(v["data"]["projects"].as_array().unwrap().len(), 1);

    let v = env.run_ok(&["project", "show", "my-app"]);
    assert_eq!(v["data"]["project"]["id"], project_id.as_str());
    assert!(v["data"]["build_plan"]["id"].is_string());

    let v = env.run_ok(&["project", "activate", "my-app"]);
    assert_eq!(v["data"]["activated"]["name"], "my-app");

    let v = env.run_ok(&["project", "delete", "my-app"]);
    assert_eq!(v["data"]["deleted"]["name"], "my-app");

    let v = env.run_ok(&["project", "list"]);
    assert_eq!(v["data"]["projects"].as_array().unwrap().len(), 0);

    // Active project pointer was cleared with the project
    let v = env.run_err(&["env", "list"]);
    assert_eq!(v["error"]["code"], "NO_ACTIVE_PROJECT");
}

#[test]
fn test_project_name_validation_and_conflict() {
    let env = TestEnv::new();
    env.run_ok(&["init"]);

    let v = env.run_err(&["project", "add", "UPPER", "--repository", "r"]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
    let v = env.run_err(&["project", "add", "has spaces", "--repository", "r"]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");

    env.run_ok(&["project", "add", "demo", "--repository", "r"]);
    let v = env.run_err(&["project", "add", "demo", "--repository", "r"]);
    assert_eq!(v["error"]["code"], "NAME_CONFLICT");
}

// ─── 3. environments, servers, patterns, variables ─────────────────

#[test]
fn test_environment_and_server_crud() {
    let env = TestEnv::new();
    setup_project(&env);

    env.run_ok(&["env", "add", "prod"]);
    env.run_ok(&["env", "add", "staging"]);
    let v = env.run_err(&["env", "add", "prod"]);
    assert_eq!(v["error"]["code"], "NAME_CONFLICT");

    let v = env.run_ok(&["env", "list"]);
    let names: Vec<&str> = v["data"]["environments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["prod", "staging"]);

    env.run_ok(&["server", "add", "web-1", "--host", "10.0.0.1", "--env", "prod"]);
    env.run_ok(&["server", "add", "agent-1", "--host", "10.0.0.5", "--plan", "build"]);
    let v = env.run_err(&["server", "add", "x", "--host", "h"]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
    let v = env.run_err(&["server", "add", "x", "--host", "h", "--env", "nope"]);
    assert_eq!(v["error"]["code"], "ENVIRONMENT_NOT_FOUND");

    let v = env.run_ok(&["server", "list"]);
    let groups = v["data"]["groups"].as_array().unwrap();
    let prod = groups.iter().find(|g| g["group"] == "prod").unwrap();
    assert_eq!(prod["servers"].as_array().unwrap().len(), 1);
    let agents = groups.iter().find(|g| g["group"] == "agents").unwrap();
    assert_eq!(agents["servers"].as_array().unwrap().len(), 1);

    env.run_ok(&["env", "remove", "staging"]);
    let v = env.run_ok(&["env", "list"]);
    assert_eq!(v["data"]["environments"].as_array().unwrap().len(), 1);
}

#[test]
fn test_pattern_and_variable_crud() {
    let env = TestEnv::new();
    setup_project(&env);

    env.run_ok(&["pattern", "add", "dist", "--copy", "dist/**"]);
    let v = env.run_err(&["pattern", "add", "dist", "--copy", "other/**"]);
    assert_eq!(v["error"]["code"], "NAME_CONFLICT");
    let v = env.run_ok(&["pattern", "list"]);
    assert_eq!(v["data"]["patterns"][0]["copy_pattern"], "dist/**");
    env.run_ok(&["pattern", "remove", "dist"]);

    env.run_ok(&["var", "set", "APP_ENV", "production"]);
    env.run_ok(&["var", "set", "APP_ENV", "staging"]);
    let v = env.run_ok(&["var", "list"]);
    let vars = v["data"]["variables"].as_array().unwrap();
    assert_eq!(vars.len(), 1);
    assert_eq!(vars[0]["value"], "staging");
    env.run_ok(&["var", "unset", "APP_ENV"]);
    let v = env.run_err(&["var", "unset", "APP_ENV"]);
    assert_eq!(v["error"]["code"], "VARIABLE_NOT_FOUND");
}

// ─── 4. command authoring and step order ───────────────────────────

#[test]
fn test_command_order_is_dense_per_step_group() {
    let env = TestEnv::new();
    setup_project(&env);

    // Same (plan, step) group: orders 0, 1, 2
    let v = env.run_ok(&[
        "command", "add", "a", "--plan", "deploy", "--stage", "install",
        "--timing", "before", "--script", "echo a",
    ]);
    assert_eq!(v["data"]["command"]["order"], 0);
    assert_eq!(v["data"]["command"]["step"], 4);
    let v = env.run_ok(&[
        "command", "add", "b", "--plan", "deploy", "--stage", "install",
        "--timing", "before", "--script", "echo b",
    ]);
    assert_eq!(v["data"]["command"]["order"], 1);
    let v = env.run_ok(&[
        "command", "add", "c", "--plan", "deploy", "--stage", "install",
        "--timing", "before", "--script", "echo c",
    ]);
    assert_eq!(v["data"]["command"]["order"], 2);

    // A different group starts at 0 again
    let v = env.run_ok(&[
        "command", "add", "d", "--plan", "deploy", "--stage", "clone",
        "--timing", "before", "--script", "echo d",
    ]);
    assert_eq!(v["data"]["command"]["order"], 0);
    assert_eq!(v["data"]["command"]["step"], 1);
}

#[test]
fn test_stage_listing_returns_surrounding_steps_only() {
    let env = TestEnv::new();
    setup_project(&env);

    add_command(&env, "before-install", "install", "before", &[]);
    add_command(&env, "after-install", "install", "after", &[]);
    add_command(&env, "before-clone", "clone", "before", &[]);

    let v = env.run_ok(&["command", "list", "install"]);
    let commands = v["data"]["commands"].as_array().unwrap();
    assert_eq!(commands.len(), 2);
    let steps: Vec<i64> = commands.iter().map(|c| c["step"].as_i64().unwrap()).collect();
    assert_eq!(steps, vec![4, 6]);
}

#[test]
fn test_stage_keyword_validation() {
    let env = TestEnv::new();
    setup_project(&env);

    let v = env.run_err(&[
        "command", "add", "x", "--plan", "deploy", "--stage", "compile",
        "--timing", "before", "--script", "s",
    ]);
    assert_eq!(v["error"]["code"], "UNKNOWN_STAGE");

    // Build stage on a deploy plan is a caller error
    let v = env.run_err(&[
        "command", "add", "x", "--plan", "deploy", "--stage", "test",
        "--timing", "before", "--script", "s",
    ]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");

    // The do step cannot be authored
    let v = env.run_err(&[
        "command", "add", "x", "--plan", "deploy", "--stage", "install",
        "--timing", "do", "--script", "s",
    ]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
}

#[test]
fn test_reorder_assigns_positions() {
    let env = TestEnv::new();
    setup_project(&env);

    let a = add_command(&env, "a", "install", "before", &[]);
    let b = add_command(&env, "b", "install", "before", &[]);
    let c = add_command(&env, "c", "install", "before", &[]);

    env.run_ok(&["command", "reorder", &c, &a, &b]);

    let v = env.run_ok(&["command", "list", "install"]);
    let by_order: Vec<(&str, i64)> = v["data"]["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|cmd| (cmd["name"].as_str().unwrap(), cmd["order"].as_i64().unwrap()))
        .collect();
    assert_eq!(by_order, vec![("c", 0), ("a", 1), ("b", 2)]);
}

#[test]
fn test_reorder_unknown_id_rolls_back_whole_batch() {
    let env = TestEnv::new();
    setup_project(&env);

    let a = add_command(&env, "a", "install", "before", &[]);
    let b = add_command(&env, "b", "install", "before", &[]);

    let v = env.run_err(&["command", "reorder", &b, "01UNKNOWNID", &a]);
    assert_eq!(v["error"]["code"], "COMMAND_NOT_FOUND");

    // Nothing moved
    let v = env.run_ok(&["command", "list", "install"]);
    let by_order: Vec<(&str, i64)> = v["data"]["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|cmd| (cmd["name"].as_str().unwrap(), cmd["order"].as_i64().unwrap()))
        .collect();
    assert_eq!(by_order, vec![("a", 0), ("b", 1)]);
}

#[test]
fn test_retire_restore_purge() {
    let env = TestEnv::new();
    setup_project(&env);

    let a = add_command(&env, "a", "install", "before", &[]);
    let b = add_command(&env, "b", "install", "before", &[]);

    env.run_ok(&["command", "retire", &b]);
    let v = env.run_ok(&["command", "list", "install"]);
    assert_eq!(v["data"]["commands"].as_array().unwrap().len(), 1);

    // Retired siblings do not count towards new orders
    let v = env.run_ok(&[
        "command", "add", "c", "--plan", "deploy", "--stage", "install",
        "--timing", "before", "--script", "echo c",
    ]);
    assert_eq!(v["data"]["command"]["order"], 1);

    env.run_ok(&["command", "restore", &b]);
    let v = env.run_ok(&["command", "list", "install"]);
    assert_eq!(v["data"]["commands"].as_array().unwrap().len(), 3);

    env.run_ok(&["command", "purge", &a]);
    let v = env.run_ok(&["command", "list", "install"]);
    assert_eq!(v["data"]["commands"].as_array().unwrap().len(), 2);
    let v = env.run_err(&["command", "retire", &a]);
    assert_eq!(v["error"]["code"], "COMMAND_NOT_FOUND");
}

#[test]
fn test_command_environment_scoping() {
    let env = TestEnv::new();
    setup_project(&env);
    env.run_ok(&["env", "add", "prod"]);

    let v = env.run_ok(&[
        "command", "add", "warm-cache", "--plan", "deploy", "--stage", "activate",
        "--timing", "after", "--script", "echo warm", "--env", "prod",
    ]);
    let environments = v["data"]["command"]["environments"].as_array().unwrap();
    assert_eq!(environments.len(), 1);
    assert_eq!(environments[0]["name"], "prod");

    let v = env.run_err(&[
        "command", "add", "x", "--plan", "deploy", "--stage", "activate",
        "--timing", "after", "--script", "s", "--env", "nope",
    ]);
    assert_eq!(v["error"]["code"], "ENVIRONMENT_NOT_FOUND");

    // Patterns are build-side only
    let v = env.run_err(&[
        "command", "add", "x", "--plan", "deploy", "--stage", "activate",
        "--timing", "after", "--script", "s", "--pattern", "dist",
    ]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
}

// ─── 5. task lifecycle ─────────────────────────────────────────────

#[test]
fn test_task_create_queued_enqueues_dispatch() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &["--reason", "ship it"]);
    let v = env.run_ok(&["task", "show", &id]);
    assert_eq!(v["data"]["task"]["status"], "queued");
    assert_eq!(v["data"]["task"]["branch"], "main");
    assert_eq!(v["data"]["task"]["jobs"], serde_json::json!(["create_task"]));
    assert!(v["data"]["task"]["started_at"].is_null());
}

#[test]
fn test_draft_task_and_promotion() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &["--draft"]);
    let v = env.run_ok(&["task", "show", &id]);
    assert_eq!(v["data"]["task"]["status"], "draft");
    assert_eq!(v["data"]["task"]["jobs"].as_array().unwrap().len(), 0);

    let v = env.run_ok(&["task", "deploy", &id]);
    assert_eq!(v["data"]["promoted"], true);
    assert_eq!(v["data"]["task"]["status"], "queued");
    assert_eq!(
        v["data"]["task"]["jobs"],
        serde_json::json!(["deploy_draft"])
    );

    // Promoting again is a no-op, not an error
    let v = env.run_ok(&["task", "deploy", &id]);
    assert_eq!(v["data"]["promoted"], false);
    assert_eq!(v["data"]["task"]["jobs"].as_array().unwrap().len(), 1);
}

#[test]
fn test_begin_seeds_pending_logs_per_server() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &[]);
    let v = env.run_ok(&["task", "begin", &id]);
    assert_eq!(v["data"]["task"]["status"], "running");
    assert!(v["data"]["task"]["started_at"].is_string());
    // Four do-steps, three servers each (two in prod plus the cabinet)
    assert_eq!(v["data"]["steps"], 4);
    assert_eq!(v["data"]["logs"], 12);

    let v = env.run_ok(&["task", "show", &id]);
    let logs = v["data"]["logs"].as_array().unwrap();
    assert_eq!(logs.len(), 12);
    for log in logs {
        assert_eq!(log["status"], 1);
        assert_eq!(log["status_name"], "pending");
        assert!(log["runtime"].is_null());
    }
    assert_eq!(v["data"]["log_progress"]["pending"], 12);

    // First clone-step log carries the environment name; repeats are
    // suppressed within the step
    assert_eq!(logs[0]["step_label"], "clone");
    assert_eq!(logs[0]["environment_name"], "prod");
    assert!(logs[1]["environment_name"].is_null());
    assert!(logs[2]["environment_name"].is_null());

    // The cabinet server is flagged; environment servers are not
    let cabinet_flags: Vec<bool> = logs[..3]
        .iter()
        .map(|l| l["cabinet"].as_bool().unwrap())
        .collect();
    assert_eq!(cabinet_flags, vec![false, false, true]);

    // The name re-appears on the next step
    assert_eq!(logs[3]["step_label"], "install");
    assert_eq!(logs[3]["environment_name"], "prod");
}

#[test]
fn test_optional_commands_gate_their_step() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let optional_id = add_command(&env, "seed-db", "install", "before", &["--optional"]);

    // Not selected: the before-install step is skipped
    let id = create_deploy_task(&env, &[]);
    let v = env.run_ok(&["task", "begin", &id]);
    assert_eq!(v["data"]["steps"], 4);

    // Selected: the step materializes
    let id = create_deploy_task(&env, &["--optional", &optional_id]);
    let v = env.run_ok(&["task", "begin", &id]);
    assert_eq!(v["data"]["steps"], 5);
}

#[test]
fn test_task_create_rejects_bad_selections() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let required = add_command(&env, "always", "install", "before", &[]);
    let v = env.run_err(&[
        "task", "create", "--plan", "deploy", "--env", "prod", "--optional", &required,
    ]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");

    let v = env.run_err(&[
        "task", "create", "--plan", "deploy", "--env", "prod", "--optional", "01UNKNOWN",
    ]);
    assert_eq!(v["error"]["code"], "COMMAND_NOT_FOUND");

    let v = env.run_err(&["task", "create", "--plan", "deploy", "--env", "nope"]);
    assert_eq!(v["error"]["code"], "ENVIRONMENT_NOT_FOUND");

    let v = env.run_err(&[
        "task", "create", "--plan", "deploy", "--env", "prod", "--payload", "{not json",
    ]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
}

#[test]
fn test_abort_is_two_phase_and_idempotent() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &[]);
    env.run_ok(&["task", "begin", &id]);

    let v = env.run_ok(&["task", "abort", &id]);
    assert_eq!(v["data"]["abort_requested"], true);
    assert_eq!(v["data"]["task"]["status"], "aborting");

    // Second abort: status unchanged, no second cancellation job
    let v = env.run_ok(&["task", "abort", &id]);
    assert_eq!(v["data"]["abort_requested"], false);
    assert_eq!(v["data"]["task"]["status"], "aborting");
    let jobs = v["data"]["task"]["jobs"].as_array().unwrap();
    let aborts = jobs.iter().filter(|j| *j == "abort_task").count();
    assert_eq!(aborts, 1);

    // Worker confirms: aborted, open logs cancelled
    let v = env.run_ok(&["task", "aborted", &id]);
    assert_eq!(v["data"]["task"]["status"], "aborted");
    assert_eq!(v["data"]["cancelled_logs"], 12);

    let v = env.run_ok(&["task", "show", &id]);
    for log in v["data"]["logs"].as_array().unwrap() {
        assert_eq!(log["status"], 4);
    }
}

#[test]
fn test_abort_on_finished_task_is_noop() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &[]);
    env.run_ok(&["task", "begin", &id]);
    env.run_ok(&["task", "complete", &id]);

    let v = env.run_ok(&["task", "abort", &id]);
    assert_eq!(v["data"]["abort_requested"], false);
    assert_eq!(v["data"]["task"]["status"], "completed");

    // Aborting a draft is a real error, not a silent no-op
    let draft = create_deploy_task(&env, &["--draft"]);
    let v = env.run_err(&["task", "abort", &draft]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");
}

#[test]
fn test_invalid_task_transitions() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &[]);
    let v = env.run_err(&["task", "complete", &id]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");
    let v = env.run_err(&["task", "aborted", &id]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");

    env.run_ok(&["task", "begin", &id]);
    let v = env.run_err(&["task", "begin", &id]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");

    env.run_ok(&["task", "fail", &id]);
    let v = env.run_err(&["task", "complete", &id]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");
}

// ─── 6. per-server logs ────────────────────────────────────────────

#[test]
fn test_log_lifecycle_and_runtime() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &[]);
    env.run_ok(&["task", "begin", &id]);

    let v = env.run_ok(&["task", "show", &id]);
    let log_id = v["data"]["logs"][0]["log_id"].as_str().unwrap().to_string();

    let v = env.run_ok(&["log", "start", &log_id]);
    assert_eq!(v["data"]["log"]["status"], 2);
    // Started but not finished: no runtime yet
    assert!(v["data"]["log"]["runtime"].is_null());

    let v = env.run_ok(&["log", "finish", &log_id, "--output", "cloned"]);
    assert_eq!(v["data"]["log"]["status"], 0);
    assert!(v["data"]["log"]["runtime"].is_i64());

    let v = env.run_ok(&["log", "show", &log_id]);
    assert_eq!(v["data"]["log"]["output"], "cloned");

    // A pending log cannot finish, a finished log cannot restart
    let v = env.run_ok(&["task", "show", &id]);
    let other = v["data"]["logs"][1]["log_id"].as_str().unwrap().to_string();
    let v = env.run_err(&["log", "finish", &other]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");
    let v = env.run_err(&["log", "start", &log_id]);
    assert_eq!(v["error"]["code"], "INVALID_STATUS_TRANSITION");
}

#[test]
fn test_partial_failure_stays_per_server() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let id = create_deploy_task(&env, &[]);
    env.run_ok(&["task", "begin", &id]);

    let v = env.run_ok(&["task", "show", &id]);
    let first = v["data"]["logs"][0]["log_id"].as_str().unwrap().to_string();
    let second = v["data"]["logs"][1]["log_id"].as_str().unwrap().to_string();

    env.run_ok(&["log", "start", &first]);
    env.run_ok(&["log", "finish", &first]);
    env.run_ok(&["log", "start", &second]);
    env.run_ok(&["log", "finish", &second, "--failed", "--output", "boom"]);
    env.run_ok(&["task", "fail", &id]);

    let v = env.run_ok(&["task", "show", &id]);
    assert_eq!(v["data"]["task"]["status"], "failed");
    let progress = &v["data"]["log_progress"];
    assert_eq!(progress["completed"], 1);
    assert_eq!(progress["failed"], 1);
    assert_eq!(progress["pending"], 10);
}

#[test]
fn test_build_task_runs_on_agents() {
    let env = TestEnv::new();
    setup_project(&env);
    env.run_ok(&["server", "add", "agent-1", "--host", "10.0.0.5", "--plan", "build"]);

    let v = env.run_ok(&["task", "create", "--plan", "build"]);
    let id = v["data"]["task"]["id"].as_str().unwrap().to_string();
    let v = env.run_ok(&["task", "begin", &id]);
    // prepare, build, test, result on one agent
    assert_eq!(v["data"]["steps"], 4);
    assert_eq!(v["data"]["logs"], 4);

    let v = env.run_ok(&["task", "show", &id]);
    let logs = v["data"]["logs"].as_array().unwrap();
    assert_eq!(logs[0]["step_label"], "prepare");
    for log in logs {
        assert_eq!(log["environment_name"], "agent");
        assert_eq!(log["cabinet"], false);
    }

    // Environments apply to deploy tasks only
    env.run_ok(&["env", "add", "prod"]);
    let v = env.run_err(&["task", "create", "--plan", "build", "--env", "prod"]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
}

// ─── 7. listing, rollback, releases ────────────────────────────────

#[test]
fn test_latest_listing_excludes_unstarted_tasks() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    let started = create_deploy_task(&env, &[]);
    let _queued = create_deploy_task(&env, &[]);
    let _draft = create_deploy_task(&env, &["--draft"]);
    env.run_ok(&["task", "begin", &started]);

    let v = env.run_ok(&["task", "list"]);
    let tasks = v["data"]["tasks"].as_array().unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0]["id"], started.as_str());

    let v = env.run_ok(&["task", "list", "--all"]);
    assert_eq!(v["data"]["tasks"].as_array().unwrap().len(), 3);
}

#[test]
fn test_rollback_clones_without_touching_original() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);
    env.run_ok(&["env", "add", "staging"]);

    let original = create_deploy_task(&env, &[
        "--commit", "abc123def4567890", "--env", "staging", "--payload", "{\"source\":\"tag\"}",
    ]);
    env.run_ok(&["task", "begin", &original]);
    env.run_ok(&["task", "complete", &original]);

    let v = env.run_ok(&["task", "rollback", &original, "--reason", "regression"]);
    let rollback = &v["data"]["task"];
    assert_ne!(rollback["id"], original.as_str());
    assert_eq!(rollback["status"], "queued");
    assert_eq!(rollback["branch"], "main");
    assert_eq!(rollback["commit"], "abc123def4567890");
    assert_eq!(rollback["payload"], "{\"source\":\"tag\"}");

    let reason = rollback["reason"].as_str().unwrap();
    assert!(reason.contains(&original));
    assert!(reason.contains("abc123d"));
    assert!(reason.contains("regression"));

    let envs: Vec<&str> = rollback["environments"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(envs, vec!["prod", "staging"]);

    // The original task is untouched
    let v = env.run_ok(&["task", "show", &original]);
    assert_eq!(v["data"]["task"]["status"], "completed");
    assert!(v["data"]["task"]["reason"].is_null());
}

#[test]
fn test_release_flow() {
    let env = TestEnv::new();
    setup_project(&env);
    env.run_ok(&["server", "add", "agent-1", "--host", "10.0.0.5", "--plan", "build"]);

    let v = env.run_ok(&["task", "create", "--plan", "build"]);
    let build = v["data"]["task"]["id"].as_str().unwrap().to_string();

    // Only completed builds are releasable
    let v = env.run_err(&["release", "add", &build]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");

    env.run_ok(&["task", "begin", &build]);
    env.run_ok(&["task", "complete", &build]);

    let v = env.run_ok(&["release", "add", &build]);
    assert_eq!(v["data"]["release"]["name"], "Release-1");
    let v = env.run_ok(&["release", "add", &build, "--name", "v2.0"]);
    assert_eq!(v["data"]["release"]["name"], "v2.0");
    let release_id = v["data"]["release"]["id"].as_str().unwrap().to_string();

    let v = env.run_ok(&["release", "list"]);
    assert_eq!(v["data"]["releases"].as_array().unwrap().len(), 2);

    env.run_ok(&["release", "remove", &release_id]);
    let v = env.run_ok(&["release", "list"]);
    assert_eq!(v["data"]["releases"].as_array().unwrap().len(), 1);

    // Deploy tasks cannot be released
    setup_deploy_servers(&env);
    let deploy = create_deploy_task(&env, &[]);
    env.run_ok(&["task", "begin", &deploy]);
    env.run_ok(&["task", "complete", &deploy]);
    let v = env.run_err(&["release", "add", &deploy]);
    assert_eq!(v["error"]["code"], "VALIDATION_ERROR");
}

// ─── 8. text output smoke ──────────────────────────────────────────

#[test]
fn test_text_output() {
    let env = TestEnv::new();
    setup_project(&env);
    setup_deploy_servers(&env);

    env.cmd()
        .args(["project", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo"));

    let id = create_deploy_task(&env, &[]);
    env.run_ok(&["task", "begin", &id]);
    env.cmd()
        .args(["task", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("running"))
        .stdout(predicate::str::contains("clone"));
}
