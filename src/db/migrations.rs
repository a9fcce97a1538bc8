use rusqlite::Connection;

use crate::error::ShipwayError;

pub fn run_migrations(conn: &Connection) -> Result<(), ShipwayError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            repository TEXT NOT NULL,
            branch TEXT NOT NULL DEFAULT 'master',
            description TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS build_plans (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS deploy_plans (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS environments (
            id TEXT PRIMARY KEY,
            deploy_plan_id TEXT NOT NULL REFERENCES deploy_plans(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (deploy_plan_id, name)
        );

        CREATE TABLE IF NOT EXISTS servers (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            host TEXT NOT NULL,
            targetable_type TEXT NOT NULL
                CHECK (targetable_type IN ('environment', 'build_plan', 'deploy_plan')),
            targetable_id TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS commands (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            user TEXT,
            script TEXT NOT NULL,
            targetable_type TEXT NOT NULL CHECK (targetable_type IN ('build', 'deploy')),
            targetable_id TEXT NOT NULL,
            step INTEGER NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            optional INTEGER NOT NULL DEFAULT 0,
            default_on INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            deleted_at TEXT
        );

        CREATE TABLE IF NOT EXISTS command_environments (
            command_id TEXT NOT NULL REFERENCES commands(id) ON DELETE CASCADE,
            environment_id TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
            PRIMARY KEY (command_id, environment_id)
        );

        CREATE TABLE IF NOT EXISTS patterns (
            id TEXT PRIMARY KEY,
            build_plan_id TEXT NOT NULL REFERENCES build_plans(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            copy_pattern TEXT NOT NULL,
            UNIQUE (build_plan_id, name)
        );

        CREATE TABLE IF NOT EXISTS command_patterns (
            command_id TEXT NOT NULL REFERENCES commands(id) ON DELETE CASCADE,
            pattern_id TEXT NOT NULL REFERENCES patterns(id) ON DELETE CASCADE,
            PRIMARY KEY (command_id, pattern_id)
        );

        CREATE TABLE IF NOT EXISTS variables (
            id TEXT PRIMARY KEY,
            targetable_type TEXT NOT NULL CHECK (targetable_type IN ('build', 'deploy')),
            targetable_id TEXT NOT NULL,
            name TEXT NOT NULL,
            value TEXT NOT NULL,
            UNIQUE (targetable_type, targetable_id, name)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            targetable_type TEXT NOT NULL CHECK (targetable_type IN ('build', 'deploy')),
            targetable_id TEXT NOT NULL,
            user TEXT,
            branch TEXT NOT NULL,
            commit_hash TEXT,
            reason TEXT,
            payload TEXT,
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'queued', 'running', 'completed',
                                  'failed', 'aborting', 'aborted')),
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            started_at TEXT,
            finished_at TEXT
        );

        CREATE TABLE IF NOT EXISTS task_environments (
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            environment_id TEXT NOT NULL REFERENCES environments(id) ON DELETE CASCADE,
            PRIMARY KEY (task_id, environment_id)
        );

        CREATE TABLE IF NOT EXISTS task_optional_commands (
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            command_id TEXT NOT NULL REFERENCES commands(id) ON DELETE CASCADE,
            PRIMARY KEY (task_id, command_id)
        );

        CREATE TABLE IF NOT EXISTS task_steps (
            id TEXT PRIMARY KEY,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            step INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS server_logs (
            id TEXT PRIMARY KEY,
            task_step_id TEXT NOT NULL REFERENCES task_steps(id) ON DELETE CASCADE,
            server_id TEXT NOT NULL REFERENCES servers(id) ON DELETE CASCADE,
            environment_id TEXT REFERENCES environments(id) ON DELETE SET NULL,
            status INTEGER NOT NULL DEFAULT 1 CHECK (status IN (0, 1, 2, 3, 4)),
            output TEXT,
            started_at TEXT,
            finished_at TEXT,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS releases (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS job_outbox (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
            job TEXT NOT NULL CHECK (job IN ('create_task', 'deploy_draft', 'abort_task')),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_commands_target_step
            ON commands(targetable_type, targetable_id, step);
        CREATE INDEX IF NOT EXISTS idx_servers_target
            ON servers(targetable_type, targetable_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_target_started
            ON tasks(targetable_type, targetable_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_task_steps_task ON task_steps(task_id, step);
        CREATE INDEX IF NOT EXISTS idx_server_logs_step ON server_logs(task_step_id);
        CREATE INDEX IF NOT EXISTS idx_outbox_task ON job_outbox(task_id);
        ",
    )?;
    Ok(())
}
