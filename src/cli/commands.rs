use clap::{Parser, Subcommand};

const VERSION: &str = env!("GIT_VERSION");

#[derive(Parser)]
#[command(
    name = "shipway",
    version = VERSION,
    about = "Deployment pipeline management CLI",
    after_help = "\
NOTE:
  Requires a git repository. DB is stored at <git-root>/.shipway/shipway.db
  Run `shipway init` before any other command.

EXIT CODES:
  0  Success
  1  Error (DB, validation, invalid transition, etc.)

TASK LIFECYCLE:
  draft → queued → running → completed | failed
  queued/running → aborting → aborted (two-phase: abort is requested
  synchronously, confirmed by the worker). Aborting a task that is already
  aborting or finished is a no-op.

WORKER VERBS:
  `task begin/complete/fail/aborted` and `log start/finish` are driven by
  the external executor, not by operators. `task begin` materializes the
  per-server step logs in PENDING state."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Specify project by name or ID
    #[arg(long, global = true)]
    pub project: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize shipway in this repository
    Init,

    /// Project management
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Deploy environments of the active project
    #[command(subcommand)]
    Env(EnvCommands),

    /// Servers attached to environments or plans
    #[command(subcommand)]
    Server(ServerCommands),

    /// File-copy patterns of the build plan
    #[command(subcommand)]
    Pattern(PatternCommands),

    /// Plan variables
    #[command(subcommand)]
    Var(VarCommands),

    /// Before/after commands of the plan stages
    #[command(subcommand)]
    Command(CommandCommands),

    /// Build and deploy tasks
    #[command(subcommand)]
    Task(TaskCommands),

    /// Per-server step logs (worker verbs)
    #[command(subcommand)]
    Log(LogCommands),

    /// Releases cut from completed build tasks
    #[command(subcommand)]
    Release(ReleaseCommands),
}

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Create a project with its build and deploy plan skeleton
    Add {
        /// Project name (slug: lowercase alphanumeric with hyphens)
        name: String,
        #[arg(long)]
        repository: String,
        /// Default branch (defaults to master)
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List all projects
    List,
    /// Show project details
    Show {
        /// Project name or ID
        reference: String,
    },
    /// Set the active project
    Activate {
        /// Project name
        name: String,
    },
    /// Delete a project and everything it owns
    Delete {
        /// Project name or ID
        reference: String,
    },
}

#[derive(Subcommand)]
pub enum EnvCommands {
    /// Add an environment to the deploy plan
    Add {
        name: String,
    },
    /// List environments
    List,
    /// Remove an environment
    Remove {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum ServerCommands {
    /// Add a server to an environment (--env) or directly to a plan (--plan)
    Add {
        name: String,
        #[arg(long)]
        host: String,
        /// Attach to a deploy environment by name
        #[arg(long)]
        env: Option<String>,
        /// Attach directly to a plan: 'deploy' (cabinet pool) or 'build' (agent)
        #[arg(long)]
        plan: Option<String>,
    },
    /// List servers of the active project
    List,
    /// Remove a server
    Remove {
        /// Server ID or prefix
        id: String,
    },
}

#[derive(Subcommand)]
pub enum PatternCommands {
    /// Add a file-copy pattern to the build plan
    Add {
        name: String,
        /// Glob of files to copy
        #[arg(long)]
        copy: String,
    },
    /// List patterns
    List,
    /// Remove a pattern (hard delete)
    Remove {
        name: String,
    },
}

#[derive(Subcommand)]
pub enum VarCommands {
    /// Set a variable on a plan
    Set {
        name: String,
        value: String,
        /// 'build' or 'deploy'
        #[arg(long, default_value = "deploy")]
        plan: String,
    },
    /// List variables of a plan
    List {
        #[arg(long, default_value = "deploy")]
        plan: String,
    },
    /// Remove a variable
    Unset {
        name: String,
        #[arg(long, default_value = "deploy")]
        plan: String,
    },
}

#[derive(Subcommand)]
pub enum CommandCommands {
    /// Add a before/after command to a plan stage
    #[command(after_help = "\
NOTE:
  Deploy stages: clone, install, activate, purge.
  Build stages: prepare, build, test, result.
  Only before/after commands can be created; each stage's 'do' action
  is built in. New commands append to their (plan, step) group.")]
    Add {
        name: String,
        /// 'build' or 'deploy'
        #[arg(long)]
        plan: String,
        /// Stage keyword
        #[arg(long)]
        stage: String,
        /// 'before' or 'after'
        #[arg(long)]
        timing: String,
        /// The shell script to run
        #[arg(long)]
        script: String,
        /// Run as this user on the server
        #[arg(long)]
        user: Option<String>,
        /// Users may opt out at task-creation time
        #[arg(long)]
        optional: bool,
        /// Default state of the optional toggle
        #[arg(long)]
        default_on: bool,
        /// Restrict to these environments (deploy commands)
        #[arg(long = "env")]
        envs: Vec<String>,
        /// Restrict to these patterns (build commands)
        #[arg(long = "pattern")]
        patterns: Vec<String>,
    },
    /// List the before/after commands surrounding a stage
    List {
        /// Stage keyword
        stage: String,
        /// 'build' or 'deploy'
        #[arg(long)]
        plan: Option<String>,
    },
    /// Update a command
    Update {
        /// Command ID or prefix
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        script: Option<String>,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        optional: Option<bool>,
        #[arg(long)]
        default_on: Option<bool>,
        #[arg(long = "env")]
        envs: Option<Vec<String>>,
        #[arg(long = "pattern")]
        patterns: Option<Vec<String>>,
    },
    /// Re-generate the order of the supplied commands (all-or-nothing)
    Reorder {
        /// Command IDs in the desired order
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Retire a command (recoverable tombstone)
    Retire {
        id: String,
    },
    /// Restore a retired command
    Restore {
        id: String,
    },
    /// Permanently delete a command
    Purge {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task (queued, or draft with --draft)
    Create {
        /// 'build' or 'deploy'
        #[arg(long)]
        plan: String,
        /// Branch to build/deploy (defaults to the project branch)
        #[arg(long)]
        branch: Option<String>,
        /// Explicit commit hash
        #[arg(long)]
        commit: Option<String>,
        #[arg(long)]
        reason: Option<String>,
        /// JSON payload of request parameters
        #[arg(long)]
        payload: Option<String>,
        /// Triggering user
        #[arg(long)]
        user: Option<String>,
        /// Create as a draft; promote later with `task deploy`
        #[arg(long)]
        draft: bool,
        /// Deploy to these environments
        #[arg(long = "env")]
        envs: Vec<String>,
        /// Enable these optional commands
        #[arg(long = "optional")]
        optional: Vec<String>,
    },
    /// List the latest started tasks of a plan
    List {
        /// 'build' or 'deploy'
        #[arg(long, default_value = "deploy")]
        plan: String,
        #[arg(long, default_value = "15")]
        limit: i64,
        /// Include drafts and never-started tasks
        #[arg(long)]
        all: bool,
    },
    /// Show a task with its per-server step logs
    Show {
        /// Task ID or prefix
        id: String,
    },
    /// Promote a draft to queued (no-op on non-drafts)
    Deploy {
        id: String,
    },
    /// Create a new task re-running a previous one
    Rollback {
        /// The task to roll back to
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Request an abort (no-op if already aborting or finished)
    Abort {
        id: String,
    },
    /// Worker: begin execution, materializing PENDING step logs
    Begin {
        id: String,
    },
    /// Worker: mark a running task completed
    Complete {
        id: String,
    },
    /// Worker: mark a running task failed
    Fail {
        id: String,
    },
    /// Worker: confirm an abort, cancelling open logs
    Aborted {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum LogCommands {
    /// Worker: mark a pending log running
    Start {
        /// Log ID or prefix
        id: String,
    },
    /// Worker: finish a running log
    Finish {
        id: String,
        #[arg(long)]
        failed: bool,
        /// Captured command output
        #[arg(long)]
        output: Option<String>,
    },
    /// Show one log
    Show {
        id: String,
    },
}

#[derive(Subcommand)]
pub enum ReleaseCommands {
    /// Cut a release from a completed build task
    Add {
        /// Task ID or prefix
        task: String,
        /// Release name (defaults to Release-<n>)
        #[arg(long)]
        name: Option<String>,
    },
    /// List releases of the active project
    List,
    /// Remove a release (hard delete)
    Remove {
        /// Release ID or prefix
        id: String,
    },
}
