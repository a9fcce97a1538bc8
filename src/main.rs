use clap::Parser;
use std::process;

use shipway::cli;
use shipway::cli::commands::{Cli, Commands};

fn main() {
    let cli_args = Cli::parse();
    let json_output = cli_args.json;
    let project_flag = cli_args.project.clone();
    let project = project_flag.as_deref();

    let exit_code = match cli_args.command {
        Commands::Init => cli::init::run(json_output),
        Commands::Project(cmd) => cli::project::run(cmd, json_output),
        Commands::Env(cmd) => cli::infra::run_env(cmd, json_output, project),
        Commands::Server(cmd) => cli::infra::run_server(cmd, json_output, project),
        Commands::Pattern(cmd) => cli::infra::run_pattern(cmd, json_output, project),
        Commands::Var(cmd) => cli::infra::run_var(cmd, json_output, project),
        Commands::Command(cmd) => cli::command::run(cmd, json_output, project),
        Commands::Task(cmd) => cli::task::run(cmd, json_output, project),
        Commands::Log(cmd) => cli::log::run(cmd, json_output),
        Commands::Release(cmd) => cli::release::run(cmd, json_output, project),
    };

    process::exit(exit_code);
}
