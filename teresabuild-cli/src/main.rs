//! teresabuild CLI - deploy to a teresa cluster from a CI build step
//!
//! Configures a cluster context, logs in, and runs one command through the
//! `teresa` CLI:
//! - `run`: execute the step, streaming the build log to stdout
//! - `validate`: check the required fields without running anything
//! - `plan`: print the command lines a run would execute
//! - `config`: manage ~/.teresabuild/config.toml

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod config;
mod tracing_setup;

#[derive(Parser, Debug)]
#[command(
    name = "teresabuild",
    author,
    version,
    about = "CI build step for deploying through the teresa CLI",
    long_about = "Runs `teresa version`, configures and selects a cluster, logs in with the \
                  password on stdin, then executes your deployment command."
)]
struct Cli {
    /// Debug logging with targets (RUST_LOG still wins)
    #[arg(long, global = true)]
    debug: bool,

    /// Only warnings on stderr and no summary
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Configure the cluster, log in, and run the command
    Run(commands::run::RunArgs),
    /// Check that login, password, server, cluster name, and command are set
    Validate(commands::StepArgs),
    /// Print the command lines a run would execute, without executing them
    Plan(commands::StepArgs),
    /// Manage teresabuild settings (init, show, path)
    Config(config::ConfigArgs),
    /// Generate shell completion scripts
    Completions(CompletionsArgs),
}

#[derive(Parser, Debug)]
struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)] // PowerShell is a proper noun, not a suffix
enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

/// Load .env files before clap reads TERESA_* variables
fn load_env_files() {
    if let Some(home) = dirs::home_dir() {
        let _ = dotenvy::from_path(home.join(".teresabuild/.env"));
    }
    let _ = dotenvy::dotenv();
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env_files();
    let cli = Cli::parse();

    tracing_setup::init(&tracing_setup::TracingConfig {
        debug: cli.debug,
        quiet: cli.quiet,
    })
    .ok();

    match cli.command {
        Commands::Run(args) => commands::run_step(args, cli.quiet).await?,
        Commands::Validate(args) => commands::run_validate(args)?,
        Commands::Plan(args) => commands::run_plan(args)?,
        Commands::Config(args) => config::run_config(args)?,
        Commands::Completions(args) => run_completions(args)?,
    }
    Ok(())
}

fn run_completions(args: CompletionsArgs) -> Result<()> {
    use clap::CommandFactory;
    use clap_complete::{generate, Shell as CompletionShell};
    use std::io;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    let shell = match args.shell {
        Shell::Bash => CompletionShell::Bash,
        Shell::Zsh => CompletionShell::Zsh,
        Shell::Fish => CompletionShell::Fish,
        Shell::PowerShell => CompletionShell::PowerShell,
        Shell::Elvish => CompletionShell::Elvish,
    };

    generate(shell, &mut cmd, bin_name, &mut io::stdout());

    Ok(())
}
