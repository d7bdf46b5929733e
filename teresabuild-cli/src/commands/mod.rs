//! Command implementations for the teresabuild CLI

pub mod plan;
pub mod run;
pub mod validate;

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use teresabuild_core::{CliProgram, DeploymentConfig, Overrides, Secret, Settings};

pub use plan::run_plan;
pub use run::run_step;
pub use validate::run_validate;

/// Step fields shared by `run`, `validate`, and `plan`
///
/// Flags override the settings file; each flag falls back to its env var.
#[derive(Args, Debug, Default)]
pub struct StepArgs {
    /// Settings file (default: ~/.teresabuild/config.toml when present)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Teresa user to log in as
    #[arg(long, env = "TERESA_LOGIN")]
    pub login: Option<String>,

    /// Teresa password (sent to `teresa login` on stdin)
    #[arg(long, env = "TERESA_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Read the password from the first line of stdin (wins over --password)
    #[arg(long)]
    pub password_stdin: bool,

    /// Teresa server URI
    #[arg(long, env = "TERESA_SERVER")]
    pub server: Option<String>,

    /// Name of the cluster context to configure and use
    #[arg(long, env = "TERESA_CLUSTER")]
    pub cluster_name: Option<String>,

    /// Shell command to execute once logged in
    #[arg(long, env = "TERESA_COMMAND")]
    pub command: Option<String>,

    /// Teresa executable, optionally with leading arguments
    #[arg(long, env = "TERESA_CLI", value_name = "PROGRAM")]
    pub cli: Option<String>,

    /// Per-step timeout in seconds (0 disables)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// Fully resolved inputs for one run
pub struct Resolved {
    pub config: DeploymentConfig,
    pub cli: CliProgram,
    pub timeout: Option<std::time::Duration>,
}

impl StepArgs {
    pub fn resolve(self) -> Result<Resolved> {
        let settings = Settings::load_or_default(self.config.as_deref())
            .context("Failed to load settings")?;

        let password = if self.password_stdin {
            Some(read_password_line()?)
        } else {
            self.password.map(Secret::from)
        };

        let cli = settings
            .cli_program(self.cli.as_deref())
            .context("Failed to parse --cli")?;
        let timeout = settings.step_timeout(self.timeout);

        let config = settings.resolve(Overrides {
            login: self.login,
            password,
            server: self.server,
            cluster_name: self.cluster_name,
            command: self.command,
        });

        Ok(Resolved {
            config,
            cli,
            timeout,
        })
    }
}

fn read_password_line() -> Result<Secret> {
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    let trimmed = line.trim_end_matches(['\n', '\r']).len();
    line.truncate(trimmed);
    Ok(Secret::new(line))
}
