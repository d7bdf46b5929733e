//! Steps of a run and the command lines they invoke
//!
//! Every run issues the same five invocations, in this order:
//!
//! ```text
//! <cli> version
//! <cli> config set-cluster {cluster} -s {server}
//! <cli> config use-cluster {cluster}
//! <cli> login --user {login}        (password on stdin)
//! {command}                         (through the shell)
//! ```

use std::fmt;
use std::str::FromStr;

use crate::config::{DeploymentConfig, Secret};
use crate::error::SettingsError;

/// Default program name of the teresa CLI
pub const DEFAULT_CLI: &str = "teresa";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Version,
    SetCluster,
    UseCluster,
    Login,
    Command,
}

impl Step {
    pub const ALL: [Step; 5] = [
        Step::Version,
        Step::SetCluster,
        Step::UseCluster,
        Step::Login,
        Step::Command,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Step::Version => "version",
            Step::SetCluster => "set-cluster",
            Step::UseCluster => "use-cluster",
            Step::Login => "login",
            Step::Command => "command",
        }
    }

    /// Whether a non-zero exit aborts the run
    ///
    /// `version` is diagnostic only.
    pub fn is_fatal(self) -> bool {
        !matches!(self, Step::Version)
    }

    /// Whether child output is forwarded to the build log
    pub fn streams_output(self) -> bool {
        matches!(self, Step::Version | Step::Command)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// The teresa executable plus any leading arguments
///
/// Parsed with POSIX shell rules, so `"teresa --profile ci"` becomes program
/// `teresa` with one extra argument pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliProgram {
    program: String,
    args: Vec<String>,
}

impl CliProgram {
    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    fn invoke<I, S>(&self, subcommand: I) -> CommandLine
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = self.args.clone();
        args.extend(subcommand.into_iter().map(Into::into));
        CommandLine::Program {
            program: self.program.clone(),
            args,
        }
    }
}

impl Default for CliProgram {
    fn default() -> Self {
        Self {
            program: DEFAULT_CLI.to_string(),
            args: Vec::new(),
        }
    }
}

impl FromStr for CliProgram {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SettingsError::InvalidProgram {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let mut words = shlex::split(value).ok_or_else(|| invalid("unbalanced quotes"))?;
        if words.is_empty() {
            return Err(invalid("program is empty"));
        }
        let program = words.remove(0);
        Ok(Self {
            program,
            args: words,
        })
    }
}

impl fmt::Display for CliProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// How a step's process is started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandLine {
    /// Spawned directly, each argument passed as-is
    Program { program: String, args: Vec<String> },
    /// Handed verbatim to the platform shell
    Shell(String),
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandLine::Program { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
            CommandLine::Shell(script) => f.write_str(script),
        }
    }
}

/// One step, ready to hand to a [`crate::executor::CommandExecutor`]
#[derive(Debug, Clone)]
pub struct Invocation<'a> {
    pub step: Step,
    pub command_line: CommandLine,
    /// Written to the child's stdin, followed by a newline
    pub stdin: Option<&'a Secret>,
    pub stream_output: bool,
}

impl<'a> Invocation<'a> {
    fn new(step: Step, command_line: CommandLine) -> Self {
        Self {
            step,
            command_line,
            stdin: None,
            stream_output: step.streams_output(),
        }
    }
}

/// Build the full invocation sequence for a config without running anything
pub fn plan<'a>(cli: &CliProgram, config: &'a DeploymentConfig) -> Vec<Invocation<'a>> {
    let mut login = Invocation::new(
        Step::Login,
        cli.invoke(["login", "--user", config.login()]),
    );
    login.stdin = Some(config.password());

    vec![
        Invocation::new(Step::Version, cli.invoke(["version"])),
        Invocation::new(
            Step::SetCluster,
            cli.invoke([
                "config",
                "set-cluster",
                config.cluster_name(),
                "-s",
                config.server(),
            ]),
        ),
        Invocation::new(
            Step::UseCluster,
            cli.invoke(["config", "use-cluster", config.cluster_name()]),
        ),
        login,
        Invocation::new(
            Step::Command,
            CommandLine::Shell(config.command().to_string()),
        ),
    ]
}
