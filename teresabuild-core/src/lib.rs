//! teresabuild-core - cluster deployment steps for the teresa CLI
//!
//! A run configures a cluster context, logs in, and executes one user
//! command, all by shelling out to `teresa` through a [`CommandExecutor`].
//! Output goes to a [`LineSink`] standing in for the build log.

pub mod config;
pub mod error;
pub mod executor;
pub mod runner;
pub mod settings;
pub mod sink;
pub mod step;

pub use config::{DeploymentConfig, Secret};
pub use error::{FieldError, RunError, SettingsError, ValidationError};
pub use executor::{CommandExecutor, ExitStatus, MockExecutor, ProcessExecutor};
pub use runner::{ClusterCommandRunner, RunReport, StepOutcome};
pub use settings::{Overrides, Settings};
pub use sink::{LineSink, MemorySink, RedactingSink, TracingSink, WriterSink};
pub use step::{plan, CliProgram, CommandLine, Invocation, Step, DEFAULT_CLI};
