/// Structured error types for teresabuild-core.
///
/// Uses `thiserror` so library callers can match on what went wrong.
/// The binary crate (teresabuild-cli) wraps these in `anyhow` for reporting.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::step::Step;

/// A single required field that failed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// One or more configuration fields are empty
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid configuration: {}", display_fields(.fields))]
pub struct ValidationError {
    pub fields: Vec<FieldError>,
}

impl ValidationError {
    /// Whether the given field is among the failures
    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }
}

fn display_fields(fields: &[FieldError]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Failure of a cluster command run
#[derive(Error, Debug)]
pub enum RunError {
    /// Config rejected before any command was issued
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Process could not be spawned or driven
    #[error("step '{step}' could not be executed: {source}")]
    Io {
        step: Step,
        #[source]
        source: io::Error,
    },

    /// Command exited with a non-zero status
    #[error("step '{step}' failed with exit code {exit_code}")]
    StepFailed { step: Step, exit_code: i32 },

    /// Panic raised while the step was running
    #[error("step '{step}' failed unexpectedly: {message}")]
    Unexpected { step: Step, message: String },

    #[error("step '{step}' timed out after {limit:?}")]
    TimedOut { step: Step, limit: Duration },

    #[error("step '{step}' was cancelled")]
    Cancelled { step: Step },
}

impl RunError {
    pub fn io(step: Step, source: io::Error) -> Self {
        Self::Io { step, source }
    }

    pub fn step_failed(step: Step, exit_code: i32) -> Self {
        Self::StepFailed { step, exit_code }
    }

    pub fn unexpected(step: Step, message: impl Into<String>) -> Self {
        Self::Unexpected {
            step,
            message: message.into(),
        }
    }

    /// Step the run stopped at (None for validation failures)
    pub fn step(&self) -> Option<Step> {
        match self {
            Self::Validation(_) => None,
            Self::Io { step, .. }
            | Self::StepFailed { step, .. }
            | Self::Unexpected { step, .. }
            | Self::TimedOut { step, .. }
            | Self::Cancelled { step } => Some(*step),
        }
    }

    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::StepFailed { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }
}

/// Settings file could not be loaded
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse settings file {path:?} (invalid TOML): {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to write settings file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid cli program {value:?}: {reason}")]
    InvalidProgram { value: String, reason: String },
}
