use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::{DeploymentConfig, Secret};
use crate::error::SettingsError;
use crate::step::CliProgram;
use tracing::warn;

/// Settings file for teresabuild
///
/// Every value is optional; command-line flags fill or override them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cluster: ClusterSettings,
    #[serde(default)]
    pub credentials: CredentialSettings,
    #[serde(default)]
    pub step: StepSettings,
    #[serde(default)]
    pub cli: CliSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterSettings {
    pub server: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialSettings {
    pub login: Option<String>,
    /// Prefer `${TERESA_PASSWORD}` over a literal value
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepSettings {
    pub command: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliSettings {
    pub program: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Values supplied on the command line (or their env fallbacks)
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub login: Option<String>,
    pub password: Option<Secret>,
    pub server: Option<String>,
    pub cluster_name: Option<String>,
    pub command: Option<String>,
}

impl Settings {
    /// Settings file path: ~/.teresabuild/config.toml
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".teresabuild/config.toml")
    }

    /// Load and expand a settings file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load `path` if given, else the default file if it exists, else empty settings
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, SettingsError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::load(&default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, SettingsError> {
        let mut settings: Self = toml::from_str(content).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        settings.expand_variables(&env_vars());
        Ok(settings)
    }

    /// Expand ${var} references in every string value except the step command
    ///
    /// The command goes to the shell verbatim, so `${TAG:-latest}` and friends
    /// are left for the shell to expand.
    fn expand_variables(&mut self, vars: &HashMap<String, String>) {
        let fields = [
            ("cluster.server", &mut self.cluster.server),
            ("cluster.name", &mut self.cluster.name),
            ("credentials.login", &mut self.credentials.login),
            ("credentials.password", &mut self.credentials.password),
            ("cli.program", &mut self.cli.program),
        ];
        for (field, value) in fields {
            let Some(value) = value else { continue };
            *value = expand_string(value, vars);
            if value.contains("${") {
                warn!(field, "settings value has an unresolved ${{...}} reference");
            }
        }
    }

    /// Merge overrides on top of the file values
    pub fn resolve(&self, overrides: Overrides) -> DeploymentConfig {
        let pick = |flag: Option<String>, file: &Option<String>| {
            flag.or_else(|| file.clone()).unwrap_or_default()
        };

        let password = overrides.password.unwrap_or_else(|| {
            Secret::new(self.credentials.password.clone().unwrap_or_default())
        });

        DeploymentConfig::new(
            pick(overrides.login, &self.credentials.login),
            password,
            pick(overrides.server, &self.cluster.server),
            pick(overrides.cluster_name, &self.cluster.name),
            pick(overrides.command, &self.step.command),
        )
    }

    /// CLI program from the override or the file, defaulting to `teresa`
    pub fn cli_program(&self, program: Option<&str>) -> Result<CliProgram, SettingsError> {
        match program.or(self.cli.program.as_deref()) {
            Some(value) => value.parse(),
            None => Ok(CliProgram::default()),
        }
    }

    pub fn step_timeout(&self, timeout_secs: Option<u64>) -> Option<Duration> {
        timeout_secs
            .or(self.cli.timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    /// Copy with the password replaced by a mask, for display
    pub fn masked(&self) -> Self {
        let mut masked = self.clone();
        if let Some(password) = masked.credentials.password.as_mut() {
            if !password.is_empty() {
                *password = Secret::mask().to_string();
            }
        }
        masked
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Write a starter settings file
    pub fn write_template(path: &Path) -> Result<(), SettingsError> {
        let write_err = |source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, TEMPLATE).map_err(write_err)
    }
}

const TEMPLATE: &str = r#"# teresabuild settings
# Values may reference environment variables as ${NAME}.
# The step command is passed to the shell untouched.

[cluster]
server = "https://teresa.example.com"
name = "prod"

[credentials]
login = "deploy-bot"
password = "${TERESA_PASSWORD}"

[step]
command = "teresa deploy create . --app myapp"

[cli]
program = "teresa"
# timeout_secs = 600
"#;

fn env_vars() -> HashMap<String, String> {
    env::vars().collect()
}

/// Expand ${var} references in a string
///
/// Unknown references are left as-is.
fn expand_string(s: &str, vars: &HashMap<String, String>) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(start) = rest.find("${") {
        result.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                match vars.get(name) {
                    Some(value) => result.push_str(value),
                    None => result.push_str(&rest[start..start + end + 3]),
                }
                rest = &after[end + 1..];
            }
            None => {
                result.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    result.push_str(rest);
    result
}
