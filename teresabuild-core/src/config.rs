use std::fmt;

use crate::error::{FieldError, ValidationError};

const MASK: &str = "********";

/// Sensitive string that never prints its contents
///
/// The buffer is zeroed when the value is dropped.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the cleartext value
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Placeholder printed wherever the secret would appear
    pub fn mask() -> &'static str {
        MASK
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MASK)
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        let mut bytes = std::mem::take(&mut self.0).into_bytes();
        bytes.iter_mut().for_each(|b| *b = 0);
        std::hint::black_box(&bytes);
    }
}

/// Everything one run needs: credentials, target cluster, and the command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentConfig {
    login: String,
    password: Secret,
    server: String,
    cluster_name: String,
    command: String,
}

impl DeploymentConfig {
    pub fn new(
        login: impl Into<String>,
        password: impl Into<Secret>,
        server: impl Into<String>,
        cluster_name: impl Into<String>,
        command: impl Into<String>,
    ) -> Self {
        Self {
            login: login.into(),
            password: password.into(),
            server: server.into(),
            cluster_name: cluster_name.into(),
            command: command.into(),
        }
    }

    pub fn login(&self) -> &str {
        &self.login
    }

    pub fn password(&self) -> &Secret {
        &self.password
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Check that every required field is set
    ///
    /// Reports all empty fields at once, in declaration order.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let checks = [
            ("login", self.login.trim().is_empty(), "Please set a Login"),
            ("password", self.password.is_empty(), "Please set a Password"),
            ("server", self.server.trim().is_empty(), "Please set a URI Server"),
            (
                "cluster_name",
                self.cluster_name.trim().is_empty(),
                "Please set a Cluster Name",
            ),
            ("command", self.command.trim().is_empty(), "Please set a Command"),
        ];

        let fields: Vec<FieldError> = checks
            .into_iter()
            .filter(|(_, empty, _)| *empty)
            .map(|(field, _, message)| FieldError { field, message })
            .collect();

        if fields.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { fields })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> DeploymentConfig {
        DeploymentConfig::new(
            "alice",
            "secret",
            "https://cluster.example",
            "prod",
            "teresa deploy app.yaml",
        )
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_each_empty_field_is_named() {
        let cases = [
            ("login", DeploymentConfig::new("", "secret", "s", "c", "cmd")),
            ("password", DeploymentConfig::new("a", "", "s", "c", "cmd")),
            ("server", DeploymentConfig::new("a", "secret", "", "c", "cmd")),
            ("cluster_name", DeploymentConfig::new("a", "secret", "s", "", "cmd")),
            ("command", DeploymentConfig::new("a", "secret", "s", "c", "")),
        ];

        for (field, config) in cases {
            let err = config.validate().unwrap_err();
            assert_eq!(err.fields.len(), 1, "field {field}");
            assert_eq!(err.fields[0].field, field);
        }
    }

    #[test]
    fn test_whitespace_counts_as_empty() {
        let config = DeploymentConfig::new("  ", "secret", "s", "c", "\t");
        let err = config.validate().unwrap_err();
        assert!(err.has_field("login"));
        assert!(err.has_field("command"));
        assert_eq!(err.fields.len(), 2);
    }

    #[test]
    fn test_messages_match_form_checks() {
        let err = DeploymentConfig::new("", "", "", "", "").validate().unwrap_err();
        let messages: Vec<_> = err.fields.iter().map(|f| f.message).collect();
        assert_eq!(
            messages,
            vec![
                "Please set a Login",
                "Please set a Password",
                "Please set a URI Server",
                "Please set a Cluster Name",
                "Please set a Command",
            ]
        );
    }

    #[test]
    fn test_debug_never_shows_password() {
        let rendered = format!("{:?}", valid());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("********"));
        assert!(rendered.contains("alice"));
    }

    #[test]
    fn test_secret_display_is_masked() {
        let secret = Secret::new("hunter2");
        assert_eq!(secret.to_string(), "********");
        assert_eq!(secret.expose(), "hunter2");
    }
}
