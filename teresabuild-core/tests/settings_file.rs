/// Settings file loading tests
use std::io::Write;
use tempfile::NamedTempFile;

use teresabuild_core::{Overrides, Settings, SettingsError};

fn write_settings(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn loads_and_resolves_a_full_file() {
    let file = write_settings(
        r#"
        [cluster]
        server = "https://teresa.example.com"
        name = "prod"

        [credentials]
        login = "deploy-bot"
        password = "literal-pw"

        [step]
        command = "teresa deploy create ."

        [cli]
        program = "teresa --profile ci"
        timeout_secs = 90
        "#,
    );

    let settings = Settings::load(file.path()).unwrap();
    let config = settings.resolve(Overrides::default());

    assert!(config.validate().is_ok());
    assert_eq!(config.login(), "deploy-bot");
    assert_eq!(config.password().expose(), "literal-pw");
    assert_eq!(settings.cli_program(None).unwrap().to_string(), "teresa --profile ci");
    assert_eq!(settings.step_timeout(None).map(|d| d.as_secs()), Some(90));
}

#[test]
fn partial_file_leaves_gaps_for_flags() {
    let file = write_settings(
        r#"
        [cluster]
        name = "staging"
        "#,
    );

    let settings = Settings::load(file.path()).unwrap();
    let config = settings.resolve(Overrides {
        login: Some("alice".into()),
        ..Default::default()
    });
    let err = config.validate().unwrap_err();

    assert!(!err.has_field("login"));
    assert!(!err.has_field("cluster_name"));
    assert!(err.has_field("password"));
    assert!(err.has_field("server"));
    assert!(err.has_field("command"));
}

#[test]
fn invalid_toml_is_a_parse_error() {
    let file = write_settings("[cluster\nname = ");
    let err = Settings::load(file.path()).unwrap_err();
    assert!(matches!(err, SettingsError::Parse { .. }));
}

#[test]
fn missing_explicit_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load_or_default(Some(&dir.path().join("nope.toml"))).unwrap_err();
    assert!(matches!(err, SettingsError::Read { .. }));
}

#[test]
fn template_round_trips_through_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/config.toml");

    Settings::write_template(&path).unwrap();
    let settings = Settings::load(&path).unwrap();

    assert_eq!(settings.cluster.server.as_deref(), Some("https://teresa.example.com"));
    assert_eq!(settings.step.command.as_deref(), Some("teresa deploy create . --app myapp"));
}

#[test]
fn shell_parameter_syntax_in_command_survives_load() {
    let file = write_settings(
        r#"
        [step]
        command = "deploy --tag ${TERESABUILD_TEST_UNSET_TAG:-latest}"
        "#,
    );

    let settings = Settings::load(file.path()).unwrap();

    assert_eq!(
        settings.step.command.as_deref(),
        Some("deploy --tag ${TERESABUILD_TEST_UNSET_TAG:-latest}")
    );
}

#[test]
fn show_masks_a_literal_password_starting_with_a_reference_marker() {
    let file = write_settings(
        r#"
        [credentials]
        password = "${hunter2"
        "#,
    );

    let shown = Settings::load(file.path()).unwrap().masked().to_toml().unwrap();

    assert!(!shown.contains("hunter2"), "{shown}");
    assert!(shown.contains("********"));
}
