//! End-to-end runs against real processes, with `echo` standing in for teresa
#![cfg(unix)]

use std::io;

use teresabuild_core::{
    CliProgram, ClusterCommandRunner, DeploymentConfig, MemorySink, ProcessExecutor, RunError,
    Step,
};

fn config(command: &str) -> DeploymentConfig {
    DeploymentConfig::new("alice", "secret", "https://cluster.example", "prod", command)
}

fn echo_runner() -> ClusterCommandRunner<ProcessExecutor> {
    let cli: CliProgram = "echo".parse().unwrap();
    ClusterCommandRunner::new(ProcessExecutor::new()).with_cli(cli)
}

#[tokio::test]
async fn streams_version_and_command_output() {
    let sink = MemorySink::new();
    let report = echo_runner()
        .run(&config("echo deployed"), &sink)
        .await
        .unwrap();

    assert!(report.succeeded());
    let lines = sink.lines();
    assert!(lines.contains(&"version".to_string()));
    assert!(lines.contains(&"deployed".to_string()));
    // set-cluster output is suppressed, only its command line is logged
    assert!(!lines.contains(&"config set-cluster prod -s https://cluster.example".to_string()));
    assert!(lines.contains(&"$ echo config set-cluster prod -s https://cluster.example".to_string()));
}

#[tokio::test]
async fn command_exit_code_is_reported() {
    let err = echo_runner()
        .run(&config("exit 5"), &MemorySink::new())
        .await
        .unwrap_err();

    assert_eq!(err.step(), Some(Step::Command));
    assert_eq!(err.exit_code(), Some(5));
}

#[tokio::test]
async fn command_echoing_the_password_is_redacted() {
    let sink = MemorySink::new();
    echo_runner()
        .run(&config("echo token=secret"), &sink)
        .await
        .unwrap();

    assert!(sink.contains("token=********"));
    assert!(!sink.contains("secret"));
}

#[tokio::test]
async fn missing_cli_binary_aborts_at_version() {
    let cli: CliProgram = "teresabuild-no-such-teresa".parse().unwrap();
    let runner = ClusterCommandRunner::new(ProcessExecutor::new()).with_cli(cli);

    let err = runner
        .run(&config("echo never"), &MemorySink::new())
        .await
        .unwrap_err();

    match err {
        RunError::Io { step, source } => {
            assert_eq!(step, Step::Version);
            assert_eq!(source.kind(), io::ErrorKind::NotFound);
        }
        other => panic!("expected Io error, got {other:?}"),
    }
}
