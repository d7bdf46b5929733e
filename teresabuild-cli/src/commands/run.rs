//! `teresabuild run` - execute the deployment step
//!
//! The build log (diagnostics, command lines, streamed output) goes to
//! stdout; tracing diagnostics go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use teresabuild_core::{ClusterCommandRunner, ProcessExecutor, WriterSink};
use tracing::info;

use super::StepArgs;

#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub step: StepArgs,

    /// Directory to run every process from (default: current directory)
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,
}

pub async fn run_step(args: RunArgs, quiet: bool) -> Result<()> {
    let RunArgs { step, working_dir } = args;
    // Settings file and --password-stdin are blocking reads
    let resolved = tokio::task::spawn_blocking(move || step.resolve())
        .await
        .context("Settings resolution task failed")??;

    let mut executor = ProcessExecutor::new();
    if let Some(dir) = working_dir {
        executor = executor.with_working_dir(dir);
    }

    let mut runner = ClusterCommandRunner::new(executor).with_cli(resolved.cli);
    if let Some(timeout) = resolved.timeout {
        runner = runner.with_step_timeout(timeout);
    }

    let sink = WriterSink::new(std::io::stdout());
    let report = runner
        .run_until(&resolved.config, &sink, shutdown_signal())
        .await
        .context("Teresa build step failed")?;

    info!(steps = report.steps.len(), "deployment step finished");
    if !quiet {
        eprintln!(
            "✅ Teresa build finished in {:.2}s",
            report.total_elapsed().as_secs_f64()
        );
        for warning in report.warnings() {
            eprintln!(
                "⚠️  {} exited with {} (ignored)",
                warning.step, warning.exit_code
            );
        }
    }

    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM; never resolves if handlers can't be installed
async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
