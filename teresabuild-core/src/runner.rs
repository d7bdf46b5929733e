//! Cluster command runner
//!
//! Drives one run: diagnostics, then `version`, `set-cluster`,
//! `use-cluster`, `login`, and the user command, each gating the next.
//! `version` is the only step whose failure does not stop the run.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::DeploymentConfig;
use crate::error::RunError;
use crate::executor::CommandExecutor;
use crate::sink::{LineSink, RedactingSink};
use crate::step::{plan, CliProgram, Invocation, Step};

/// Result of one executed step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub step: Step,
    pub command_line: String,
    /// `-1` when the child was killed by a signal
    pub exit_code: i32,
    pub elapsed: Duration,
}

impl StepOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Steps executed by a successful run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub steps: Vec<StepOutcome>,
}

impl RunReport {
    /// True when the user command ran and exited 0
    pub fn succeeded(&self) -> bool {
        self.steps
            .iter()
            .any(|outcome| outcome.step == Step::Command && outcome.success())
    }

    /// Non-fatal steps that exited non-zero
    pub fn warnings(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|outcome| !outcome.success())
    }

    pub fn total_elapsed(&self) -> Duration {
        self.steps.iter().map(|outcome| outcome.elapsed).sum()
    }
}

/// Runs the fixed teresa command sequence against an injected executor
pub struct ClusterCommandRunner<E> {
    executor: E,
    cli: CliProgram,
    step_timeout: Option<Duration>,
}

impl<E: CommandExecutor> ClusterCommandRunner<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            cli: CliProgram::default(),
            step_timeout: None,
        }
    }

    pub fn with_cli(mut self, cli: CliProgram) -> Self {
        self.cli = cli;
        self
    }

    /// Limit how long any single step may run
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn cli(&self) -> &CliProgram {
        &self.cli
    }

    pub async fn run(
        &self,
        config: &DeploymentConfig,
        sink: &dyn LineSink,
    ) -> Result<RunReport, RunError> {
        self.run_until(config, sink, std::future::pending()).await
    }

    /// Like [`run`](Self::run), aborting the in-flight step when `shutdown` resolves
    pub async fn run_until<F>(
        &self,
        config: &DeploymentConfig,
        sink: &dyn LineSink,
        shutdown: F,
    ) -> Result<RunReport, RunError>
    where
        F: Future<Output = ()>,
    {
        config.validate()?;

        let span = info_span!("run", cluster = %config.cluster_name(), server = %config.server());
        // The command is free text and may embed the password; child output too
        let redacted = RedactingSink::new(sink, config.password());
        let mut shutdown = std::pin::pin!(shutdown);

        async {
            // Diagnostics are reported against the opening step
            let opening = Step::ALL[0];
            emit(sink, opening, &format!("Login:  {}", config.login()))?;
            emit(sink, opening, &format!("Server:  {}", config.server()))?;
            emit(sink, opening, &format!("Cluster Name:  {}", config.cluster_name()))?;
            emit(&redacted, opening, &format!("Command :  {}", config.command()))?;

            let mut report = RunReport::default();
            for invocation in plan(&self.cli, config) {
                match invocation.step {
                    Step::SetCluster => emit(sink, invocation.step, "Configure Teresa Server")?,
                    Step::Command => emit(sink, invocation.step, "Execute Command: ")?,
                    _ => {}
                }
                let outcome = self
                    .execute_step(&invocation, sink, &redacted, shutdown.as_mut())
                    .await?;
                report.steps.push(outcome);
            }

            info!(elapsed_ms = report.total_elapsed().as_millis() as u64, "run finished");
            Ok::<_, RunError>(report)
        }
        .instrument(span)
        .await
    }

    /// `sink` gets runner-authored lines; `redacted` gets anything derived
    /// from the user command or the child process
    async fn execute_step<F>(
        &self,
        invocation: &Invocation<'_>,
        sink: &dyn LineSink,
        redacted: &dyn LineSink,
        shutdown: Pin<&mut F>,
    ) -> Result<StepOutcome, RunError>
    where
        F: Future<Output = ()>,
    {
        let step = invocation.step;
        let command_line = invocation.command_line.to_string();
        info!(step = %step, "executing");
        let echo = if step == Step::Command { redacted } else { sink };
        emit(echo, step, &format!("$ {command_line}"))?;

        let started = Instant::now();
        let execution =
            AssertUnwindSafe(self.executor.execute(invocation, redacted)).catch_unwind();
        let bounded = async move {
            match self.step_timeout {
                Some(limit) => tokio::time::timeout(limit, execution)
                    .await
                    .map_err(|_| RunError::TimedOut { step, limit }),
                None => Ok(execution.await),
            }
        };

        let result = tokio::select! {
            biased;
            _ = shutdown => {
                warn!(step = %step, "run cancelled");
                return Err(RunError::Cancelled { step });
            }
            result = bounded => result?,
        };

        let status = match result {
            Ok(Ok(status)) => status,
            Ok(Err(source)) => {
                error!(step = %step, error = %source, "could not execute step");
                return Err(RunError::io(step, source));
            }
            Err(panic) => return Err(unexpected(step, panic.as_ref())),
        };

        let exit_code = status.code_or_signal();
        emit(sink, step, &format!("exit status {exit_code}"))?;

        if !status.success() {
            if step.is_fatal() {
                error!(step = %step, exit_code, "step failed");
                return Err(RunError::step_failed(step, exit_code));
            }
            warn!(step = %step, exit_code, "non-fatal step failed, continuing");
            emit(
                sink,
                step,
                &format!("warning: {step} exited with {exit_code}, continuing"),
            )?;
        }

        Ok(StepOutcome {
            step,
            command_line,
            exit_code,
            elapsed: started.elapsed(),
        })
    }
}

/// Write one build log line, turning a panicking sink into a step failure
fn emit(sink: &dyn LineSink, step: Step, line: &str) -> Result<(), RunError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| sink.write_line(line)))
        .map_err(|panic| unexpected(step, panic.as_ref()))
}

fn unexpected(step: Step, panic: &(dyn Any + Send)) -> RunError {
    let message = panic_message(panic);
    error!(step = %step, %message, "step panicked");
    RunError::unexpected(step, message)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use crate::sink::MemorySink;

    fn config() -> DeploymentConfig {
        DeploymentConfig::new(
            "alice",
            "secret",
            "https://cluster.example",
            "prod",
            "teresa deploy app.yaml",
        )
    }

    #[tokio::test]
    async fn writes_diagnostics_before_any_step() {
        let runner = ClusterCommandRunner::new(MockExecutor::new());
        let sink = MemorySink::new();
        runner.run(&config(), &sink).await.unwrap();

        let lines = sink.lines();
        assert_eq!(
            &lines[..4],
            [
                "Login:  alice",
                "Server:  https://cluster.example",
                "Cluster Name:  prod",
                "Command :  teresa deploy app.yaml",
            ]
        );
        assert_eq!(lines[4], "$ teresa version");
    }

    #[tokio::test]
    async fn report_lists_every_step() {
        let runner = ClusterCommandRunner::new(MockExecutor::new());
        let report = runner.run(&config(), &MemorySink::new()).await.unwrap();

        let steps: Vec<Step> = report.steps.iter().map(|o| o.step).collect();
        assert_eq!(steps, Step::ALL.to_vec());
        assert!(report.succeeded());
        assert_eq!(report.warnings().count(), 0);
    }

    #[tokio::test]
    async fn version_failure_is_a_warning() {
        let mock = MockExecutor::new();
        mock.exit_with(Step::Version, 1);
        let runner = ClusterCommandRunner::new(mock);
        let sink = MemorySink::new();

        let report = runner.run(&config(), &sink).await.unwrap();

        assert!(report.succeeded());
        assert_eq!(report.warnings().map(|o| o.step).collect::<Vec<_>>(), vec![Step::Version]);
        assert!(sink.contains("warning: version exited with 1, continuing"));
    }

    #[tokio::test]
    async fn panic_message_from_string_payload() {
        let payload: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "panic with non-string payload");
    }

    #[tokio::test]
    async fn custom_cli_program_is_used() {
        let cli: CliProgram = "/opt/bin/teresa".parse().unwrap();
        let runner = ClusterCommandRunner::new(MockExecutor::new()).with_cli(cli);
        runner.run(&config(), &MemorySink::new()).await.unwrap();

        assert_eq!(
            runner.executor().command_lines()[0],
            "/opt/bin/teresa version"
        );
    }
}
