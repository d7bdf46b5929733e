//! Command executor trait and implementations
//!
//! Provides the seam between the runner and real processes:
//! - [`ProcessExecutor`] spawns children with tokio::process
//! - [`MockExecutor`] records invocations and returns scripted results

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::debug;

use crate::config::Secret;
use crate::sink::LineSink;
use crate::step::{CommandLine, Invocation, Step};

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    code: Option<i32>,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    /// Child terminated without an exit code (killed by a signal)
    pub fn terminated() -> Self {
        Self { code: None }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn code(&self) -> Option<i32> {
        self.code
    }

    /// Exit code with `-1` standing in for signal termination
    pub fn code_or_signal(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

impl From<std::process::ExitStatus> for ExitStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

/// Runs one step's process (testable)
///
/// When `invocation.stream_output` is set, child stdout and stderr lines go
/// to `sink`; otherwise they are discarded.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        sink: &dyn LineSink,
    ) -> io::Result<ExitStatus>;
}

/// Real executor using tokio::process
///
/// Children are spawned with `kill_on_drop`, so dropping the `execute`
/// future (timeout, cancellation) terminates the process.
#[derive(Debug, Default, Clone)]
pub struct ProcessExecutor {
    working_dir: Option<PathBuf>,
}

impl ProcessExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every process from this directory instead of the current one
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    fn command(&self, command_line: &CommandLine) -> Command {
        let mut cmd = match command_line {
            CommandLine::Program { program, args } => {
                let mut cmd = Command::new(program);
                cmd.args(args);
                cmd
            }
            CommandLine::Shell(script) => shell_command(script),
        };
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[cfg(unix)]
fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(script);
    cmd
}

#[cfg(windows)]
fn shell_command(script: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(script);
    cmd
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        sink: &dyn LineSink,
    ) -> io::Result<ExitStatus> {
        let mut cmd = self.command(&invocation.command_line);
        cmd.stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        debug!(step = %invocation.step, "spawning process");
        let mut child = cmd.spawn()?;

        if let Some(secret) = invocation.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                match write_secret(&mut stdin, secret).await {
                    // Child exited without reading its input
                    Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                        debug!(step = %invocation.step, "stdin closed before password was read");
                    }
                    result => result?,
                }
                // Dropping closes the pipe so the child sees EOF
            }
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "child stderr not captured"))?;

        forward_output(stdout, stderr, sink, invocation.stream_output).await?;

        let status = child.wait().await?;
        debug!(step = %invocation.step, code = ?status.code(), "process exited");
        Ok(status.into())
    }
}

async fn write_secret(stdin: &mut tokio::process::ChildStdin, secret: &Secret) -> io::Result<()> {
    stdin.write_all(secret.expose().as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await
}

/// Drain both pipes concurrently so neither can fill up and block the child
async fn forward_output<O, E>(
    stdout: O,
    stderr: E,
    sink: &dyn LineSink,
    stream: bool,
) -> io::Result<()>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut out = BufReader::new(stdout);
    let mut err = BufReader::new(stderr);
    let mut out_buf = Vec::new();
    let mut err_buf = Vec::new();
    let mut out_done = false;
    let mut err_done = false;

    // read_until keeps partial data in the buffer when the other branch wins
    loop {
        tokio::select! {
            read = out.read_until(b'\n', &mut out_buf), if !out_done => {
                out_done = emit_line(read?, &mut out_buf, sink, stream);
            }
            read = err.read_until(b'\n', &mut err_buf), if !err_done => {
                err_done = emit_line(read?, &mut err_buf, sink, stream);
            }
            else => break,
        }
    }

    Ok(())
}

/// Returns true once the pipe reached EOF
fn emit_line(read: usize, buf: &mut Vec<u8>, sink: &dyn LineSink, stream: bool) -> bool {
    if read == 0 && buf.is_empty() {
        return true;
    }
    if stream {
        let text = String::from_utf8_lossy(buf);
        sink.write_line(text.trim_end_matches(['\n', '\r']));
    }
    buf.clear();
    read == 0
}

/// What the mock does when a given step runs
#[derive(Debug, Clone, Default)]
pub struct MockResponse {
    pub exit_code: Option<i32>,
    pub io_error: Option<io::ErrorKind>,
    pub output: Vec<String>,
    pub delay: Option<Duration>,
    pub panic: Option<String>,
}

/// One call seen by [`MockExecutor`]
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub step: Step,
    pub command_line: String,
    pub stdin: Option<Secret>,
    pub stream_output: bool,
}

/// Mock executor for testing
///
/// Every step exits 0 unless scripted otherwise.
#[derive(Default)]
pub struct MockExecutor {
    responses: Mutex<HashMap<Step, MockResponse>>,
    calls: Mutex<Vec<RecordedCall>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self, step: Step, update: impl FnOnce(&mut MockResponse)) {
        update(lock(&self.responses).entry(step).or_default());
    }

    /// Make `step` exit with `code`
    pub fn exit_with(&self, step: Step, code: i32) -> &Self {
        self.script(step, |r| r.exit_code = Some(code));
        self
    }

    /// Make `step` fail to spawn
    pub fn io_error(&self, step: Step, kind: io::ErrorKind) -> &Self {
        self.script(step, |r| r.io_error = Some(kind));
        self
    }

    /// Lines the step prints (forwarded only when the step streams)
    pub fn output(&self, step: Step, lines: &[&str]) -> &Self {
        self.script(step, |r| {
            r.output = lines.iter().map(|l| l.to_string()).collect()
        });
        self
    }

    pub fn delay(&self, step: Step, delay: Duration) -> &Self {
        self.script(step, |r| r.delay = Some(delay));
        self
    }

    pub fn panic_on(&self, step: Step, message: impl Into<String>) -> &Self {
        let message = message.into();
        self.script(step, |r| r.panic = Some(message));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    pub fn steps(&self) -> Vec<Step> {
        lock(&self.calls).iter().map(|c| c.step).collect()
    }

    pub fn command_lines(&self) -> Vec<String> {
        lock(&self.calls)
            .iter()
            .map(|c| c.command_line.clone())
            .collect()
    }
}

#[async_trait]
impl CommandExecutor for MockExecutor {
    async fn execute(
        &self,
        invocation: &Invocation<'_>,
        sink: &dyn LineSink,
    ) -> io::Result<ExitStatus> {
        lock(&self.calls).push(RecordedCall {
            step: invocation.step,
            command_line: invocation.command_line.to_string(),
            stdin: invocation.stdin.cloned(),
            stream_output: invocation.stream_output,
        });

        let response = lock(&self.responses)
            .get(&invocation.step)
            .cloned()
            .unwrap_or_default();

        if let Some(delay) = response.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = response.panic {
            panic!("{message}");
        }
        if let Some(kind) = response.io_error {
            return Err(io::Error::new(kind, format!("mock {} failed", invocation.step)));
        }
        if invocation.stream_output {
            for line in &response.output {
                sink.write_line(line);
            }
        }

        Ok(ExitStatus::from_code(response.exit_code.unwrap_or(0)))
    }
}
