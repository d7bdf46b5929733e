//! Build log sinks
//!
//! A [`LineSink`] receives every line a run produces: diagnostics, step
//! banners, exit statuses, and streamed child output.

use std::io::Write;
use std::sync::{Mutex, MutexGuard};

use crate::config::Secret;

/// Destination for build log lines
pub trait LineSink: Send + Sync {
    fn write_line(&self, text: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Forwards lines to `tracing` under the `build_log` target
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl LineSink for TracingSink {
    fn write_line(&self, text: &str) {
        tracing::info!(target: "build_log", "{}", text);
    }
}

/// Writes lines to any writer (stdout, a file, a buffer)
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write + Send> LineSink for WriterSink<W> {
    fn write_line(&self, text: &str) {
        let mut writer = lock(&self.writer);
        // A closed build log must not fail the deployment
        if writeln!(writer, "{text}").and_then(|_| writer.flush()).is_err() {
            tracing::debug!("build log writer rejected a line");
        }
    }
}

/// Collects lines in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    lines: Mutex<Vec<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        lock(&self.lines).clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        lock(&self.lines).iter().any(|line| line.contains(needle))
    }
}

impl LineSink for MemorySink {
    fn write_line(&self, text: &str) {
        lock(&self.lines).push(text.to_string());
    }
}

/// Masks a secret in every line before forwarding it
pub struct RedactingSink<'a> {
    inner: &'a dyn LineSink,
    secret: &'a Secret,
}

impl<'a> RedactingSink<'a> {
    pub fn new(inner: &'a dyn LineSink, secret: &'a Secret) -> Self {
        Self { inner, secret }
    }
}

impl LineSink for RedactingSink<'_> {
    fn write_line(&self, text: &str) {
        let secret = self.secret.expose();
        if secret.is_empty() || !text.contains(secret) {
            self.inner.write_line(text);
        } else {
            self.inner.write_line(&text.replace(secret, Secret::mask()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemorySink::new();
        sink.write_line("one");
        sink.write_line("two");
        assert_eq!(sink.lines(), vec!["one", "two"]);
    }

    #[test]
    fn test_writer_sink_appends_newlines() {
        let sink = WriterSink::new(Vec::new());
        sink.write_line("Login:  alice");
        sink.write_line("Server:  https://cluster.example");

        let written = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(written, "Login:  alice\nServer:  https://cluster.example\n");
    }

    #[test]
    fn test_redacting_sink_masks_every_occurrence() {
        let memory = MemorySink::new();
        let secret = Secret::new("s3cr3t");
        let sink = RedactingSink::new(&memory, &secret);

        sink.write_line("password=s3cr3t again s3cr3t");
        sink.write_line("nothing to hide");

        assert_eq!(
            memory.lines(),
            vec!["password=******** again ********", "nothing to hide"]
        );
    }

    #[test]
    fn test_redacting_sink_ignores_empty_secret() {
        let memory = MemorySink::new();
        let secret = Secret::default();
        RedactingSink::new(&memory, &secret).write_line("abc");
        assert_eq!(memory.lines(), vec!["abc"]);
    }
}
