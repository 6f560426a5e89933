//! External process capability.
//!
//! The generator, the diagram renderer and the document converter are all
//! separate programs. They are launched through the [`CommandRunner`] trait
//! so tests can script their behaviour without spawning anything, and so a
//! host application can sandbox or remote them.
//!
//! [`TokioCommandRunner`] is the real implementation: stdout and stderr are
//! read as two line streams merged into one, every line is forwarded to the
//! observer the moment it arrives, and a configured time limit kills the
//! child when it expires. Lines are split on raw bytes and decoded lossily,
//! so output that is not valid UTF-8 never aborts a run.

use crate::error::RepodocError;
use crate::progress::AssemblyProgressCallback;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_stream::wrappers::SplitStream;
use tokio_stream::StreamExt;
use tracing::debug;

/// Which standard stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("stdout"),
            OutputStream::Stderr => f.write_str("stderr"),
        }
    }
}

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    /// Kill the process if it runs longer than this.
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.current_dir = dir;
        self
    }

    pub fn timeout(mut self, limit: Option<Duration>) -> Self {
        self.timeout = limit;
        self
    }

    /// Value following `flag` in the argument list, if any.
    pub fn arg_after(&self, flag: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a == flag)
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }
}

/// What a finished process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code; `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A zero-exit output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// The text worth showing a user when the process failed: stderr, or
    /// stdout when stderr is empty.
    pub fn diagnostics(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

/// Launches external programs.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `command` to completion, forwarding each output line to `observer`.
    ///
    /// A non-zero exit is *not* an error at this level; callers inspect
    /// [`CommandOutput::status`] and map it onto their own failure.
    async fn run(
        &self,
        command: &CommandSpec,
        observer: &dyn AssemblyProgressCallback,
    ) -> Result<CommandOutput, RepodocError>;
}

/// [`CommandRunner`] backed by `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(
        &self,
        command: &CommandSpec,
        observer: &dyn AssemblyProgressCallback,
    ) -> Result<CommandOutput, RepodocError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref dir) = command.current_dir {
            cmd.current_dir(dir);
        }

        debug!("Spawning {} {:?}", command.program, command.args);
        let child = cmd.spawn().map_err(|source| RepodocError::SpawnFailed {
            program: command.program.clone(),
            source,
        })?;

        // Dropping the collector on timeout drops the child, which kills it.
        let collect = collect_output(child, observer);
        match command.timeout {
            Some(limit) => tokio::time::timeout(limit, collect).await.map_err(|_| {
                RepodocError::SubprocessTimedOut {
                    program: command.program.clone(),
                    secs: limit.as_secs(),
                }
            })?,
            None => collect.await,
        }
    }
}

async fn collect_output(
    mut child: Child,
    observer: &dyn AssemblyProgressCallback,
) -> Result<CommandOutput, RepodocError> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RepodocError::Internal("child stdout was not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RepodocError::Internal("child stderr was not captured".into()))?;

    let out_lines = SplitStream::new(BufReader::new(stdout).split(b'\n'))
        .map(|line| (OutputStream::Stdout, line));
    let err_lines = SplitStream::new(BufReader::new(stderr).split(b'\n'))
        .map(|line| (OutputStream::Stderr, line));
    let mut lines = out_lines.merge(err_lines);

    let mut output = CommandOutput::default();
    while let Some((stream, line)) = lines.next().await {
        let bytes = line
            .map_err(|e| RepodocError::Internal(format!("Failed to read child {stream}: {e}")))?;
        let line = decode_line(&bytes);
        observer.on_log_line(stream, &line);
        let buf = match stream {
            OutputStream::Stdout => &mut output.stdout,
            OutputStream::Stderr => &mut output.stderr,
        };
        buf.push_str(&line);
        buf.push('\n');
    }

    let status = child
        .wait()
        .await
        .map_err(|e| RepodocError::Internal(format!("Failed to wait for child: {e}")))?;
    output.status = status.code();
    Ok(output)
}

/// One output line as text, without its `\r`, invalid bytes replaced.
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use std::sync::Mutex;

    #[derive(Default)]
    struct LineLog(Mutex<Vec<(OutputStream, String)>>);

    impl AssemblyProgressCallback for LineLog {
        fn on_log_line(&self, stream: OutputStream, line: &str) {
            self.0.lock().unwrap().push((stream, line.to_string()));
        }
    }

    #[test]
    fn arg_after_finds_flag_value() {
        let spec = CommandSpec::new("mmdc").args(["-i", "in.mmd", "-o", "out.png"]);
        assert_eq!(spec.arg_after("-o"), Some("out.png"));
        assert_eq!(spec.arg_after("-w"), None);
    }

    #[test]
    fn diagnostics_prefers_stderr() {
        let out = CommandOutput {
            status: Some(1),
            stdout: "progress...\n".into(),
            stderr: "Error: bad syntax\n".into(),
        };
        assert_eq!(out.diagnostics(), "Error: bad syntax");

        let quiet = CommandOutput {
            status: Some(1),
            stdout: "only stdout\n".into(),
            stderr: "  \n".into(),
        };
        assert_eq!(quiet.diagnostics(), "only stdout");
    }

    #[tokio::test]
    async fn missing_program_is_spawn_failure() {
        let spec = CommandSpec::new("repodoc-no-such-program-xyz");
        let err = TokioCommandRunner
            .run(&spec, &NoopProgressCallback)
            .await
            .unwrap_err();
        assert!(matches!(err, RepodocError::SpawnFailed { .. }), "got: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_both_channels_to_observer() {
        let log = LineLog::default();
        let spec = CommandSpec::new("sh").args(["-c", "echo one; echo two >&2; echo three"]);
        let out = TokioCommandRunner.run(&spec, &log).await.unwrap();

        assert!(out.success());
        assert_eq!(out.stdout, "one\nthree\n");
        assert_eq!(out.stderr, "two\n");

        let lines = log.0.lock().unwrap();
        assert_eq!(lines.len(), 3);
        assert!(lines.contains(&(OutputStream::Stderr, "two".to_string())));
    }

    #[test]
    fn decode_line_replaces_invalid_bytes_and_carriage_return() {
        assert_eq!(decode_line(b"caf\xe9\r"), "caf\u{FFFD}");
        assert_eq!(decode_line(b"plain"), "plain");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_utf8_output_is_decoded_lossily() {
        let log = LineLog::default();
        let spec = CommandSpec::new("sh").args(["-c", "printf 'caf\\351\\n'; echo done"]);
        let out = TokioCommandRunner.run(&spec, &log).await.unwrap();

        assert!(out.success());
        assert_eq!(out.stdout, "caf\u{FFFD}\ndone\n");
        let lines = log.0.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], (OutputStream::Stdout, "done".to_string()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported_not_raised() {
        let spec = CommandSpec::new("sh").args(["-c", "echo boom >&2; exit 3"]);
        let out = TokioCommandRunner
            .run(&spec, &NoopProgressCallback)
            .await
            .unwrap();
        assert_eq!(out.status, Some(3));
        assert_eq!(out.diagnostics(), "boom");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn timeout_kills_hung_process() {
        let spec = CommandSpec::new("sleep")
            .arg("30")
            .timeout(Some(Duration::from_millis(200)));
        let err = TokioCommandRunner
            .run(&spec, &NoopProgressCallback)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RepodocError::SubprocessTimedOut { ref program, .. } if program == "sleep"),
            "got: {err}"
        );
    }
}
