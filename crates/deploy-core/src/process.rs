//! External command execution.
//!
//! Every call to `docker` and `kubectl` goes through [`ProcessRunner`], so
//! the orchestrator can be driven by [`crate::fakes::ScriptedRunner`] in
//! tests and by [`SystemRunner`] in production.

use async_trait::async_trait;
use std::fmt;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{DeployError, Result};

/// A program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
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
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code (0 = success, -1 when killed by a signal).
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// One-line description of a failed command for logs and errors.
    pub fn failure_reason(&self) -> String {
        let detail = self
            .stderr
            .lines()
            .rev()
            .find(|l| !l.trim().is_empty())
            .unwrap_or("")
            .trim();
        if detail.is_empty() {
            format!("exit code {}", self.exit_code)
        } else {
            format!("exit code {}: {}", self.exit_code, detail)
        }
    }
}

/// Capability to run an external program to completion.
///
/// `Err` means the program could not be run at all (not found, timed out).
/// A program that ran and exited non-zero is an `Ok` with that exit code.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill and fail any command running longer than `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, command: &CommandSpec) -> Result<CommandOutput> {
        let start = Instant::now();
        debug!(command = %command, "Running command");

        let process_error = |reason: String| DeployError::Process {
            program: command.program.clone(),
            reason,
        };

        let mut child = Command::new(&command.program)
            .args(&command.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| process_error(e.to_string()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let program = command.program.as_str();
        let finished = async {
            let (stdout, stderr, status) =
                tokio::join!(read_all(stdout), stream_lines(stderr, program), child.wait());
            Ok::<_, std::io::Error>((stdout?, stderr?, status?))
        };

        // On timeout the future is dropped; kill_on_drop then reaps the child.
        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, finished)
                .await
                .map_err(|_| process_error(format!("timed out after {} seconds", limit.as_secs())))?,
            None => finished.await,
        };
        let (stdout, stderr, status) = waited.map_err(|e| process_error(e.to_string()))?;

        let result = CommandOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout,
            stderr,
        };

        debug!(
            command = %command,
            exit_code = result.exit_code,
            duration_ms = start.elapsed().as_millis() as u64,
            "Command finished"
        );
        Ok(result)
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(String::from_utf8_lossy(&buf).to_string())
}

/// Log each stderr line as it arrives and keep the full text.
///
/// docker and kubectl report progress on stderr.
async fn stream_lines<R: AsyncRead + Unpin>(pipe: Option<R>, program: &str) -> std::io::Result<String> {
    let mut collected = String::new();
    let Some(pipe) = pipe else {
        return Ok(collected);
    };
    let mut lines = BufReader::new(pipe).lines();
    while let Some(line) = lines.next_line().await? {
        if !line.trim().is_empty() {
            info!(program = %program, "{}", line);
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    Ok(collected)
}
