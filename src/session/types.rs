//! Process output types and the command runner abstraction.

use std::ffi::OsString;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::runtime::Builder;
use tracing::warn;

use crate::session::SessionError;

/// Result of running an external command.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CommandOutput {
    /// Exit code reported by the process, if available.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

impl CommandOutput {
    /// Returns `true` when the exit code equals zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Human readable exit status, `unknown` when the process was killed by
    /// a signal.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.code
            .map_or_else(|| String::from("unknown"), |code| code.to_string())
    }
}

/// Abstraction over command execution to support fakes in tests.
pub trait CommandRunner {
    /// Runs `program` with the given arguments, capturing stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Spawn`] if the command cannot be started and
    /// [`SessionError::Timeout`] if it outlives the runner's limit.
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SessionError>;
}

/// Real command runner that shells out to the host operating system.
///
/// Both output streams are drained concurrently so a chatty command cannot
/// deadlock on a full pipe. With a timeout set, the limit covers the exit
/// and both streams reaching end of file; past it the child is killed and
/// its pipes are abandoned, even when a descendant still holds them open.
#[derive(Clone, Debug, Default)]
pub struct ProcessCommandRunner {
    timeout: Option<Duration>,
}

impl ProcessCommandRunner {
    /// Creates a runner that waits as long as the command runs.
    #[must_use]
    pub const fn new() -> Self {
        Self { timeout: None }
    }

    /// Creates a runner that kills commands running longer than `timeout`.
    #[must_use]
    pub const fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    async fn run_async(
        &self,
        program: &str,
        args: &[OsString],
    ) -> Result<CommandOutput, SessionError> {
        let spawn_error = |err: std::io::Error| SessionError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let running = &mut child;
        let completion = async move {
            let (status, stdout, stderr) = tokio::join!(
                running.wait(),
                read_to_string(stdout_pipe),
                read_to_string(stderr_pipe)
            );
            status.map(|exit| CommandOutput {
                code: exit.code(),
                stdout,
                stderr,
            })
        };

        let Some(limit) = self.timeout else {
            return completion.await.map_err(spawn_error);
        };

        let outcome = tokio::time::timeout(limit, completion).await;
        match outcome {
            Ok(result) => result.map_err(spawn_error),
            Err(_elapsed) => {
                if let Err(err) = child.kill().await {
                    warn!(program, error = %err, "failed to kill timed out command");
                }
                Err(SessionError::Timeout {
                    program: program.to_owned(),
                    limit,
                })
            }
        }
    }
}

impl CommandRunner for ProcessCommandRunner {
    fn run(&self, program: &str, args: &[OsString]) -> Result<CommandOutput, SessionError> {
        block_on(program, self.run_async(program, args))
    }
}

fn block_on<F>(program: &str, future: F) -> Result<CommandOutput, SessionError>
where
    F: Future<Output = Result<CommandOutput, SessionError>>,
{
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| SessionError::Spawn {
            program: program.to_owned(),
            message: err.to_string(),
        })?;
    runtime.block_on(future)
}

async fn read_to_string<R: AsyncRead + Unpin>(source: Option<R>) -> String {
    let Some(mut reader) = source else {
        return String::new();
    };
    let mut buffer = Vec::new();
    if let Err(err) = reader.read_to_end(&mut buffer).await {
        warn!(error = %err, "failed to read command output");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
