//! Ordered execution of command batches over one session.
//!
//! Commands run strictly in sequence because each provisioning step
//! depends on the previous one. The first command classified as failed
//! stops the batch; nothing is retried.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::session::{CommandOutput, RemoteSession, SessionError};

/// A labelled command line executed on the remote host.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteCommand {
    /// Human readable description shown in progress output.
    pub label: String,
    /// Literal command text handed to the remote shell.
    pub text: String,
}

impl RemoteCommand {
    /// Creates a command from a label and its command line.
    #[must_use]
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            text: text.into(),
        }
    }
}

/// Verdict assigned to one executed command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Classification {
    /// The command succeeded.
    Success,
    /// The command failed for the given reason.
    Failed {
        /// Captured error text, or a description of the exit status.
        reason: String,
    },
}

impl Classification {
    /// Returns `true` for [`Classification::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Rule used to decide whether a command failed.
///
/// [`ClassificationMode::Stderr`] is the legacy rule: any standard error
/// output counts as failure. Tools such as `docker pull` report progress on
/// stderr, so that rule misfires; [`ClassificationMode::ExitStatus`] is the
/// default.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ClassificationMode {
    /// Failed unless the command exited with status zero.
    #[default]
    ExitStatus,
    /// Failed if and only if the command wrote to standard error.
    Stderr,
}

impl ClassificationMode {
    /// Classifies a command's captured output.
    #[must_use]
    pub fn classify(self, output: &CommandOutput) -> Classification {
        match self {
            Self::ExitStatus if output.is_success() => Classification::Success,
            Self::ExitStatus => Classification::Failed {
                reason: exit_failure_reason(output),
            },
            Self::Stderr if output.stderr.is_empty() => Classification::Success,
            Self::Stderr => Classification::Failed {
                reason: output.stderr.clone(),
            },
        }
    }
}

fn exit_failure_reason(output: &CommandOutput) -> String {
    if !output.stderr.is_empty() {
        return output.stderr.clone();
    }
    output.code.map_or_else(
        || String::from("terminated without an exit status"),
        |code| format!("exited with status {code}"),
    )
}

/// Outcome of one executed command.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandResult {
    /// The command that ran.
    pub command: RemoteCommand,
    /// Captured exit code and output streams.
    pub output: CommandOutput,
    /// Verdict for the command.
    pub classification: Classification,
}

/// Confirmation that every command in a batch succeeded.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RunReport {
    /// Results in execution order.
    pub results: Vec<CommandResult>,
}

impl RunReport {
    /// Number of commands executed.
    #[must_use]
    pub fn steps(&self) -> usize {
        self.results.len()
    }
}

/// A command classified as failed, which aborted its batch.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandFailedError {
    /// One-based position of the command in its batch.
    pub step: usize,
    /// The failing command.
    pub command: RemoteCommand,
    /// Why the command was classified as failed.
    pub reason: String,
    /// Captured exit code and output streams.
    pub output: CommandOutput,
}

impl fmt::Display for CommandFailedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} ({}) failed while running '{}': {}",
            self.step,
            self.command.label,
            self.command.text,
            self.reason.trim_end()
        )
    }
}

impl std::error::Error for CommandFailedError {}

/// Errors that stop a batch.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum RunError {
    /// A command ran and was classified as failed.
    #[error(transparent)]
    CommandFailed(CommandFailedError),
    /// A command could not be delivered to the host.
    #[error("step {step} ({label}) could not run: {source}")]
    Transport {
        /// One-based position of the command in its batch.
        step: usize,
        /// Label of the command.
        label: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
}

/// Observer notified as each command starts and finishes.
pub trait Progress {
    /// Called before command `step` of `total` runs.
    fn started(&mut self, step: usize, total: usize, command: &RemoteCommand);

    /// Called once command `step` of `total` has been classified.
    fn finished(
        &mut self,
        step: usize,
        total: usize,
        command: &RemoteCommand,
        classification: &Classification,
    );
}

/// Progress observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    fn started(&mut self, _step: usize, _total: usize, _command: &RemoteCommand) {}

    fn finished(
        &mut self,
        _step: usize,
        _total: usize,
        _command: &RemoteCommand,
        _classification: &Classification,
    ) {
    }
}

/// Executes batches of commands with a stop-on-first-failure policy.
#[derive(Clone, Copy, Debug, Default)]
pub struct BatchRunner {
    mode: ClassificationMode,
}

impl BatchRunner {
    /// Creates a runner using the given classification rule.
    #[must_use]
    pub const fn new(mode: ClassificationMode) -> Self {
        Self { mode }
    }

    /// Classification rule in use.
    #[must_use]
    pub const fn mode(&self) -> ClassificationMode {
        self.mode
    }

    /// Runs `commands` in order over `session`.
    ///
    /// The session is neither opened nor closed here; its owner does that.
    ///
    /// # Errors
    ///
    /// Returns [`RunError::CommandFailed`] for the first command classified
    /// as failed and [`RunError::Transport`] when a command cannot be
    /// delivered. Later commands never run in either case.
    pub fn execute<S, P>(
        &self,
        session: &mut S,
        commands: &[RemoteCommand],
        progress: &mut P,
    ) -> Result<RunReport, RunError>
    where
        S: RemoteSession + ?Sized,
        P: Progress + ?Sized,
    {
        let total = commands.len();
        let mut report = RunReport {
            results: Vec::with_capacity(total),
        };

        for (index, command) in commands.iter().enumerate() {
            let step = index + 1;
            progress.started(step, total, command);

            let output = session
                .run(&command.text)
                .map_err(|source| RunError::Transport {
                    step,
                    label: command.label.clone(),
                    source,
                })?;
            let classification = self.mode.classify(&output);
            progress.finished(step, total, command, &classification);

            if let Classification::Failed { ref reason } = classification {
                warn!(step, label = %command.label, command = %command.text, reason = reason.trim_end(), "command failed");
                return Err(RunError::CommandFailed(CommandFailedError {
                    step,
                    command: command.clone(),
                    reason: reason.clone(),
                    output,
                }));
            }

            info!(step, total, label = %command.label, "command succeeded");
            report.results.push(CommandResult {
                command: command.clone(),
                output,
                classification,
            });
        }

        Ok(report)
    }
}
