//! Remote command sessions over the system OpenSSH client.
//!
//! A session is an SSH connection multiplexing master: [`Connector::open`]
//! authenticates once and leaves a control socket behind, every
//! [`RemoteSession::run`] reuses it, and [`RemoteSession::close`] tells the
//! master to exit. Sessions are owned values; nothing is shared between
//! operations.

use std::ffi::OsString;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info, warn};

use crate::target::Target;

mod config;
mod types;
mod util;

pub use config::{
    DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONNECT_TIMEOUT_SECS, SessionError, SshConfig,
    SshConfigLoadError,
};
pub use types::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use util::expand_tilde;

/// Opens sessions to validated targets.
pub trait Connector {
    /// Session type handed out by this connector.
    type Session: RemoteSession;

    /// Establishes an authenticated session to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Connection`] when the transport cannot be
    /// established, or [`SessionError::Spawn`] when the client cannot start.
    fn open(&self, target: &Target) -> Result<Self::Session, SessionError>;
}

/// An open channel able to run commands until closed.
pub trait RemoteSession {
    /// Runs `command` remotely and waits for both output streams to drain.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the command cannot be delivered or the
    /// session is already closed. A command that runs and fails is not an
    /// error here; its exit code and stderr are part of the output.
    fn run(&mut self, command: &str) -> Result<CommandOutput, SessionError>;

    /// Closes the session. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] when the transport cannot be shut down.
    fn close(&mut self) -> Result<(), SessionError>;
}

/// Connector that drives the `ssh` binary through a [`CommandRunner`].
#[derive(Clone, Debug)]
pub struct SshConnector<R: CommandRunner + Clone> {
    config: SshConfig,
    runner: R,
}

impl SshConnector<ProcessCommandRunner> {
    /// Wires the real process runner with the configured command timeout.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when validation fails.
    pub fn with_process_runner(config: SshConfig) -> Result<Self, SessionError> {
        let runner = ProcessCommandRunner::with_timeout(config.command_timeout());
        Self::new(config, runner)
    }
}

impl<R: CommandRunner + Clone> SshConnector<R> {
    /// Creates a connector using the provided runner and configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] when configuration validation
    /// fails.
    pub fn new(config: SshConfig, runner: R) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// Returns a reference to the underlying configuration.
    #[must_use]
    pub const fn config(&self) -> &SshConfig {
        &self.config
    }

    fn common_ssh_options(&self, control_path: &Utf8Path) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("-p"),
            OsString::from(self.config.port.to_string()),
        ];

        if let Some(ref identity_file) = self.config.identity_file {
            args.push(OsString::from("-i"));
            args.push(OsString::from(expand_tilde(identity_file)));
        }

        if self.config.batch_mode {
            args.push(OsString::from("-o"));
            args.push(OsString::from("BatchMode=yes"));
        }

        if !self.config.strict_host_key_checking {
            args.push(OsString::from("-o"));
            args.push(OsString::from("StrictHostKeyChecking=no"));
        }

        if !self.config.known_hosts_file.trim().is_empty() {
            args.push(OsString::from("-o"));
            args.push(OsString::from(format!(
                "UserKnownHostsFile={}",
                self.config.known_hosts_file
            )));
        }

        args.push(OsString::from("-o"));
        args.push(OsString::from(format!(
            "ConnectTimeout={}",
            self.config.connect_timeout_secs
        )));
        args.push(OsString::from("-o"));
        args.push(OsString::from(format!("ControlPath={control_path}")));
        args
    }

    fn build_open_args(&self, target: &Target, control_path: &Utf8Path) -> Vec<OsString> {
        let mut args = self.common_ssh_options(control_path);
        args.extend([
            OsString::from("-o"),
            OsString::from("ControlMaster=yes"),
            OsString::from("-o"),
            OsString::from("ControlPersist=yes"),
            OsString::from(target.destination()),
            OsString::from("true"),
        ]);
        args
    }
}

impl<R: CommandRunner + Clone> Connector for SshConnector<R> {
    type Session = SshSession<R>;

    fn open(&self, target: &Target) -> Result<Self::Session, SessionError> {
        let control_path = util::control_socket_path(self.config.control_dir.as_deref())?;
        let args = self.build_open_args(target, &control_path);

        info!(destination = %target, address = %target.address(), "opening ssh session");
        let output = self.runner.run(&self.config.bin, &args)?;
        if !output.is_success() {
            return Err(SessionError::Connection {
                target: target.destination(),
                status_text: output.status_text(),
                stderr: output.stderr.trim().to_owned(),
            });
        }

        debug!(destination = %target, socket = %control_path, "ssh session established");
        Ok(SshSession {
            base_args: self.common_ssh_options(&control_path),
            program: self.config.bin.clone(),
            destination: target.destination(),
            control_path,
            runner: self.runner.clone(),
            closed: false,
        })
    }
}

/// A multiplexed SSH connection to one target.
///
/// Dropping an unclosed session closes it.
#[derive(Debug)]
pub struct SshSession<R: CommandRunner> {
    program: String,
    base_args: Vec<OsString>,
    destination: String,
    control_path: Utf8PathBuf,
    runner: R,
    closed: bool,
}

impl<R: CommandRunner> SshSession<R> {
    /// Path of the control socket backing this session.
    #[must_use]
    pub fn control_path(&self) -> &Utf8Path {
        &self.control_path
    }

    /// Whether [`RemoteSession::close`] has run.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    fn build_run_args(&self, command: &str) -> Vec<OsString> {
        let mut args = self.base_args.clone();
        args.push(OsString::from(&self.destination));
        args.push(OsString::from(command));
        args
    }

    fn build_close_args(&self) -> Vec<OsString> {
        vec![
            OsString::from("-o"),
            OsString::from(format!("ControlPath={}", self.control_path)),
            OsString::from("-O"),
            OsString::from("exit"),
            OsString::from(&self.destination),
        ]
    }
}

impl<R: CommandRunner> RemoteSession for SshSession<R> {
    /// # Security
    ///
    /// `command` is handed to the remote shell verbatim. Callers must quote
    /// any untrusted input before building it.
    fn run(&mut self, command: &str) -> Result<CommandOutput, SessionError> {
        if self.closed {
            return Err(SessionError::Closed {
                target: self.destination.clone(),
            });
        }
        debug!(destination = %self.destination, command, "running remote command");
        self.runner.run(&self.program, &self.build_run_args(command))
    }

    fn close(&mut self) -> Result<(), SessionError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let output = self.runner.run(&self.program, &self.build_close_args())?;
        if output.is_success() {
            debug!(destination = %self.destination, "ssh session closed");
        } else {
            // The master may already be gone; nothing is left to release.
            warn!(
                destination = %self.destination,
                status = %output.status_text(),
                stderr = output.stderr.trim(),
                "ssh control master did not acknowledge exit"
            );
        }
        Ok(())
    }
}

impl<R: CommandRunner> Drop for SshSession<R> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(destination = %self.destination, error = %err, "failed to close ssh session on drop");
        }
    }
}

#[cfg(test)]
mod tests;
