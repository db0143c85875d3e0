//! SSH session configuration and the errors raised by the session layer.
//!
//! [`SshConfig`] is loaded via `ortho-config`, which merges defaults,
//! configuration files, and environment variables.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

/// Default per-command timeout in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Default SSH connection timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// SSH client settings loaded via `ortho-config`.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "PGPROVISION_SSH",
    discovery(
        app_name = "pgprovision",
        env_var = "PGPROVISION_CONFIG_PATH",
        config_file_name = "pgprovision.toml",
        dotfile_name = ".pgprovision.toml",
        project_file_name = "pgprovision.toml"
    )
)]
pub struct SshConfig {
    /// Path to the `ssh` executable.
    #[ortho_config(default = "ssh".to_owned())]
    pub bin: String,
    /// Remote user to connect as when the CLI does not override it.
    #[ortho_config(default = "root".to_owned())]
    pub user: String,
    /// Remote SSH port.
    #[ortho_config(default = 22)]
    pub port: u16,
    /// Path to the SSH private key. Supports tilde expansion. When absent,
    /// `ssh` falls back to its default keys and agent.
    pub identity_file: Option<String>,
    /// Whether to force batch mode so `ssh` never prompts.
    #[ortho_config(default = true)]
    pub batch_mode: bool,
    /// Whether to enforce host key checking. Disabled by default: any host
    /// key presented by the peer is accepted.
    #[ortho_config(default = false)]
    pub strict_host_key_checking: bool,
    /// Known hosts file override; `/dev/null` keeps no record of peers.
    #[ortho_config(default = "/dev/null".to_owned())]
    pub known_hosts_file: String,
    /// Seconds `ssh` waits for the TCP connection and handshake.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
    /// Wall-clock limit for a single remote command. Zero disables it.
    #[ortho_config(default = DEFAULT_COMMAND_TIMEOUT_SECS)]
    pub command_timeout_secs: u64,
    /// Directory holding the connection multiplexing sockets. Defaults to
    /// the system temporary directory.
    pub control_dir: Option<String>,
}

impl SshConfig {
    /// Ensures required values are present after trimming whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::InvalidConfig`] naming the offending field.
    pub fn validate(&self) -> Result<(), SessionError> {
        Self::require_value(&self.bin, "bin")?;
        Self::require_value(&self.user, "user")?;
        Self::require_optional_value(self.identity_file.as_deref(), "identity_file")?;
        Self::require_optional_value(self.control_dir.as_deref(), "control_dir")?;
        if self.port == 0 {
            return Err(SessionError::InvalidConfig {
                field: String::from("port"),
            });
        }
        Ok(())
    }

    /// Per-command timeout, or `None` when disabled.
    #[must_use]
    pub const fn command_timeout(&self) -> Option<Duration> {
        if self.command_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.command_timeout_secs))
        }
    }

    /// Loads configuration from defaults, configuration files, and
    /// environment variables without parsing CLI arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SshConfigLoadError::Parse`] when merging sources fails.
    pub fn load_without_cli_args() -> Result<Self, SshConfigLoadError> {
        Self::load_from_iter([std::ffi::OsString::from("pgprovision")])
            .map_err(|err| SshConfigLoadError::Parse(err.to_string()))
    }

    fn require_optional_value(value: Option<&str>, field: &str) -> Result<(), SessionError> {
        match value {
            None => Ok(()),
            Some(v) if !v.trim().is_empty() => Ok(()),
            Some(_) => Err(SessionError::InvalidConfig {
                field: field.to_owned(),
            }),
        }
    }

    fn require_value(value: &str, field: &str) -> Result<(), SessionError> {
        Self::require_optional_value(Some(value), field)
    }
}

/// Errors raised when loading the SSH configuration from layered sources.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum SshConfigLoadError {
    /// Parsing or merging configuration layers failed.
    #[error("ssh configuration parsing failed: {0}")]
    Parse(String),
}

/// Errors surfaced while opening, using, or closing a session.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SessionError {
    /// A required configuration value is missing.
    #[error("missing {field}: set PGPROVISION_SSH_{env_suffix} or add {field} to pgprovision.toml", env_suffix = field.to_uppercase())]
    InvalidConfig {
        /// Configuration field that failed validation.
        field: String,
    },
    /// The local `ssh` process could not be started.
    #[error("failed to spawn {program}: {message}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Operating system error string.
        message: String,
    },
    /// A command did not finish within the configured limit.
    #[error("{program} did not finish within {limit:?}")]
    Timeout {
        /// Program that was killed.
        program: String,
        /// Limit that elapsed.
        limit: Duration,
    },
    /// The transport could not be established: unreachable host, rejected
    /// authentication, or failed protocol negotiation.
    #[error("failed to connect to {target} (ssh status {status_text}): {stderr}")]
    Connection {
        /// `user@host` destination.
        target: String,
        /// Human readable exit status of the probing `ssh` process.
        status_text: String,
        /// Stderr captured from `ssh`.
        stderr: String,
    },
    /// The session was already closed.
    #[error("session to {target} is closed")]
    Closed {
        /// `user@host` destination.
        target: String,
    },
}
