//! Provisioning and teardown of PostgreSQL on a remote host.
//!
//! Each operation opens its own session, runs a plan through the
//! [`BatchRunner`], and closes the session on every exit path.

use std::fmt::Display;

use thiserror::Error;
use tracing::{info, warn};

use crate::batch::{BatchRunner, CommandFailedError, Progress, RemoteCommand, RunError, RunReport};
use crate::plan::{DatabaseConfig, build_plan, build_teardown_plan};
use crate::session::{Connector, RemoteSession, SessionError};
use crate::target::Target;

/// Errors surfaced while provisioning or tearing down a host.
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Raised when no session could be opened.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        /// Destination the session was opened against.
        target: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
    /// Raised when a plan command was classified as failed.
    #[error("provisioning aborted: {message}")]
    Command {
        /// Human-readable description of the failure.
        message: String,
        /// The failing command and its captured output.
        #[source]
        source: CommandFailedError,
    },
    /// Raised when a plan command could not be delivered.
    #[error("provisioning interrupted: {message}")]
    Transport {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
}

impl ProvisionError {
    /// The failing command, when a command was classified as failed.
    #[must_use]
    pub const fn failed_command(&self) -> Option<&CommandFailedError> {
        match self {
            Self::Command { source, .. } => Some(source),
            Self::Connect { .. } | Self::Transport { .. } => None,
        }
    }
}

/// Runs provisioning plans against targets reached through a connector.
#[derive(Debug)]
pub struct Provisioner<C: Connector> {
    connector: C,
    runner: BatchRunner,
}

impl<C: Connector> Provisioner<C> {
    /// Creates a provisioner using `runner` to execute plans.
    #[must_use]
    pub const fn new(connector: C, runner: BatchRunner) -> Self {
        Self { connector, runner }
    }

    /// Stands up PostgreSQL on `target` using the four-step plan.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Connect`] when the session cannot be opened,
    /// [`ProvisionError::Command`] when a step fails, and
    /// [`ProvisionError::Transport`] when a step cannot be delivered.
    pub fn provision<P: Progress + ?Sized>(
        &self,
        target: &Target,
        config: &DatabaseConfig,
        progress: &mut P,
    ) -> Result<RunReport, ProvisionError> {
        info!(destination = %target, container = %config.container_name, "provisioning postgres");
        self.execute_plan(target, &build_plan(config), progress)
    }

    /// Removes the container, image, and volume created by
    /// [`Provisioner::provision`].
    ///
    /// # Errors
    ///
    /// Returns the same errors as [`Provisioner::provision`].
    pub fn teardown<P: Progress + ?Sized>(
        &self,
        target: &Target,
        config: &DatabaseConfig,
        progress: &mut P,
    ) -> Result<RunReport, ProvisionError> {
        info!(destination = %target, container = %config.container_name, "tearing down postgres");
        self.execute_plan(target, &build_teardown_plan(config), progress)
    }

    fn execute_plan<P: Progress + ?Sized>(
        &self,
        target: &Target,
        commands: &[RemoteCommand],
        progress: &mut P,
    ) -> Result<RunReport, ProvisionError> {
        let mut session = self
            .connector
            .open(target)
            .map_err(|source| ProvisionError::Connect {
                target: target.destination(),
                source,
            })?;

        let outcome = self.runner.execute(&mut session, commands, progress);
        let close_error = session.close().err();

        match outcome {
            Ok(report) => {
                if let Some(ref err) = close_error {
                    warn!(destination = %target, error = %err, "failed to close session after provisioning");
                }
                Ok(report)
            }
            Err(err) => {
                let message = append_close_note(err.to_string(), close_error.as_ref());
                Err(match err {
                    RunError::CommandFailed(source) => ProvisionError::Command { message, source },
                    RunError::Transport { source, .. } => {
                        ProvisionError::Transport { message, source }
                    }
                })
            }
        }
    }
}

pub(crate) fn append_close_note<E: Display>(message: String, close_error: Option<&E>) -> String {
    if let Some(close) = close_error {
        format!("{message} (closing the session also failed: {close})")
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::batch::NoProgress;
    use crate::test_support::ScriptedConnector;

    #[fixture]
    fn target() -> Target {
        Target::new("192.168.56.103", "admin").expect("literal target")
    }

    #[fixture]
    fn config() -> DatabaseConfig {
        DatabaseConfig::new("pg", "app", "u", "p")
    }

    fn provisioner(connector: &ScriptedConnector) -> Provisioner<ScriptedConnector> {
        Provisioner::new(connector.clone(), BatchRunner::default())
    }

    #[rstest]
    fn successful_run_closes_the_session_once(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        for _ in 0..4 {
            connector.push_success("");
        }

        let report = provisioner(&connector)
            .provision(&target, &config, &mut NoProgress)
            .expect("provisioning should succeed");

        assert_eq!(report.steps(), 4);
        assert_eq!(connector.opens(), 1);
        assert_eq!(connector.closes(), 1);
        assert_eq!(
            connector.commands().first().map(String::as_str),
            Some("docker volume create pg_data_volume")
        );
    }

    #[rstest]
    fn failing_step_aborts_and_closes_once(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        connector.push_success("");
        connector.push_failure(1, "permission denied");

        let err = provisioner(&connector)
            .provision(&target, &config, &mut NoProgress)
            .expect_err("step 2 should abort");

        let failure = err.failed_command().expect("command failure");
        assert_eq!(failure.step, 2);
        assert_eq!(failure.command.text, "docker pull postgres");
        assert_eq!(failure.reason, "permission denied");
        assert_eq!(connector.commands().len(), 2);
        assert_eq!(connector.closes(), 1);
        assert!(
            err.to_string().contains("docker pull postgres"),
            "message should name the command: {err}"
        );
    }

    #[rstest]
    fn transport_error_closes_once(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        connector.push_transport_error("connection reset");

        let err = provisioner(&connector)
            .provision(&target, &config, &mut NoProgress)
            .expect_err("transport error should abort");

        assert!(matches!(err, ProvisionError::Transport { .. }), "got {err:?}");
        assert_eq!(connector.closes(), 1);
    }

    #[rstest]
    fn refused_connection_runs_nothing(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        connector.refuse_connections("Permission denied (publickey).");

        let err = provisioner(&connector)
            .provision(&target, &config, &mut NoProgress)
            .expect_err("open should fail");

        let ProvisionError::Connect { ref target, .. } = err else {
            panic!("expected connect error, got {err:?}");
        };
        assert_eq!(target, "admin@192.168.56.103");
        assert!(connector.commands().is_empty());
        assert_eq!(connector.closes(), 0);
    }

    #[rstest]
    fn close_failure_after_error_is_appended(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        connector.push_failure(125, "no such image");
        connector.fail_closes("control socket vanished");

        let err = provisioner(&connector)
            .provision(&target, &config, &mut NoProgress)
            .expect_err("step 1 should abort");

        let message = err.to_string();
        assert!(message.contains("no such image"), "message: {message}");
        assert!(
            message.contains("closing the session also failed"),
            "message: {message}"
        );
    }

    #[rstest]
    fn close_failure_after_success_is_not_an_error(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        for _ in 0..4 {
            connector.push_success("");
        }
        connector.fail_closes("control socket vanished");

        let result = provisioner(&connector).provision(&target, &config, &mut NoProgress);

        assert!(result.is_ok(), "got {result:?}");
        assert_eq!(connector.closes(), 1);
    }

    #[rstest]
    fn teardown_runs_the_removal_plan(target: Target, config: DatabaseConfig) {
        let connector = ScriptedConnector::new();
        for _ in 0..4 {
            connector.push_success("");
        }

        provisioner(&connector)
            .teardown(&target, &config, &mut NoProgress)
            .expect("teardown should succeed");

        assert_eq!(
            connector.commands(),
            vec![
                "docker stop pg",
                "docker rm pg",
                "docker rmi postgres",
                "docker volume rm pg_data_volume",
            ]
        );
        assert_eq!(connector.closes(), 1);
    }

    #[test]
    fn append_close_note_leaves_clean_messages_alone() {
        assert_eq!(append_close_note::<SessionError>(String::from("boom"), None), "boom");
    }
}
