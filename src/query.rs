//! Ad-hoc queries against a provisioned database.

use thiserror::Error;
use tracing::{debug, warn};

use crate::plan::{DatabaseConfig, query_command};
use crate::provision::append_close_note;
use crate::session::{Connector, RemoteSession, SessionError};
use crate::target::Target;

/// Errors surfaced while running a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Raised when the query session could not be opened.
    #[error("failed to connect to {target}: {source}")]
    Connect {
        /// Destination the session was opened against.
        target: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
    /// Raised when the client invocation could not run.
    #[error("query could not run: {message}")]
    Transport {
        /// Human-readable description of the failure.
        message: String,
        /// Underlying session error.
        #[source]
        source: SessionError,
    },
}

/// Runs single queries through `psql` inside the database container.
#[derive(Debug)]
pub struct QueryExecutor<C: Connector> {
    connector: C,
}

impl<C: Connector> QueryExecutor<C> {
    /// Creates an executor that opens sessions through `connector`.
    #[must_use]
    pub const fn new(connector: C) -> Self {
        Self { connector }
    }

    /// Runs `query_text` against `config`'s database on `target`.
    ///
    /// The query is passed to `psql -c` as a single quoted argument and is
    /// otherwise not inspected. The client's error output wins over its
    /// standard output when both are present; a failing query therefore
    /// returns its error text rather than an error value.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError::Connect`] when the session cannot be opened and
    /// [`QueryError::Transport`] when the client cannot be invoked.
    pub fn query(
        &self,
        target: &Target,
        config: &DatabaseConfig,
        query_text: &str,
    ) -> Result<String, QueryError> {
        let mut session = self
            .connector
            .open(target)
            .map_err(|source| QueryError::Connect {
                target: target.destination(),
                source,
            })?;

        let command = query_command(config, query_text);
        debug!(destination = %target, command = %command, "running query");
        let outcome = session.run(&command);
        let close_error = session.close().err();

        match outcome {
            Ok(output) => {
                if let Some(ref err) = close_error {
                    warn!(destination = %target, error = %err, "failed to close session after query");
                }
                if output.stderr.is_empty() {
                    Ok(output.stdout)
                } else {
                    Ok(output.stderr)
                }
            }
            Err(source) => Err(QueryError::Transport {
                message: append_close_note(source.to_string(), close_error.as_ref()),
                source,
            }),
        }
    }
}
