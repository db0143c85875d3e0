//! Shared fixtures for provisioning and query BDD scenarios.

use pgprovision::test_support::ScriptedConnector;
use pgprovision::{
    BatchRunner, ClassificationMode, DatabaseConfig, NoProgress, ProvisionError, Provisioner,
    QueryError, QueryExecutor, Target,
};
use rstest::fixture;

/// Output `psql` prints for `SELECT 1;`.
pub const SINGLE_ROW_TABLE: &str = " ?column?\n----------\n 1\n(1 row)\n";

#[derive(Clone, Debug)]
pub struct ProvisionContext {
    pub connector: ScriptedConnector,
    pub target: Target,
    pub database: DatabaseConfig,
    pub mode: ClassificationMode,
}

impl ProvisionContext {
    pub fn new(mode: ClassificationMode) -> Self {
        Self {
            connector: ScriptedConnector::new(),
            target: Target::new("192.168.56.103", "admin")
                .unwrap_or_else(|err| panic!("literal target should validate: {err}")),
            database: DatabaseConfig::new("pg", "app", "u", "p"),
            mode,
        }
    }

    pub fn provision(&self) -> ProvisionOutcome {
        let provisioner = Provisioner::new(self.connector.clone(), BatchRunner::new(self.mode));
        let result = provisioner.provision(&self.target, &self.database, &mut NoProgress);
        ProvisionOutcome {
            result: result
                .map(|report| report.steps())
                .map_err(|err| ProvisionFailure::from_error(&err)),
            commands: self.connector.commands(),
            closes: self.connector.closes(),
        }
    }

    pub fn query(&self, sql: &str) -> QueryOutcome {
        let executor = QueryExecutor::new(self.connector.clone());
        let result = executor.query(&self.target, &self.database, sql);
        QueryOutcome {
            result: result.map_err(|err| QueryFailure {
                transport: matches!(err, QueryError::Transport { .. }),
                message: err.to_string(),
            }),
            closes: self.connector.closes(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FailureKind {
    Connect,
    Command,
    Transport,
}

#[derive(Clone, Debug)]
pub struct ProvisionFailure {
    pub kind: FailureKind,
    pub step: Option<usize>,
    pub reason: Option<String>,
    pub message: String,
}

impl ProvisionFailure {
    fn from_error(err: &ProvisionError) -> Self {
        let kind = match *err {
            ProvisionError::Connect { .. } => FailureKind::Connect,
            ProvisionError::Command { .. } => FailureKind::Command,
            ProvisionError::Transport { .. } => FailureKind::Transport,
        };
        let failed = err.failed_command();
        Self {
            kind,
            step: failed.map(|failure| failure.step),
            reason: failed.map(|failure| failure.reason.clone()),
            message: err.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ProvisionOutcome {
    /// Completed step count, or the failure that stopped the run.
    pub result: Result<usize, ProvisionFailure>,
    pub commands: Vec<String>,
    pub closes: usize,
}

#[derive(Clone, Debug)]
pub struct QueryFailure {
    pub transport: bool,
    pub message: String,
}

#[derive(Clone, Debug)]
pub struct QueryOutcome {
    pub result: Result<String, QueryFailure>,
    pub closes: usize,
}

#[fixture]
pub fn provision_context() -> ProvisionContext {
    ProvisionContext::new(ClassificationMode::ExitStatus)
}

#[fixture]
pub fn provision_outcome() -> ProvisionOutcome {
    ProvisionOutcome {
        result: Ok(0),
        commands: Vec::new(),
        closes: 0,
    }
}

#[fixture]
pub fn query_outcome() -> QueryOutcome {
    QueryOutcome {
        result: Ok(String::new()),
        closes: 0,
    }
}
