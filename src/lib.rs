//! Core library for the `pgprovision` remote database provisioning tool.
//!
//! The crate stands up PostgreSQL in a container on a remote host by running
//! a fixed, ordered command plan over one SSH session (open, execute, close),
//! then checks the result with an ad-hoc query through a fresh session.
//! Every command is classified as it completes and the first failure stops
//! the batch.

pub mod batch;
pub mod config;
pub mod plan;
pub mod provision;
pub mod query;
pub mod session;
pub mod target;
pub mod test_support;

pub use batch::{
    BatchRunner, Classification, ClassificationMode, CommandFailedError, CommandResult,
    NoProgress, Progress, RemoteCommand, RunError, RunReport,
};
pub use config::{ConfigError, ProvisionConfig};
pub use plan::{DatabaseConfig, build_plan, build_teardown_plan};
pub use provision::{ProvisionError, Provisioner};
pub use query::{QueryError, QueryExecutor};
pub use session::{
    CommandOutput, CommandRunner, Connector, ProcessCommandRunner, RemoteSession, SessionError,
    SshConfig, SshConfigLoadError, SshConnector, SshSession,
};
pub use target::{HostResolver, SystemResolver, Target, TargetError};
