//! Command-line interface definitions for the `pgprovision` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `pgprovision` binary.
#[derive(Debug, Parser)]
#[command(
    name = "pgprovision",
    version,
    about = "Provision PostgreSQL in a container on a remote host over SSH",
    arg_required_else_help = true,
    after_help = "Each remote command is limited to 600 seconds by default. Set \
                  PGPROVISION_SSH_COMMAND_TIMEOUT_SECS (or command_timeout_secs in \
                  pgprovision.toml) to change the limit; 0 disables it."
)]
pub(crate) struct Cli {
    /// Emit debug logging on stderr.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Operation to perform.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Operations exposed by the binary.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Create the volume and container, then run the validation query.
    #[command(name = "provision")]
    Provision(HostArgs),
    /// Run one SQL statement through `psql` inside the container.
    #[command(name = "query")]
    Query(QueryCommand),
    /// Remove the container, image, and data volume.
    #[command(name = "teardown")]
    Teardown(HostArgs),
}

/// Target host selection shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct HostArgs {
    /// IPv4 address or resolvable host name of the remote machine.
    #[arg(value_name = "HOST")]
    pub(crate) host: String,
    /// SSH user; overrides `PGPROVISION_SSH_USER` and the `user` setting.
    #[arg(long, short = 'u', value_name = "USER")]
    pub(crate) user: Option<String>,
}

/// Arguments for the `pgprovision query` subcommand.
#[derive(Debug, Args)]
pub(crate) struct QueryCommand {
    /// Remote host selection.
    #[command(flatten)]
    pub(crate) host: HostArgs,
    /// SQL passed verbatim to `psql -c`.
    #[arg(value_name = "SQL")]
    pub(crate) sql: String,
}
