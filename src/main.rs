//! Binary entry point for the `pgprovision` CLI.

use std::io::{self, Write};
use std::process;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use pgprovision::{
    BatchRunner, Classification, ConfigError, DatabaseConfig, ProcessCommandRunner, Progress,
    ProvisionConfig, ProvisionError, Provisioner, QueryError, QueryExecutor, RemoteCommand,
    SessionError, SshConfig, SshConfigLoadError, SshConnector, Target, TargetError,
};

mod cli;

use cli::{Cli, Command, HostArgs};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("configuration error: {0}")]
    SshConfig(#[from] SshConfigLoadError),
    #[error("ssh settings rejected: {0}")]
    Session(#[from] SessionError),
    #[error("{0}")]
    Target(#[from] TargetError),
    #[error("{0}")]
    Provision(#[from] ProvisionError),
    #[error("{0}")]
    Query(#[from] QueryError),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

/// Everything an operation needs once configuration and the host are valid.
struct Invocation {
    target: Target,
    connector: SshConnector<ProcessCommandRunner>,
    settings: ProvisionConfig,
    database: DatabaseConfig,
}

impl Invocation {
    fn prepare(args: &HostArgs) -> Result<Self, CliError> {
        let ssh = SshConfig::load_without_cli_args()?;
        let user = args.user.as_deref().unwrap_or(&ssh.user);
        let target = Target::new(&args.host, user)?;

        let settings = ProvisionConfig::load_without_cli_args()?;
        let database = settings.as_database_config()?;
        let connector = SshConnector::with_process_runner(ssh)?;

        Ok(Self {
            target,
            connector,
            settings,
            database,
        })
    }

    fn provisioner(&self) -> Provisioner<SshConnector<ProcessCommandRunner>> {
        Provisioner::new(
            self.connector.clone(),
            BatchRunner::new(self.settings.classification_mode()),
        )
    }

    fn query(&self, sql: &str) -> Result<String, CliError> {
        let executor = QueryExecutor::new(self.connector.clone());
        Ok(executor.query(&self.target, &self.database, sql)?)
    }
}

/// Prints `[k/n] label... Done` lines as a batch advances.
struct ConsoleProgress<W: Write> {
    out: W,
}

impl<W: Write> Progress for ConsoleProgress<W> {
    fn started(&mut self, step: usize, total: usize, command: &RemoteCommand) {
        write!(self.out, "[{step}/{total}] {}... ", command.label).ok();
        self.out.flush().ok();
    }

    fn finished(
        &mut self,
        _step: usize,
        _total: usize,
        _command: &RemoteCommand,
        classification: &Classification,
    ) {
        let verdict = match *classification {
            Classification::Success => "Done",
            Classification::Failed { .. } => "Error",
        };
        writeln!(self.out, "{verdict}").ok();
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let exit_code = match dispatch(cli.command) {
        Ok(()) => 0,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("pgprovision=debug")
        } else {
            EnvFilter::new("pgprovision=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn dispatch(command: Command) -> Result<(), CliError> {
    let mut stdout = io::stdout();
    match command {
        Command::Provision(args) => provision(&args, &mut stdout),
        Command::Query(args) => {
            let invocation = Invocation::prepare(&args.host)?;
            let result = invocation.query(&args.sql)?;
            write_result(&mut stdout, &result)
        }
        Command::Teardown(args) => {
            let invocation = Invocation::prepare(&args)?;
            let mut progress = ConsoleProgress { out: io::stdout() };
            invocation.provisioner().teardown(
                &invocation.target,
                &invocation.database,
                &mut progress,
            )?;
            writeln!(stdout, "Teardown completed")?;
            Ok(())
        }
    }
}

fn provision(args: &HostArgs, stdout: &mut impl Write) -> Result<(), CliError> {
    let invocation = Invocation::prepare(args)?;
    let mut progress = ConsoleProgress { out: io::stdout() };
    invocation
        .provisioner()
        .provision(&invocation.target, &invocation.database, &mut progress)?;
    writeln!(stdout, "Provisioning completed")?;

    let result = invocation.query(&invocation.settings.validation_query)?;
    writeln!(stdout, "Validation query result:")?;
    write_result(stdout, &result)
}

fn write_result(out: &mut impl Write, result: &str) -> Result<(), CliError> {
    if result.ends_with('\n') || result.is_empty() {
        write!(out, "{result}")?;
    } else {
        writeln!(out, "{result}")?;
    }
    Ok(())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "error: {err}").ok();
}
