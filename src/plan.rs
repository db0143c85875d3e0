//! Command plans that stand up and tear down PostgreSQL in a container.
//!
//! Commands are built from structured arguments. Each argument is
//! shell-escaped on its own, so values from configuration can never split
//! into extra words or chain further commands on the remote shell.

use std::fmt;

use shell_escape::unix::escape;

use crate::batch::RemoteCommand;

/// Container image pulled and started by the provisioning plan.
pub const POSTGRES_IMAGE: &str = "postgres";
/// Named volume holding the database files.
pub const DATA_VOLUME: &str = "pg_data_volume";
/// Port published on the host and inside the container.
pub const POSTGRES_PORT: u16 = 5432;
/// Data directory inside the official PostgreSQL image.
pub const DATA_DIRECTORY: &str = "/var/lib/postgresql/data";

const CONTAINER_RUNTIME: &str = "docker";
const REMOTE_ACCESS_RULE: &str = "host all all 0.0.0.0/0 md5";
/// Polls over TCP so the entrypoint's socket-only bootstrap server does not
/// count as ready; `initdb` has finished once this succeeds.
const WAIT_FOR_SERVER: &str = "until pg_isready -q -h 127.0.0.1; do sleep 1; done";

/// Database parameters used to render provisioning and query commands.
#[derive(Clone, Eq, PartialEq)]
pub struct DatabaseConfig {
    /// Name given to the container.
    pub container_name: String,
    /// Database created on first start.
    pub db_name: String,
    /// Superuser created on first start.
    pub user: String,
    /// Superuser password.
    pub password: String,
}

impl DatabaseConfig {
    /// Creates a database configuration.
    #[must_use]
    pub fn new(
        container_name: impl Into<String>,
        db_name: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            db_name: db_name.into(),
            user: user.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("container_name", &self.container_name)
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Joins `args` into one command line, escaping each argument.
///
/// Arguments made only of alphanumerics and `-_=/,.+` render verbatim;
/// anything else is single-quoted.
pub(crate) fn render(args: &[&str]) -> String {
    args.iter()
        .map(|arg| escape((*arg).into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Builds the four provisioning steps for `config`, in execution order.
///
/// # Examples
///
/// ```
/// use pgprovision::plan::{DatabaseConfig, build_plan};
///
/// let plan = build_plan(&DatabaseConfig::new("pg", "app", "u", "p"));
/// assert_eq!(plan.len(), 4);
/// assert_eq!(plan[1].text, "docker pull postgres");
/// ```
#[must_use]
pub fn build_plan(config: &DatabaseConfig) -> Vec<RemoteCommand> {
    let password = format!("POSTGRES_PASSWORD={}", config.password);
    let user = format!("POSTGRES_USER={}", config.user);
    let database = format!("POSTGRES_DB={}", config.db_name);
    let ports = format!("{POSTGRES_PORT}:{POSTGRES_PORT}");
    let mount = format!("{DATA_VOLUME}:{DATA_DIRECTORY}");
    let append_rule = format!(
        "{WAIT_FOR_SERVER}; echo \"{REMOTE_ACCESS_RULE}\" >> {DATA_DIRECTORY}/pg_hba.conf"
    );

    vec![
        RemoteCommand::new(
            "Creating data volume",
            render(&[CONTAINER_RUNTIME, "volume", "create", DATA_VOLUME]),
        ),
        RemoteCommand::new(
            "Pulling PostgreSQL image",
            render(&[CONTAINER_RUNTIME, "pull", POSTGRES_IMAGE]),
        ),
        RemoteCommand::new(
            "Starting PostgreSQL container",
            render(&[
                CONTAINER_RUNTIME,
                "run",
                "-d",
                "--restart",
                "unless-stopped",
                "--name",
                &config.container_name,
                "-e",
                &password,
                "-e",
                &user,
                "-e",
                &database,
                "-p",
                &ports,
                "-v",
                &mount,
                POSTGRES_IMAGE,
            ]),
        ),
        RemoteCommand::new(
            "Allowing remote connections",
            render(&[
                CONTAINER_RUNTIME,
                "exec",
                &config.container_name,
                "bash",
                "-c",
                &append_rule,
            ]),
        ),
    ]
}

/// Builds the steps that remove everything [`build_plan`] created.
#[must_use]
pub fn build_teardown_plan(config: &DatabaseConfig) -> Vec<RemoteCommand> {
    vec![
        RemoteCommand::new(
            "Stopping PostgreSQL container",
            render(&[CONTAINER_RUNTIME, "stop", &config.container_name]),
        ),
        RemoteCommand::new(
            "Removing PostgreSQL container",
            render(&[CONTAINER_RUNTIME, "rm", &config.container_name]),
        ),
        RemoteCommand::new(
            "Removing PostgreSQL image",
            render(&[CONTAINER_RUNTIME, "rmi", POSTGRES_IMAGE]),
        ),
        RemoteCommand::new(
            "Removing data volume",
            render(&[CONTAINER_RUNTIME, "volume", "rm", DATA_VOLUME]),
        ),
    ]
}

/// Renders the `psql` invocation for `query_text` inside the container.
#[must_use]
pub fn query_command(config: &DatabaseConfig, query_text: &str) -> String {
    render(&[
        CONTAINER_RUNTIME,
        "exec",
        &config.container_name,
        "psql",
        "-U",
        &config.user,
        "-d",
        &config.db_name,
        "-c",
        query_text,
    ])
}
