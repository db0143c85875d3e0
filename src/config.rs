//! Database configuration loading via `ortho-config`.

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::batch::ClassificationMode;
use crate::plan::DatabaseConfig;

/// Provisioning settings derived from environment variables and
/// configuration files.
#[derive(Clone, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "PGPROVISION",
    discovery(
        app_name = "pgprovision",
        env_var = "PGPROVISION_CONFIG_PATH",
        config_file_name = "pgprovision.toml",
        dotfile_name = ".pgprovision.toml",
        project_file_name = "pgprovision.toml"
    )
)]
pub struct ProvisionConfig {
    /// Name of the PostgreSQL container. Defaults to `postgres`.
    #[ortho_config(default = "postgres".to_owned())]
    pub container_name: String,
    /// Database created on first start. Defaults to `postgres`.
    #[ortho_config(default = "postgres".to_owned())]
    pub db_name: String,
    /// Database superuser. Defaults to `postgres`.
    #[ortho_config(default = "postgres".to_owned())]
    pub db_user: String,
    /// Database superuser password. This value is required.
    pub db_password: String,
    /// Query run after provisioning to confirm the database answers.
    #[ortho_config(default = "SELECT 1;".to_owned())]
    pub validation_query: String,
    /// Treat any standard error output as failure instead of checking exit
    /// status.
    #[ortho_config(default = false)]
    pub classify_by_stderr: bool,
}

impl std::fmt::Debug for ProvisionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisionConfig")
            .field("container_name", &self.container_name)
            .field("db_name", &self.db_name)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("validation_query", &self.validation_query)
            .field("classify_by_stderr", &self.classify_by_stderr)
            .finish()
    }
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl ProvisionConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to pgprovision.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails, including when
    /// no password is configured anywhere.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("pgprovision")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Builds the [`DatabaseConfig`] used to render commands.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when validation fails.
    pub fn as_database_config(&self) -> Result<DatabaseConfig, ConfigError> {
        self.validate()?;
        Ok(DatabaseConfig::new(
            &self.container_name,
            &self.db_name,
            &self.db_user,
            &self.db_password,
        ))
    }

    /// Classification rule selected by `classify_by_stderr`.
    #[must_use]
    pub const fn classification_mode(&self) -> ClassificationMode {
        if self.classify_by_stderr {
            ClassificationMode::Stderr
        } else {
            ClassificationMode::ExitStatus
        }
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a required field is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.container_name,
            &FieldMetadata::new(
                "container name",
                "PGPROVISION_CONTAINER_NAME",
                "container_name",
            ),
        )?;
        Self::require_field(
            &self.db_name,
            &FieldMetadata::new("database name", "PGPROVISION_DB_NAME", "db_name"),
        )?;
        Self::require_field(
            &self.db_user,
            &FieldMetadata::new("database user", "PGPROVISION_DB_USER", "db_user"),
        )?;
        Self::require_field(
            &self.db_password,
            &FieldMetadata::new(
                "database password",
                "PGPROVISION_DB_PASSWORD",
                "db_password",
            ),
        )?;
        Self::require_field(
            &self.validation_query,
            &FieldMetadata::new(
                "validation query",
                "PGPROVISION_VALIDATION_QUERY",
                "validation_query",
            ),
        )?;
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}
