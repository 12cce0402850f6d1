//! Configuration loader and validator for the migration runs.
//!
//! Connection settings come from the environment (`POSTGRES_*`, `MYSQL_*`),
//! optionally seeded from a `.env` file. Run behaviour comes from an optional
//! YAML file whose every field has a default.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::pipeline::RowPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Missing environment variable: {0}")]
    Missing(&'static str),
    #[error("Environment variable {0} is not a valid port")]
    InvalidPort(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub postgres: PostgresConfig,
    /// Absent when `MYSQL_HOST` is unset; only CSV imports can run then.
    pub mysql: Option<MySqlConfig>,
    pub run: RunOptions,
}

/// Target database connection.
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

/// Legacy database connection.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for PostgresConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PostgresConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Run options, read from YAML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunOptions {
    pub on_row_error: RowPolicy,
    pub report_dir: String,
    pub dry_run: bool,
    pub sku_base: u32,
    pub max_connections: u32,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            on_row_error: RowPolicy::Skip,
            report_dir: "./migration-reports".into(),
            dry_run: false,
            sku_base: 880_000,
            max_connections: 4,
        }
    }
}

impl RunOptions {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let opts: RunOptions = serde_yaml::from_str(&content)?;
        Ok(opts)
    }
}

impl Config {
    /// Read connection settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read connection settings through `lookup`; run options stay default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| -> Result<String, ConfigError> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let port = |key: &'static str, default: u16| -> Result<u16, ConfigError> {
            match lookup(key).filter(|v| !v.trim().is_empty()) {
                None => Ok(default),
                Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidPort(key)),
            }
        };

        let postgres = PostgresConfig {
            host: required("POSTGRES_HOST")?,
            port: port("POSTGRES_PORT", 5432)?,
            database: required("POSTGRES_DB")?,
            user: required("POSTGRES_USER")?,
            password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
        };
        let mysql = match lookup("MYSQL_HOST").filter(|v| !v.trim().is_empty()) {
            None => None,
            Some(host) => Some(MySqlConfig {
                host,
                port: port("MYSQL_PORT", 3306)?,
                database: required("MYSQL_DB_NAME")?,
                user: required("MYSQL_DB_USER")?,
                password: lookup("MYSQL_DB_PASSWORD").unwrap_or_default(),
            }),
        };

        Ok(Self {
            postgres,
            mysql,
            run: RunOptions::default(),
        })
    }

    /// Ensure required directories exist (creates `run.report_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        fs::create_dir_all(&self.run.report_dir)
    }
}

/// Load configuration from the environment plus an optional YAML run-options
/// file, then validate it.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let mut cfg = Config::from_env()?;
    if let Some(path) = path {
        cfg.run = RunOptions::load(path)?;
    }
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.postgres.host.trim().is_empty() {
        return Err(ConfigError::Invalid("postgres host must be non-empty"));
    }
    if cfg.postgres.port == 0 {
        return Err(ConfigError::Invalid("postgres port must be > 0"));
    }
    if cfg.postgres.database.trim().is_empty() {
        return Err(ConfigError::Invalid("postgres database must be non-empty"));
    }
    if cfg.postgres.user.trim().is_empty() {
        return Err(ConfigError::Invalid("postgres user must be non-empty"));
    }

    if let Some(mysql) = &cfg.mysql {
        if mysql.host.trim().is_empty() {
            return Err(ConfigError::Invalid("mysql host must be non-empty"));
        }
        if mysql.port == 0 {
            return Err(ConfigError::Invalid("mysql port must be > 0"));
        }
        if mysql.database.trim().is_empty() {
            return Err(ConfigError::Invalid("mysql database must be non-empty"));
        }
        if mysql.user.trim().is_empty() {
            return Err(ConfigError::Invalid("mysql user must be non-empty"));
        }
    }

    if cfg.run.report_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("run.report_dir must be non-empty"));
    }
    if cfg.run.sku_base >= 999_999 {
        return Err(ConfigError::Invalid("run.sku_base must be below 999999"));
    }
    if cfg.run.max_connections == 0 {
        return Err(ConfigError::Invalid("run.max_connections must be > 0"));
    }

    Ok(())
}

/// Example run-options YAML.
pub fn example() -> &'static str {
    r#"# skip: roll the row back to its savepoint and continue
# abort: roll back the whole run on the first row error
on_row_error: skip
report_dir: "./migration-reports"
dry_run: false
sku_base: 880000
max_connections: 4
"#
}
