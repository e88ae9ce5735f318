//! Connection and runner configuration.

use std::{fmt, str::FromStr};

use connection_string::AdoNetString;

use crate::query::{DEFAULT_PARTITIONS, DEFAULT_TABLE, DEFAULT_TOTAL_ROWS};

pub const DEFAULT_PORT: u16 = 1433;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("malformed connection string: {0}")]
    Malformed(String),
    #[error("connection string has no Data Source")]
    MissingDataSource,
    #[error("invalid port in Data Source {0:?}")]
    InvalidPort(String),
    #[error("invalid boolean {value:?} for {key}")]
    InvalidBool { key: String, value: String },
    #[error("at least one partition is required")]
    NoPartitions,
    #[error("cannot split {total_rows} rows into {partitions} non-empty partitions")]
    TooFewRows { total_rows: u64, partitions: u64 },
    #[error("range ({lo}, {hi}] is empty")]
    EmptyRange { lo: u64, hi: u64 },
    #[error("range {next} does not start where {previous} ends")]
    NotContiguous { previous: String, next: String },
}

/// Where and how each read task connects.
///
/// Parsed from an ADO-style connection string:
/// `Data Source=host[\instance][,port];Initial Catalog=db;User ID=sa;Password=..;Trust Server Certificate=True;Pooling=False;`
///
/// Values may be quoted to contain `;`.
#[derive(Clone, PartialEq, Eq, serde::Serialize)]
pub struct ConnectionConfig {
    pub host: String,
    /// Named instance; its port is looked up through the SQL Browser service.
    pub instance: Option<String>,
    pub port: u16,
    pub database: Option<String>,
    pub user: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    pub trust_server_certificate: bool,
    /// Recorded for completeness. Connections are never pooled.
    pub pooling: bool,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            instance: None,
            port: DEFAULT_PORT,
            database: None,
            user: None,
            password: None,
            trust_server_certificate: false,
            pooling: false,
        }
    }
}

impl FromStr for ConnectionConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let pairs: AdoNetString = s
            .parse()
            .map_err(|e: connection_string::Error| ConfigError::Malformed(e.to_string()))?;
        let mut config = ConnectionConfig::new(String::new());
        let mut has_source = false;
        for (key, value) in pairs.iter() {
            let value = value.trim();
            let normalized: String = key
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect::<String>()
                .to_ascii_lowercase();
            match normalized.as_str() {
                "datasource" | "server" | "address" | "addr" => {
                    let source = parse_data_source(value)?;
                    config.host = source.host;
                    config.instance = source.instance;
                    config.port = source.port;
                    has_source = true;
                }
                "initialcatalog" | "database" => config.database = Some(value.to_owned()),
                "userid" | "uid" | "user" => config.user = Some(value.to_owned()),
                "password" | "pwd" => config.password = Some(value.to_owned()),
                "trustservercertificate" => {
                    config.trust_server_certificate = parse_bool(key, value)?
                }
                "pooling" => config.pooling = parse_bool(key, value)?,
                _ => {}
            }
        }
        if !has_source || config.host.is_empty() {
            return Err(ConfigError::MissingDataSource);
        }
        Ok(config)
    }
}

struct DataSource {
    host: String,
    instance: Option<String>,
    port: u16,
}

/// `[tcp:]host[\instance][,port]`
fn parse_data_source(value: &str) -> Result<DataSource, ConfigError> {
    let value = value.strip_prefix("tcp:").unwrap_or(value);
    let (server, port) = match value.split_once(',') {
        Some((server, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidPort(value.to_owned()))?;
            (server.trim(), port)
        }
        None => (value, DEFAULT_PORT),
    };
    let (host, instance) = match server.split_once('\\') {
        Some((host, instance)) if !instance.is_empty() => (host, Some(instance.to_owned())),
        Some((host, _)) => (host, None),
        None => (server, None),
    };
    Ok(DataSource {
        host: host.to_owned(),
        instance,
        port,
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" => Ok(true),
        "false" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.trim().to_owned(),
            value: value.to_owned(),
        }),
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("instance", &self.instance)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("pooling", &self.pooling)
            .finish()
    }
}

impl fmt::Display for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.instance {
            Some(instance) => write!(f, "{}\\{instance}", self.host)?,
            None => write!(f, "{}:{}", self.host, self.port)?,
        }
        if let Some(database) = &self.database {
            write!(f, "/{database}")?;
        }
        if let Some(user) = &self.user {
            write!(f, " as {user}")?;
        }
        Ok(())
    }
}

/// Everything a [`crate::BenchmarkRunner`] needs besides its connector.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunnerConfig {
    pub connection: ConnectionConfig,
    pub table: String,
    pub total_rows: u64,
    pub partitions: u64,
}

impl RunnerConfig {
    /// The fixture defaults: `dbo.test_table`, 50M rows, five ranges.
    pub fn new(connection: ConnectionConfig) -> Self {
        Self {
            connection,
            table: DEFAULT_TABLE.to_owned(),
            total_rows: DEFAULT_TOTAL_ROWS,
            partitions: DEFAULT_PARTITIONS,
        }
    }
}
