use std::time::Duration;

use clap::Parser;
use thiserror::Error;

/// Replication id announced by this server. Partial resync is not supported, so the id
/// never has to change.
pub const REPLICATION_ID: &str = "8371b4fb1155b71f4a04d3e1bc3e18c4a990aeeb";

#[derive(Error, Debug, PartialEq)]
pub enum CliError {
    #[error("Invalid command line flag: {0}")]
    InvalidCommandLineFlag(String),
    #[error("Invalid --replicaof value '{0}', expected \"<host> <port>\"")]
    InvalidReplicaOf(String),
}

#[derive(Parser, Debug)]
#[command(name = "redis-replica", about = "In-memory Redis-like server with replication")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = 6379, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: u16,

    /// Replicate from the master at "<host> <port>"
    #[arg(long)]
    pub replicaof: Option<String>,

    /// Timeout for each step of the replication handshake, in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub handshake_timeout_ms: u64,

    /// Forward SET expiries to replicas as absolute PXAT deadlines
    #[arg(long)]
    pub propagate_expiry: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RedisRole {
    Master,
    Replica((String, u16)),
}

impl RedisRole {
    pub fn as_string(&self) -> String {
        match self {
            RedisRole::Master => "master".to_string(),
            RedisRole::Replica(_) => "slave".to_string(),
        }
    }

    pub fn is_master(&self) -> bool {
        matches!(self, RedisRole::Master)
    }
}

/// Process configuration. Immutable once the server has started.
#[derive(Debug, Clone)]
pub struct RedisServer {
    pub port: u16,
    pub role: RedisRole,
    pub repl_id: String,
    pub repl_offset: u64,
    pub handshake_timeout: Duration,
    pub propagate_expiry: bool,
}

impl RedisServer {
    pub fn new<I: IntoIterator<Item = String>>(command_line_args: I) -> Result<Self, CliError> {
        let cli = Cli::try_parse_from(command_line_args)
            .map_err(|e| CliError::InvalidCommandLineFlag(e.to_string()))?;

        Self::try_from(cli)
    }

    pub fn master(port: u16) -> Self {
        Self {
            port,
            role: RedisRole::Master,
            repl_id: REPLICATION_ID.to_string(),
            repl_offset: 0,
            handshake_timeout: Duration::from_millis(5000),
            propagate_expiry: false,
        }
    }

    pub fn replica(port: u16, master_host: &str, master_port: u16) -> Self {
        Self {
            role: RedisRole::Replica((master_host.to_string(), master_port)),
            ..Self::master(port)
        }
    }
}

impl TryFrom<Cli> for RedisServer {
    type Error = CliError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        let role = match cli.replicaof {
            Some(replicaof) => RedisRole::Replica(parse_replicaof(&replicaof)?),
            None => RedisRole::Master,
        };

        Ok(Self {
            port: cli.port,
            role,
            repl_id: REPLICATION_ID.to_string(),
            repl_offset: 0,
            handshake_timeout: Duration::from_millis(cli.handshake_timeout_ms),
            propagate_expiry: cli.propagate_expiry,
        })
    }
}

fn parse_replicaof(value: &str) -> Result<(String, u16), CliError> {
    let invalid = || CliError::InvalidReplicaOf(value.to_string());

    let parts: Vec<&str> = value.split_whitespace().collect();
    let [host, port] = parts.as_slice() else {
        return Err(invalid());
    };

    let port = port
        .parse::<u16>()
        .ok()
        .filter(|port| *port != 0)
        .ok_or_else(invalid)?;

    Ok((host.to_string(), port))
}
