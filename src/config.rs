//! Server configuration, parsed from the command line.

use crate::{DEFAULT_AOF_PATH, DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "ledgerkv")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Replay the append-only log at startup and append every update to it
    #[arg(long)]
    pub aof: bool,

    /// Location of the append-only log
    #[arg(long, default_value = DEFAULT_AOF_PATH)]
    pub aof_path: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Returns the bind address as a string
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse_from(["ledgerkv"]);

        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert!(!config.aof);
        assert_eq!(config.aof_path, PathBuf::from("redis-aof.log"));
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_overrides() {
        let config = Config::parse_from([
            "ledgerkv",
            "--host",
            "0.0.0.0",
            "-p",
            "6380",
            "--aof",
            "--aof-path",
            "/var/lib/ledgerkv/appendonly.aof",
            "--log-level",
            "debug",
        ]);

        assert_eq!(config.bind_address(), "0.0.0.0:6380");
        assert!(config.aof);
        assert_eq!(
            config.aof_path,
            PathBuf::from("/var/lib/ledgerkv/appendonly.aof")
        );
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Config::try_parse_from(["ledgerkv", "--port", "70000"]).is_err());
    }

    #[test]
    fn test_command_definition() {
        use clap::CommandFactory;
        Config::command().debug_assert();
    }
}
