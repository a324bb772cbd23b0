//! Configuration module for the mock backend.
//!
//! All options come from command-line arguments; each can also be supplied
//! through the environment.

use clap::Parser;

/// Command-line arguments for the mock backend
#[derive(Parser, Debug)]
#[command(name = "mock-backend")]
#[command(author = "mock-backend authors")]
#[command(version = "0.1.0")]
#[command(about = "An interactive mock TCP backend for manually testing clients", long_about = None)]
pub struct CliArgs {
    /// Address to bind to (e.g., 0.0.0.0:8081)
    #[arg(short = 'l', long, env = "LISTEN", default_value = "0.0.0.0:8081")]
    pub listen: String,

    /// Receive chunk size in bytes
    #[arg(short = 'b', long, env = "BUF_SIZE", default_value_t = 1024)]
    pub buf_size: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub buf_size: usize,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI arguments and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        if cli.buf_size == 0 {
            return Err(ConfigError::InvalidBufSize);
        }

        Ok(Config {
            listen: cli.listen,
            buf_size: cli.buf_size,
            log_level: cli.log_level,
        })
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    InvalidBufSize,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidBufSize => {
                write!(f, "buf-size must be at least 1")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = CliArgs::try_parse_from(["mock-backend"]).unwrap();
        let config = Config::from_args(cli).unwrap();
        assert_eq!(config.listen, "0.0.0.0:8081");
        assert_eq!(config.buf_size, 1024);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_flag_overrides() {
        let cli = CliArgs::try_parse_from([
            "mock-backend",
            "--listen",
            "127.0.0.1:9000",
            "--buf-size",
            "4096",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = Config::from_args(cli).unwrap();
        assert_eq!(config.listen, "127.0.0.1:9000");
        assert_eq!(config.buf_size, 4096);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_zero_buf_size_rejected() {
        let cli = CliArgs::try_parse_from(["mock-backend", "--buf-size", "0"]).unwrap();
        assert!(Config::from_args(cli).is_err());
    }
}
