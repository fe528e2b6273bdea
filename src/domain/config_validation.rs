//! Service configuration: validation and typed settings.
//!
//! Every key is optional; defaults apply when a key is absent.

use crate::domain::calendar::RunBoundary;
use crate::domain::error::RebalanceError;
use crate::ports::config_port::ConfigPort;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:8000";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    pub listen: SocketAddr,
    /// Base directory for relative dataset paths.
    pub data_root: PathBuf,
    /// Boundary used when a request does not carry its own end date.
    pub run_end: RunBoundary,
    pub log_level: String,
    pub log_ansi: bool,
    /// Async runtime worker threads; `None` lets the runtime decide.
    pub workers: Option<usize>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            data_root: PathBuf::from("."),
            run_end: RunBoundary::EndOfData,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_ansi: true,
            workers: None,
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, RebalanceError> {
        validate_service_config(config)?;

        let listen = config
            .get_string("server", "listen")
            .unwrap_or_else(|| DEFAULT_LISTEN.to_string());
        let listen = parse_listen(&listen)?;
        let run_end = match config.get_string("backtest", "run_end") {
            Some(s) => parse_run_end(&s)?,
            None => RunBoundary::EndOfData,
        };
        let workers = match config.get_int("server", "workers", 0) {
            0 => None,
            n => Some(n as usize),
        };

        Ok(Self {
            listen,
            data_root: config
                .get_string("data", "root")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            run_end,
            log_level: config
                .get_string("logging", "level")
                .map(|l| l.to_lowercase())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            log_ansi: config.get_bool("logging", "ansi", true),
            workers,
        })
    }
}

pub fn validate_service_config(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    validate_listen(config)?;
    validate_run_end(config)?;
    validate_log_level(config)?;
    validate_workers(config)?;
    Ok(())
}

fn validate_listen(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    match config.get_string("server", "listen") {
        Some(s) => parse_listen(&s).map(|_| ()),
        None => Ok(()),
    }
}

fn parse_listen(value: &str) -> Result<SocketAddr, RebalanceError> {
    value.parse().map_err(|_| {
        RebalanceError::invalid(
            "server",
            "listen",
            format!("'{}' is not a socket address (expected host:port)", value),
        )
    })
}

fn validate_run_end(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    match config.get_string("backtest", "run_end") {
        Some(s) => parse_run_end(&s).map(|_| ()),
        None => Ok(()),
    }
}

fn parse_run_end(value: &str) -> Result<RunBoundary, RebalanceError> {
    value
        .parse()
        .map_err(|reason: String| RebalanceError::invalid("backtest", "run_end", reason))
}

fn validate_log_level(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    match config.get_string("logging", "level") {
        Some(level) if !LOG_LEVELS.contains(&level.to_lowercase().as_str()) => {
            Err(RebalanceError::invalid(
                "logging",
                "level",
                format!("must be one of {}", LOG_LEVELS.join(", ")),
            ))
        }
        _ => Ok(()),
    }
}

fn validate_workers(config: &dyn ConfigPort) -> Result<(), RebalanceError> {
    if config.get_int("server", "workers", 0) < 0 {
        return Err(RebalanceError::invalid(
            "server",
            "workers",
            "workers must be non-negative",
        ));
    }
    Ok(())
}
