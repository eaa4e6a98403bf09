use std::path::PathBuf;

use pgslice_dump::DumpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] pgslice_core::Error),
    #[error(transparent)]
    Dump(#[from] DumpError),
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("logging setup failed: {0}")]
    Logging(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CliResult<T> = Result<T, CliError>;

/// Shorthand for a configuration error.
pub fn config_error(message: impl Into<String>) -> CliError {
    CliError::Core(pgslice_core::Error::Configuration(message.into()))
}
