use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};

use crate::errors::{config_error, CliError, CliResult};

/// Filter directive for a user-facing level name.
pub fn level_directive(level: &str) -> CliResult<&'static str> {
    match level.trim().to_ascii_uppercase().as_str() {
        "DEBUG" => Ok("debug"),
        "INFO" => Ok("info"),
        "WARNING" | "WARN" => Ok("warn"),
        "ERROR" => Ok("error"),
        _ => Err(config_error(format!(
            "Invalid log level {level:?} (expected DEBUG, INFO, WARNING or ERROR)"
        ))),
    }
}

/// Install the stderr subscriber. Without a level nothing is installed and
/// only the final error line reaches the terminal.
pub fn init_logging(level: Option<&str>, json: bool) -> CliResult<()> {
    let Some(level) = level else {
        return Ok(());
    };
    let directive = level_directive(level)?;
    let filter = EnvFilter::try_new(format!("{directive},sqlx=warn"))
        .map_err(|err| CliError::Logging(err.to_string()))?;

    let layer = if json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|err| CliError::Logging(err.to_string()))
}
