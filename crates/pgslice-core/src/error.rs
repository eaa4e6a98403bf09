use thiserror::Error;

/// Error type shared across pgslice crates.
#[derive(Debug, Error)]
pub enum Error {
    /// The database could not be reached or the session could not be opened.
    #[error("connection error: {0}")]
    Connection(String),
    /// Table or schema missing, or a catalog query failed.
    #[error("schema error: {0}")]
    Schema(String),
    /// An identifier failed validation before reaching any query.
    #[error("security error: {0}")]
    Security(String),
    /// A fetch by primary key returned no row.
    #[error("record not found: {0}")]
    RecordNotFound(String),
    /// The dependency graph of the collected records contains a cycle.
    #[error("Circular dependency detected between records: {}", .0.join(", "))]
    CircularDependency(Vec<String>),
    #[error("invalid timeframe: {0}")]
    InvalidTimeframe(String),
    /// Missing or malformed settings.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The session could not be switched to read-only mode.
    #[error("read-only enforcement failed: {0}")]
    ReadOnlyEnforcement(String),
}

impl Error {
    /// Errors that only cost one branch of a traversal instead of the whole run.
    pub fn is_recoverable_during_traversal(&self) -> bool {
        matches!(self, Error::RecordNotFound(_) | Error::Schema(_))
    }
}

/// Convenience alias for results returned by pgslice crates.
pub type Result<T> = std::result::Result<T, Error>;
