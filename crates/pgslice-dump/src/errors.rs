use thiserror::Error;

/// Errors emitted while producing or writing a dump.
#[derive(Debug, Error)]
pub enum DumpError {
    #[error(transparent)]
    Core(#[from] pgslice_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl DumpError {
    /// The wrapped core error, if any.
    pub fn core(&self) -> Option<&pgslice_core::Error> {
        match self {
            DumpError::Core(err) => Some(err),
            DumpError::Io(_) => None,
        }
    }
}
