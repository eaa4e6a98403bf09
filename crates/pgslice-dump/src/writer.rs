use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::errors::DumpError;

/// Write `sql` to `path`, creating missing parent directories. Returns the
/// number of bytes written.
pub fn write_to_file(path: &Path, sql: &str) -> Result<u64, DumpError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(sql.as_bytes())?;
    writer.flush()?;

    let bytes = sql.len() as u64;
    info!(
        path = %path.display(),
        bytes,
        lines = sql.lines().count(),
        "SQL written to file"
    );
    Ok(bytes)
}

/// Write `sql` to stdout and flush.
pub fn write_to_stdout(sql: &str) -> Result<(), DumpError> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle.write_all(sql.as_bytes())?;
    if !sql.ends_with('\n') {
        handle.write_all(b"\n")?;
    }
    handle.flush()?;
    Ok(())
}
