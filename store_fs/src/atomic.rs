//! Replace-by-rename file writes.

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

use crate::FsError;

/// Write `contents` to `path` so readers never observe a half-written file.
///
/// The data goes to a uniquely named hidden sibling first and is renamed over
/// `path`, which is atomic on the same filesystem. Concurrent writers never
/// share a temp file.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<(), FsError> {
    let not_a_file = || FsError::Corruption(format!("not a file path: {}", path.display()));
    let file_name = path.file_name().and_then(|n| n.to_str()).ok_or_else(not_a_file)?;
    let dir = path.parent().ok_or_else(not_a_file)?;
    let mut tmp = Builder::new()
        .prefix(&format!(".{file_name}."))
        .suffix(".tmp")
        .tempfile_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Remove a file, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool, FsError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}
