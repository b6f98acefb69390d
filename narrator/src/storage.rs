//! Durable file publishing shared by progress, segments and merged output.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use tempfile::NamedTempFile;

/// Create a temp file next to `dest`, so the final rename stays on one
/// filesystem.
pub fn temp_beside(dest: &Path) -> io::Result<NamedTempFile> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    tempfile::Builder::new()
        .prefix(".partial-")
        .tempfile_in(dir)
}

/// Flush and sync a fully written temp file, then rename it over `dest`.
///
/// Readers see either the previous file or the complete new one.
pub fn publish(mut temp: NamedTempFile, dest: &Path) -> io::Result<()> {
    temp.flush()?;
    temp.as_file().sync_all()?;
    temp.persist(dest).map_err(|e| e.error)?;
    if let Some(parent) = dest.parent() {
        sync_dir(parent)?;
    }
    Ok(())
}

/// Write `bytes` to `dest` atomically.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> io::Result<()> {
    let mut temp = temp_beside(dest)?;
    temp.write_all(bytes)?;
    publish(temp, dest)
}

/// Make directory entry changes (creates, renames) durable.
#[cfg(unix)]
pub fn sync_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
pub fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}
