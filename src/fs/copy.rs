//! Copy and compare primitives for local files.
//!
//! Replica files are never written in place: content goes to a temporary
//! sibling which is renamed over the destination once complete, so a reader
//! sees either the old bytes or the new ones.

use filetime::FileTime;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Read buffer used when comparing files.
const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// Prefix of staged copies; a leftover one is an ordinary replica-only entry.
pub const STAGING_PREFIX: &str = ".foldersync-";

/// Copy a single file, preserving permissions and access/modification times.
pub fn copy_file_atomic(from: &Path, to: &Path) -> io::Result<u64> {
    let parent = to.parent().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("destination has no parent directory: {}", to.display()),
        )
    })?;
    fs::create_dir_all(parent)?;

    let mut source = File::open(from)?;
    let metadata = source.metadata()?;
    if !metadata.is_file() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("not a regular file: {}", from.display()),
        ));
    }

    let mut staged = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .suffix(".tmp")
        .tempfile_in(parent)?;
    let bytes = io::copy(&mut source, staged.as_file_mut())?;
    staged.as_file().sync_all()?;

    filetime::set_file_handle_times(
        staged.as_file(),
        Some(FileTime::from_last_access_time(&metadata)),
        Some(FileTime::from_last_modification_time(&metadata)),
    )?;
    fs::set_permissions(staged.path(), metadata.permissions())?;

    // Dropping `staged` on any error above removes the temporary file.
    staged.persist(to).map_err(|err| err.error)?;
    Ok(bytes)
}

/// Compare two files byte for byte.
pub fn same_contents(a: &Path, b: &Path) -> io::Result<bool> {
    let file_a = File::open(a)?;
    let file_b = File::open(b)?;
    if file_a.metadata()?.len() != file_b.metadata()?.len() {
        return Ok(false);
    }

    let mut reader_a = BufReader::with_capacity(COMPARE_BUFFER_SIZE, file_a);
    let mut reader_b = BufReader::with_capacity(COMPARE_BUFFER_SIZE, file_b);

    loop {
        let chunk_a = reader_a.fill_buf()?;
        let chunk_b = reader_b.fill_buf()?;

        if chunk_a.is_empty() || chunk_b.is_empty() {
            // Equal only if both ended together (a file may grow mid-read)
            return Ok(chunk_a.is_empty() && chunk_b.is_empty());
        }

        let len = chunk_a.len().min(chunk_b.len());
        if chunk_a[..len] != chunk_b[..len] {
            return Ok(false);
        }

        reader_a.consume(len);
        reader_b.consume(len);
    }
}
