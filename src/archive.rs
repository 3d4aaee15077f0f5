//! # Archive Reader
//!
//! Byte-range extraction from the self-extracting artifact.
//!
//! ## Artifact Layout
//!
//! ```text
//! ┌────────────────┬──────────────────┬─────────────────────────┐
//! │ control script │ runtime binary   │ container image         │
//! │ [0, script_len)│ [script_len,     │ [script_len+runtime_len,│
//! │                │  +runtime_len)   │  EOF)                   │
//! └────────────────┴──────────────────┴─────────────────────────┘
//! ```
//!
//! Segment boundaries are byte offsets supplied out-of-band as launch
//! parameters; nothing is read from the artifact to discover them.
//!
//! ## Atomic Writes
//!
//! Every extraction writes to a `tmp.<uuid>` sibling and renames into
//! place, so a crash mid-extraction never leaves a truncated destination
//! under the final name. A failed extraction's destination is still
//! untrustworthy: no cleanup beyond the temp file is attempted.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;

/// Copies the byte range `[start, end)` of `source` into `dest`,
/// creating or overwriting it.
///
/// # Errors
///
/// Fails if the source is unreadable, the destination is unwritable, or
/// the range is invalid (`end < start` or `end` past EOF). Errors are
/// always surfaced, never retried.
pub fn extract_segment(source: &Path, start: u64, end: u64, dest: &Path) -> Result<()> {
    let mut file = open_artifact(source)?;
    let len = artifact_len(&file, source)?;

    if end < start || end > len {
        return Err(Error::InvalidSegmentRange { start, end, len });
    }

    copy_range(&mut file, source, start, end, dest)?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        bytes = end - start,
        "extracted segment"
    );
    Ok(())
}

/// Copies everything after the first `exclude` bytes of `source` into
/// `dest`, creating or overwriting it.
pub fn extract_tail(source: &Path, exclude: u64, dest: &Path) -> Result<()> {
    let mut file = open_artifact(source)?;
    let len = artifact_len(&file, source)?;

    if exclude > len {
        return Err(Error::InvalidSegmentRange {
            start: exclude,
            end: len,
            len,
        });
    }

    copy_range(&mut file, source, exclude, len, dest)?;

    debug!(
        source = %source.display(),
        dest = %dest.display(),
        bytes = len - exclude,
        "extracted tail"
    );
    Ok(())
}

/// Extracts the embedded runtime segment and marks it executable.
///
/// The runtime occupies `[script_len, script_len + runtime_len)`. After
/// extraction the destination is chmod'd to 0o711 (owner rwx, group/other
/// execute), matching what the wrapped runtime expects of itself.
pub fn extract_runtime(source: &Path, script_len: u64, runtime_len: u64, dest: &Path) -> Result<()> {
    extract_segment(source, script_len, script_len + runtime_len, dest)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        use crate::constants::RUNTIME_FILE_MODE;
        fs::set_permissions(dest, fs::Permissions::from_mode(RUNTIME_FILE_MODE)).map_err(|e| {
            Error::DestinationUnwritable {
                path: dest.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
    }

    Ok(())
}

/// Extracts the trailing image segment (everything after script + runtime).
pub fn extract_image(source: &Path, script_len: u64, runtime_len: u64, dest: &Path) -> Result<()> {
    extract_tail(source, script_len + runtime_len, dest)
}

/// Seeks to `start` and streams `end - start` bytes into `dest`.
fn copy_range(file: &mut File, source: &Path, start: u64, end: u64, dest: &Path) -> Result<()> {
    file.seek(SeekFrom::Start(start))
        .map_err(|e| Error::ArtifactUnreadable {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;

    let mut reader = file.take(end - start);
    write_atomic(dest, &mut reader)
}

fn open_artifact(source: &Path) -> Result<File> {
    File::open(source).map_err(|e| Error::ArtifactUnreadable {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })
}

fn artifact_len(file: &File, source: &Path) -> Result<u64> {
    let meta = file.metadata().map_err(|e| Error::ArtifactUnreadable {
        path: source.to_path_buf(),
        reason: e.to_string(),
    })?;
    Ok(meta.len())
}

/// Writes the reader's contents to `dest` via a unique temp file + rename.
///
/// Concurrent extractors of the same destination use different temp files;
/// the final rename is atomic, so the last writer wins with intact content.
fn write_atomic(dest: &Path, reader: &mut impl io::Read) -> Result<()> {
    let unwritable = |e: io::Error| Error::DestinationUnwritable {
        path: dest.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(unwritable)?;
        }
    }

    let temp_name = format!("tmp.{}", uuid::Uuid::now_v7());
    let temp_path = dest.with_extension(temp_name);

    let mut out = File::create(&temp_path).map_err(unwritable)?;
    let copied = io::copy(reader, &mut out);
    match copied {
        Ok(_) => {}
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            return Err(unwritable(e));
        }
    }

    fs::rename(&temp_path, dest).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        unwritable(e)
    })?;
    Ok(())
}
