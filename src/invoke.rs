//! Runtime invocation.
//!
//! Foreground delegation to the unpacked runtime: the client execs
//! `<runtime> run <image> <forwarded-args...>` and adopts its exit code.
//! The client's connection to the session daemon stays open for the whole
//! invocation, which is what keeps the session alive.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Runs `<runtime> run <image> <args...>` in the foreground and returns
/// its exit code.
///
/// A death by signal maps to `128 + signo`, following shell convention.
pub fn invoke_runtime(runtime: &Path, image: &Path, args: &[String]) -> Result<i32> {
    debug!(
        runtime = %runtime.display(),
        image = %image.display(),
        args = ?args,
        "invoking runtime"
    );

    let status = Command::new(runtime)
        .arg("run")
        .arg(image)
        .args(args)
        .status()
        .map_err(|e| Error::InvokeFailed {
            path: runtime.to_path_buf(),
            reason: e.to_string(),
        })?;

    Ok(exit_code(status))
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|s| 128 + s))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
