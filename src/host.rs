//! Host runtime discovery.
//!
//! Probes the host for an installed runtime binary and a compatible
//! version string. The session daemon uses the answer once, at provisioning
//! time: a compatible installation is symlinked into the scratch directory
//! instead of extracting the embedded runtime segment.
//!
//! Absence, an incompatible version, or a failed probe are all silent
//! fallbacks to embedded extraction, never errors.

use crate::constants::{COMPATIBLE_VERSION_PREFIXES, HOST_RUNTIME_NAME};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Locates a compatible host-installed runtime, if any.
///
/// Searches `PATH` for the runtime binary and accepts it iff its
/// `--version` output matches the accepted pattern.
pub fn find_host_runtime() -> Option<PathBuf> {
    let path = locate_on_path(HOST_RUNTIME_NAME)?;

    match probe_version(&path) {
        Some(version) if version_compatible(&version) => {
            info!(path = %path.display(), version = %version, "using host runtime");
            Some(path)
        }
        Some(version) => {
            debug!(
                path = %path.display(),
                version = %version,
                "host runtime version incompatible"
            );
            None
        }
        None => {
            debug!(path = %path.display(), "host runtime version probe failed");
            None
        }
    }
}

/// Resolves an executable name against the `PATH` environment variable.
fn locate_on_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Runs `<path> --version` and returns the trimmed output, if the probe
/// succeeds.
fn probe_version(path: &Path) -> Option<String> {
    let output = Command::new(path).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Checks a version string against the accepted prefixes.
pub fn version_compatible(version: &str) -> bool {
    COMPATIBLE_VERSION_PREFIXES
        .iter()
        .any(|prefix| version.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_compatibility() {
        assert!(version_compatible("apptainer version 1.3.2"));
        assert!(!version_compatible("apptainer version 0.9.0"));
        assert!(!version_compatible("singularity version 3.8"));
        assert!(!version_compatible(""));
    }

    #[cfg(unix)]
    #[test]
    fn test_locate_on_path_finds_executables() {
        // `sh` exists on any Unix test host.
        assert!(locate_on_path("sh").is_some());
        assert!(locate_on_path("definitely-not-a-real-binary-xyz").is_none());
    }
}
