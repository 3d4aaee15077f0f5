//! # Launcher Constants
//!
//! Defines the fixed sizes, well-known names, and retry policy for the
//! extraction-and-sharing core. These constants are the **single source of
//! truth** for the wire format and session layout.
//!
//! ## Cross-References
//!
//! - [`crate::daemon`]: Uses the handshake size and scratch/socket naming
//! - [`crate::client`]: Uses the handshake size and reconnect policy
//! - [`crate::host`]: Uses the host runtime name and version pattern

use std::time::Duration;

// =============================================================================
// Wire Format
// =============================================================================

/// Size of the one daemon-to-client handshake message, in bytes.
///
/// The daemon sends exactly one message per connection: the scratch
/// directory path, UTF-8 encoded and NUL-padded to this fixed size. The
/// bound matches the conventional shared-memory path-length ceiling used
/// by collaborating systems.
pub const PATH_MESSAGE_LEN: usize = 256;

// =============================================================================
// Session Layout
// =============================================================================

/// Prefix for the per-user control socket and the scratch directory.
///
/// The control socket lives at `$TMPDIR/exsif-<uid>`, which scopes sessions
/// to the invoking user: at most one session exists per user at a time.
pub const SESSION_PREFIX: &str = "exsif-";

/// File name of the runtime binary (or symlink) inside the scratch
/// directory. Fixed for the session's lifetime.
pub const RUNTIME_FILE_NAME: &str = "runtime";

/// Mode bits for the extracted runtime binary (owner rwx, group/other x).
pub const RUNTIME_FILE_MODE: u32 = 0o711;

/// Mode bits for the scratch directory.
///
/// **Security**: 0o700 keeps the unpacked runtime and cached image private
/// to the invoking user; the socket path already scopes the session per user.
pub const SCRATCH_DIR_MODE: u32 = 0o700;

// =============================================================================
// Reconnect Policy
// =============================================================================

/// Maximum connect attempts after spawning a daemon.
///
/// The spawned daemon creates the socket path only after `bind` succeeds,
/// so a successful connect implies a live listener. Bounded retries replace
/// a blind fixed sleep: the daemon may still be starting when the first
/// retry fires.
pub const CONNECT_ATTEMPTS: u32 = 6;

/// Initial delay before the first reconnect attempt. Doubles per attempt,
/// capping total wait at roughly one second.
pub const CONNECT_INITIAL_DELAY: Duration = Duration::from_millis(10);

// =============================================================================
// Host Runtime Discovery
// =============================================================================

/// Name of the host-installed runtime binary searched on `PATH`.
pub const HOST_RUNTIME_NAME: &str = "apptainer";

/// Version-string prefixes accepted for a host-installed runtime.
///
/// The probe runs `<runtime> --version` and accepts the installation iff
/// the trimmed output starts with one of these. Incompatible or missing
/// installations silently fall back to extracting the embedded runtime.
pub const COMPATIBLE_VERSION_PREFIXES: &[&str] = &["apptainer version 1."];

// =============================================================================
// Checksums
// =============================================================================

/// Length of a hex-encoded sha256 digest.
pub const CHECKSUM_HEX_LEN: usize = 64;

/// Buffer size for streaming whole-file digests.
pub const DIGEST_BUF_LEN: usize = 64 * 1024;
