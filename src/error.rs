//! Error types for the extraction-and-sharing core.

use std::path::PathBuf;

/// Result type alias for launcher operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the launcher core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // =========================================================================
    // Archive Errors
    // =========================================================================
    /// Source artifact could not be read.
    #[error("failed to read artifact {path}: {reason}")]
    ArtifactUnreadable { path: PathBuf, reason: String },

    /// Extraction destination could not be written.
    #[error("failed to write {path}: {reason}")]
    DestinationUnwritable { path: PathBuf, reason: String },

    /// Requested byte range is not satisfiable by the artifact.
    #[error("invalid segment range [{start}, {end}) for artifact of {len} bytes")]
    InvalidSegmentRange { start: u64, end: u64, len: u64 },

    // =========================================================================
    // Launch Parameter Errors
    // =========================================================================
    /// Segment lengths exceed the artifact.
    #[error("segment lengths {script_len}+{runtime_len} exceed artifact length {artifact_len}")]
    SegmentsExceedArtifact {
        script_len: u64,
        runtime_len: u64,
        artifact_len: u64,
    },

    /// Image checksum is not a valid hex sha256 digest.
    #[error("invalid image checksum '{0}': expected 64 hex characters")]
    InvalidChecksum(String),

    // =========================================================================
    // Cache Errors
    // =========================================================================
    /// Reading a cached image for verification failed.
    #[error("failed to read cached image {path}: {reason}")]
    CacheReadFailed { path: PathBuf, reason: String },

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// Daemon could not bind the control socket.
    #[error("failed to bind control socket {path}: {reason}")]
    BindFailed { path: PathBuf, reason: String },

    /// Scratch directory could not be created.
    #[error("failed to create scratch directory: {0}")]
    ScratchDirFailed(String),

    /// Scratch path does not fit the fixed-size handshake message.
    #[error("scratch path '{0}' exceeds the {1}-byte handshake message")]
    ScratchPathTooLong(String, usize),

    /// Daemon sent a handshake that is not a valid path.
    #[error("malformed handshake from session daemon: {0}")]
    MalformedHandshake(String),

    /// No session could be established after spawn and retry.
    #[error("session unavailable: no daemon reachable at {path} after spawning one")]
    SessionUnavailable { path: PathBuf },

    /// Spawning the daemon process failed.
    #[error("failed to spawn session daemon: {0}")]
    SpawnFailed(String),

    /// Provisioning the runtime binary into the scratch directory failed.
    #[error("failed to provision runtime: {0}")]
    ProvisionFailed(String),

    // =========================================================================
    // Invocation Errors
    // =========================================================================
    /// The unpacked runtime could not be executed.
    #[error("failed to invoke runtime {path}: {reason}")]
    InvokeFailed { path: PathBuf, reason: String },

    // =========================================================================
    // I/O Errors
    // =========================================================================
    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
