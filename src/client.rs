//! # Session Client
//!
//! The foreground process invoked by the user. It joins an existing
//! session, or spawns a daemon and retries, then ensures its image copy is
//! current and delegates to the runtime.
//!
//! ## Reference Counting
//!
//! The client's open connection is what the daemon counts. [`SessionHandle`]
//! keeps the stream alive for as long as the caller holds it; the session's
//! scratch directory is guaranteed to exist while the handle does.
//!
//! ## Join-or-Start
//!
//! A connect failure means "no session yet": the client spawns one detached
//! daemon process and then retries the connect with bounded exponential
//! backoff. The daemon creates the socket path only after its bind
//! succeeds, so a successful connect always reaches a live listener. A
//! second exhaustion of retries is fatal; no further spawns are attempted.

use crate::constants::{
    CONNECT_ATTEMPTS, CONNECT_INITIAL_DELAY, PATH_MESSAGE_LEN, RUNTIME_FILE_NAME,
};
use crate::error::{Error, Result};
use crate::launch::LaunchParams;
use crate::{archive, cache, invoke};
use std::io::Read;
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// An open membership in a session.
///
/// Holds the control connection open; dropping the handle is the client's
/// disconnect, and the daemon recounts accordingly.
pub struct SessionHandle {
    /// Kept alive for its side effect: the daemon tracks this connection.
    _stream: UnixStream,
    scratch_dir: PathBuf,
}

impl SessionHandle {
    /// The session's shared scratch directory.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Path of the session's runtime binary (or symlink).
    pub fn runtime_path(&self) -> PathBuf {
        self.scratch_dir.join(RUNTIME_FILE_NAME)
    }
}

/// Joins an existing session at `socket_path`.
///
/// Reads the one fixed-size handshake message and returns a handle holding
/// the connection open.
pub fn join_session(socket_path: &Path) -> Result<SessionHandle> {
    let mut stream = UnixStream::connect(socket_path)?;

    let mut frame = [0u8; PATH_MESSAGE_LEN];
    stream.read_exact(&mut frame)?;
    let scratch_dir = decode_path_message(&frame)?;

    debug!(scratch = %scratch_dir.display(), "joined session");
    Ok(SessionHandle {
        _stream: stream,
        scratch_dir,
    })
}

/// Joins the session at `socket_path`, spawning a daemon if none answers.
///
/// Exactly one spawn is attempted; the reconnect is retried with bounded
/// exponential backoff while the daemon starts up.
pub fn join_or_start_session(socket_path: &Path, params: &LaunchParams) -> Result<SessionHandle> {
    match join_session(socket_path) {
        Ok(handle) => return Ok(handle),
        Err(e) => debug!(error = %e, "no session daemon reachable, spawning one"),
    }

    spawn_daemon(params)?;

    let mut delay = CONNECT_INITIAL_DELAY;
    for attempt in 1..=CONNECT_ATTEMPTS {
        match join_session(socket_path) {
            Ok(handle) => return Ok(handle),
            Err(e) => debug!(attempt, error = %e, "session not ready yet"),
        }
        std::thread::sleep(delay);
        delay *= 2;
    }

    Err(Error::SessionUnavailable {
        path: socket_path.to_path_buf(),
    })
}

/// Full client flow: join or start a session, ensure the image is cached,
/// delegate to the runtime, and return its exit code.
///
/// The session handle stays alive across the whole runtime invocation, so
/// the daemon cannot tear the scratch directory down underneath it.
pub fn run(socket_path: &Path, params: &LaunchParams) -> Result<i32> {
    let session = join_or_start_session(socket_path, params)?;

    let image_path = session.scratch_dir().join(&params.image_checksum);
    cache::ensure_image(&image_path, &params.image_checksum, |dest| {
        archive::extract_image(&params.artifact, params.script_len, params.runtime_len, dest)
    })?;

    info!(
        runtime = %session.runtime_path().display(),
        image = %image_path.display(),
        "delegating to runtime"
    );
    invoke::invoke_runtime(&session.runtime_path(), &image_path, &params.runtime_args)
}

/// Spawns a detached daemon process for the same launch parameters.
///
/// The child re-executes this binary in daemon mode, in its own process
/// group with no inherited stdio, so terminal closure cannot reach it.
fn spawn_daemon(params: &LaunchParams) -> Result<()> {
    use std::os::unix::process::CommandExt;

    let self_exe = std::env::current_exe().map_err(|e| Error::SpawnFailed(e.to_string()))?;

    let child = Command::new(self_exe)
        .arg("__daemon")
        .arg(&params.artifact)
        .arg(params.script_len.to_string())
        .arg(params.runtime_len.to_string())
        .arg(&params.image_checksum)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|e| Error::SpawnFailed(e.to_string()))?;

    info!(pid = child.id(), "spawned session daemon");
    Ok(())
}

/// Decodes the fixed-size NUL-padded handshake frame to a path.
fn decode_path_message(frame: &[u8; PATH_MESSAGE_LEN]) -> Result<PathBuf> {
    let end = frame.iter().position(|&b| b == 0).unwrap_or(frame.len());
    let path = std::str::from_utf8(&frame[..end])
        .map_err(|e| Error::MalformedHandshake(e.to_string()))?;
    if path.is_empty() {
        return Err(Error::MalformedHandshake("empty scratch path".into()));
    }
    Ok(PathBuf::from(path))
}
