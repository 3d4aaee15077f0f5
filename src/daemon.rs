//! # Session Daemon
//!
//! Singleton background process owning one shared scratch directory for the
//! lifetime of the artifact's session.
//!
//! ## Lifecycle
//!
//! ```text
//! STARTING ──► LISTENING ──► TERMINATED
//!    │             │              │
//!    │ unlink stale socket        │ unlink socket
//!    │ create scratch dir (0700)  │ remove scratch dir
//!    │ bind + listen              │ exit
//!    │ provision runtime
//!    │             │
//!    │             ├─ accept: send 256-byte scratch path, add to live set
//!    │             └─ peer close: remove from live set; empty set ends it
//! ```
//!
//! The daemon is single-threaded and cooperative: one `current_thread`
//! tokio runtime multiplexes the listener and every client connection.
//! Accept-and-send and disconnect-and-recount are serialized through the
//! same loop (accept is polled first), so a connecting client always
//! receives the scratch path before another client's disconnect can
//! trigger teardown. Membership in the live set is the sole reference
//! count; there is no idle timeout.
//!
//! ## Runtime Provisioning
//!
//! Before serving, the daemon ensures `<scratch>/runtime` exists: a
//! compatible host-installed runtime is symlinked, otherwise the embedded
//! segment is extracted. The choice is made once and is final for the
//! session.

use crate::constants::{PATH_MESSAGE_LEN, RUNTIME_FILE_NAME, SCRATCH_DIR_MODE, SESSION_PREFIX};
use crate::error::{Error, Result};
use crate::launch::LaunchParams;
use crate::{archive, host};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Derives the well-known per-user control socket path.
///
/// Deterministic per user (`$TMPDIR/exsif-<uid>`), so at most one session
/// exists per user at a time.
pub fn control_socket_path() -> PathBuf {
    let uid = unsafe { libc::getuid() };
    std::env::temp_dir().join(format!("{SESSION_PREFIX}{uid}"))
}

/// Makes the daemon survive its spawner's terminal/session closure.
///
/// The spawning client already places the daemon in its own process
/// group; ignoring SIGHUP covers controlling-terminal hangups.
pub fn ignore_sighup() {
    // SAFETY: SIG_IGN is a valid disposition and no signal handler state
    // is shared with safe code.
    unsafe {
        libc::signal(libc::SIGHUP, libc::SIG_IGN);
    }
}

/// Runs a session daemon to completion for the given launch parameters.
///
/// Blocks until the last client disconnects and the session is torn down.
pub fn run(socket_path: &Path, params: &LaunchParams) -> Result<()> {
    run_with(socket_path, |scratch| provision_runtime(scratch, params))
}

/// Runs a session daemon with an injected runtime provisioner.
///
/// `provision` must materialize `<scratch>/runtime`; it runs once, before
/// any client handshake is served.
pub fn run_with(
    socket_path: &Path,
    provision: impl FnOnce(&Path) -> Result<()>,
) -> Result<()> {
    let session = Session::bind(socket_path, provision)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = rt.block_on(session.serve());

    session.teardown();
    result
}

/// A bound session: control socket plus the scratch directory it owns.
///
/// The socket and scratch directory are created together and destroyed
/// together; nothing about the session is ambient beyond the address
/// derivation in [`control_socket_path`].
struct Session {
    socket_path: PathBuf,
    scratch_dir: PathBuf,
    listener: std::os::unix::net::UnixListener,
    path_message: [u8; PATH_MESSAGE_LEN],
}

impl Session {
    /// STARTING state: unlink any stale socket, create the scratch
    /// directory, bind + listen, then provision the runtime.
    ///
    /// The socket path appears on the filesystem only once `bind`
    /// succeeds, so a client's successful connect implies a live session.
    fn bind(socket_path: &Path, provision: impl FnOnce(&Path) -> Result<()>) -> Result<Self> {
        // A lingering socket from a crashed daemon is expected; absence is
        // not an error.
        let _ = fs::remove_file(socket_path);

        let scratch_dir = create_scratch_dir()?;
        let path_message = match encode_path_message(&scratch_dir) {
            Ok(frame) => frame,
            Err(e) => {
                let _ = fs::remove_dir_all(&scratch_dir);
                return Err(e);
            }
        };

        let listener = match std::os::unix::net::UnixListener::bind(socket_path) {
            Ok(listener) => listener,
            Err(e) => {
                let _ = fs::remove_dir_all(&scratch_dir);
                return Err(Error::BindFailed {
                    path: socket_path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        };

        let session = Self {
            socket_path: socket_path.to_path_buf(),
            scratch_dir,
            listener,
            path_message,
        };

        // Provision after bind: connects arriving meanwhile queue in the
        // listen backlog and are served once the loop starts.
        if let Err(e) = provision(&session.scratch_dir) {
            session.teardown();
            return Err(e);
        }

        info!(
            socket = %session.socket_path.display(),
            scratch = %session.scratch_dir.display(),
            "session daemon listening"
        );
        Ok(session)
    }

    /// LISTENING state: the serialized readiness loop.
    async fn serve(&self) -> Result<()> {
        self.listener.set_nonblocking(true)?;
        let listener = tokio::net::UnixListener::from_std(self.listener.try_clone()?)?;

        let mut clients: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                // Accept before recounting disconnects, so a connecting
                // client is handed the scratch path before a concurrent
                // disconnect can empty the live set.
                biased;

                conn = listener.accept() => {
                    match conn {
                        Ok((stream, _)) => {
                            let admitted = self.admit(stream, &mut clients).await;
                            // A client that vanished during its handshake
                            // still counted as a connect: if it was the only
                            // one, the live set went one-to-zero.
                            if !admitted && clients.is_empty() {
                                info!("sole client lost during handshake, ending session");
                                return Ok(());
                            }
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }

                Some(_) = clients.join_next() => {
                    info!(clients = clients.len(), "client disconnected");
                    if clients.is_empty() {
                        info!("last client disconnected, ending session");
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Sends the scratch path and adds the connection to the live set.
    /// Returns whether the client was admitted.
    async fn admit(&self, mut stream: UnixStream, clients: &mut JoinSet<()>) -> bool {
        if let Err(e) = stream.write_all(&self.path_message).await {
            warn!(error = %e, "handshake send failed, dropping client");
            return false;
        }
        clients.spawn(wait_for_close(stream));
        info!(clients = clients.len(), "client connected");
        true
    }

    /// TERMINATED state: unlink the socket, remove the scratch directory.
    fn teardown(&self) {
        if let Err(e) = fs::remove_file(&self.socket_path) {
            debug!(error = %e, "control socket already gone");
        }
        if let Err(e) = fs::remove_dir_all(&self.scratch_dir) {
            warn!(error = %e, scratch = %self.scratch_dir.display(), "failed to remove scratch dir");
        }
        info!("session torn down");
    }
}

/// Resolves when the peer closes its end.
///
/// The protocol is one-way; stray bytes from the client are drained and
/// ignored.
async fn wait_for_close(mut stream: UnixStream) {
    let mut buf = [0u8; 32];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

/// Creates the session's private scratch directory under `$TMPDIR`.
fn create_scratch_dir() -> Result<PathBuf> {
    use std::os::unix::fs::DirBuilderExt;

    let dir = std::env::temp_dir().join(format!("{SESSION_PREFIX}{}", uuid::Uuid::now_v7()));
    fs::DirBuilder::new()
        .mode(SCRATCH_DIR_MODE)
        .create(&dir)
        .map_err(|e| Error::ScratchDirFailed(e.to_string()))?;
    Ok(dir)
}

/// Encodes the scratch path as the fixed-size NUL-padded handshake frame.
fn encode_path_message(path: &Path) -> Result<[u8; PATH_MESSAGE_LEN]> {
    let bytes = path.to_str().ok_or_else(|| {
        Error::ScratchPathTooLong(path.to_string_lossy().into_owned(), PATH_MESSAGE_LEN)
    })?;

    if bytes.len() > PATH_MESSAGE_LEN {
        return Err(Error::ScratchPathTooLong(
            bytes.to_string(),
            PATH_MESSAGE_LEN,
        ));
    }

    let mut frame = [0u8; PATH_MESSAGE_LEN];
    frame[..bytes.len()].copy_from_slice(bytes.as_bytes());
    Ok(frame)
}

/// Materializes `<scratch>/runtime`, preferring a compatible host
/// installation over extracting the embedded segment.
fn provision_runtime(scratch: &Path, params: &LaunchParams) -> Result<()> {
    let runtime_path = scratch.join(RUNTIME_FILE_NAME);

    if let Some(host_runtime) = host::find_host_runtime() {
        match std::os::unix::fs::symlink(&host_runtime, &runtime_path) {
            Ok(()) => return Ok(()),
            Err(e) => {
                // Fall through to embedded extraction.
                warn!(error = %e, "failed to symlink host runtime");
            }
        }
    }

    debug!("extracting embedded runtime");
    let artifact_len = fs::metadata(&params.artifact)
        .map_err(|e| Error::ArtifactUnreadable {
            path: params.artifact.clone(),
            reason: e.to_string(),
        })?
        .len();
    params.validate_against(artifact_len)?;

    archive::extract_runtime(
        &params.artifact,
        params.script_len,
        params.runtime_len,
        &runtime_path,
    )
    .map_err(|e| Error::ProvisionFailed(e.to_string()))
}
