//! # exsif
//!
//! **Self-Extracting Container Launcher**
//!
//! One distributable artifact concatenates a control script, an embedded
//! container-runtime binary, and a container image. Executing it unpacks
//! what is needed, shares the unpacked runtime across concurrent
//! invocations through a coordinating session daemon, and hands off
//! execution to the runtime.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                    artifact (one file)                        │
//! │  [ control script ][ runtime binary ][ container image ]     │
//! └───────────────────────────────────────────────────────────────┘
//!          │ byte offsets supplied as launch parameters
//!          ▼
//! ┌─────────────┐  connect / spawn+retry   ┌──────────────────────┐
//! │   client    │ ───────────────────────► │   session daemon     │
//! │ (foreground)│ ◄─────────────────────── │  (one per user)      │
//! │             │   256-byte scratch path  │                      │
//! │ ensure image│                          │ owns scratch dir:    │
//! │ exec runtime│                          │   runtime (bin/link) │
//! └─────────────┘                          │   <checksum> (image) │
//!                                          └──────────────────────┘
//! ```
//!
//! The daemon is spawned lazily by the first client, tracks clients by
//! their open connections, and garbage-collects the scratch directory when
//! the last one disconnects. The cached image is keyed by its sha256 and
//! re-extracted only when stale.
//!
//! # Example
//!
//! ```rust,ignore
//! use exsif::{daemon, client, LaunchParams};
//!
//! let params = LaunchParams::new(artifact, script_len, runtime_len, checksum, args)?;
//! let socket = daemon::control_socket_path();
//! let exit_code = client::run(&socket, &params)?;
//! std::process::exit(exit_code);
//! ```

pub mod archive;
pub mod cache;
pub mod constants;
pub mod error;
pub mod host;
pub mod launch;

#[cfg(unix)]
pub mod client;
#[cfg(unix)]
pub mod daemon;
#[cfg(unix)]
pub mod invoke;

// Re-exports
pub use cache::{ensure_image, file_digest, CacheStatus};
#[cfg(unix)]
pub use client::{join_or_start_session, join_session, SessionHandle};
pub use constants::*;
#[cfg(unix)]
pub use daemon::control_socket_path;
pub use error::{Error, Result};
pub use launch::LaunchParams;
