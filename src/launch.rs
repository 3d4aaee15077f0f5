//! Launch parameters supplied to every invocation of the artifact.
//!
//! The self-extracting artifact's control script invokes the launcher with
//! its own path, the two segment lengths that delimit the embedded runtime,
//! the expected image checksum, and the arguments to forward to the runtime.
//! Segment boundaries are **byte** offsets: the artifact is
//! `[script][runtime][image]` and the image segment is everything after the
//! first two segments.

use crate::constants::CHECKSUM_HEX_LEN;
use crate::error::{Error, Result};
use std::path::PathBuf;

/// Parameters shared by the daemon and client processes.
#[derive(Debug, Clone)]
pub struct LaunchParams {
    /// Path of the self-extracting artifact (the artifact's own file).
    pub artifact: PathBuf,
    /// Byte length of the leading control-script segment.
    pub script_len: u64,
    /// Byte length of the embedded runtime-binary segment.
    pub runtime_len: u64,
    /// Expected hex sha256 digest of the image segment.
    pub image_checksum: String,
    /// Arguments forwarded verbatim to the runtime invocation.
    pub runtime_args: Vec<String>,
}

impl LaunchParams {
    /// Creates launch parameters, validating the checksum format.
    pub fn new(
        artifact: PathBuf,
        script_len: u64,
        runtime_len: u64,
        image_checksum: String,
        runtime_args: Vec<String>,
    ) -> Result<Self> {
        if image_checksum.len() != CHECKSUM_HEX_LEN
            || !image_checksum.chars().all(|c| c.is_ascii_hexdigit())
        {
            return Err(Error::InvalidChecksum(image_checksum));
        }
        Ok(Self {
            artifact,
            script_len,
            runtime_len,
            image_checksum: image_checksum.to_ascii_lowercase(),
            runtime_args,
        })
    }

    /// Byte offset where the runtime segment starts.
    pub fn runtime_start(&self) -> u64 {
        self.script_len
    }

    /// Byte offset one past the runtime segment (= start of the image).
    pub fn image_start(&self) -> u64 {
        self.script_len + self.runtime_len
    }

    /// Checks the segment-sum invariant against the artifact's actual size.
    pub fn validate_against(&self, artifact_len: u64) -> Result<()> {
        if self.image_start() > artifact_len {
            return Err(Error::SegmentsExceedArtifact {
                script_len: self.script_len,
                runtime_len: self.runtime_len,
                artifact_len,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(script_len: u64, runtime_len: u64) -> LaunchParams {
        LaunchParams::new(
            PathBuf::from("/tmp/artifact"),
            script_len,
            runtime_len,
            "a".repeat(64),
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_offsets() {
        let p = params(50, 1000);
        assert_eq!(p.runtime_start(), 50);
        assert_eq!(p.image_start(), 1050);
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let short = LaunchParams::new(PathBuf::new(), 0, 0, "abc123".into(), vec![]);
        assert!(short.is_err());

        let nonhex = LaunchParams::new(PathBuf::new(), 0, 0, "z".repeat(64), vec![]);
        assert!(nonhex.is_err());
    }

    #[test]
    fn test_checksum_normalized_to_lowercase() {
        let p = LaunchParams::new(PathBuf::new(), 0, 0, "A".repeat(64), vec![]).unwrap();
        assert_eq!(p.image_checksum, "a".repeat(64));
    }

    #[test]
    fn test_segment_sum_invariant() {
        let p = params(50, 1000);
        assert!(p.validate_against(1050).is_ok());
        assert!(p.validate_against(2000).is_ok());
        assert!(p.validate_against(1049).is_err());
    }
}
