//! Tests for artifact segment extraction.
//!
//! Validates the round-trip law (segment + tail extraction reproduce the
//! source segments byte-for-byte), range validation, and the executable
//! marking of the runtime segment.

use exsif::archive::{extract_image, extract_runtime, extract_segment, extract_tail};
use exsif::Error;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builds an artifact file from its three segments and returns its path.
fn build_artifact(dir: &TempDir, script: &[u8], runtime: &[u8], image: &[u8]) -> PathBuf {
    let path = dir.path().join("artifact");
    let mut bytes = Vec::new();
    bytes.extend_from_slice(script);
    bytes.extend_from_slice(runtime);
    bytes.extend_from_slice(image);
    fs::write(&path, bytes).unwrap();
    path
}

// =============================================================================
// Round-Trip Law
// =============================================================================

#[test]
fn test_round_trip_reproduces_segments() {
    let temp = TempDir::new().unwrap();

    let script = vec![b'#'; 50];
    let runtime: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
    let image = b"image payload with arbitrary bytes \x00\xff\x7f".to_vec();

    let artifact = build_artifact(&temp, &script, &runtime, &image);
    let script_len = script.len() as u64;
    let runtime_len = runtime.len() as u64;

    let runtime_out = temp.path().join("runtime");
    extract_segment(&artifact, script_len, script_len + runtime_len, &runtime_out).unwrap();
    assert_eq!(fs::read(&runtime_out).unwrap(), runtime);

    let image_out = temp.path().join("image");
    extract_tail(&artifact, script_len + runtime_len, &image_out).unwrap();
    assert_eq!(fs::read(&image_out).unwrap(), image);
}

#[test]
fn test_round_trip_with_empty_image() {
    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"script", b"runtime", b"");

    let image_out = temp.path().join("image");
    extract_tail(&artifact, 13, &image_out).unwrap();
    assert_eq!(fs::read(&image_out).unwrap(), b"");
}

#[test]
fn test_extract_image_convenience() {
    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"ss", b"rrr", b"IMAGE");

    let image_out = temp.path().join("image");
    extract_image(&artifact, 2, 3, &image_out).unwrap();
    assert_eq!(fs::read(&image_out).unwrap(), b"IMAGE");
}

// =============================================================================
// Range Validation
// =============================================================================

#[test]
fn test_end_before_start_is_invalid() {
    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"abc", b"def", b"ghi");

    let result = extract_segment(&artifact, 5, 2, &temp.path().join("out"));
    assert!(matches!(result, Err(Error::InvalidSegmentRange { .. })));
}

#[test]
fn test_range_past_eof_is_invalid() {
    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"abc", b"def", b"ghi");

    let result = extract_segment(&artifact, 0, 1000, &temp.path().join("out"));
    assert!(matches!(result, Err(Error::InvalidSegmentRange { .. })));

    let result = extract_tail(&artifact, 1000, &temp.path().join("out"));
    assert!(matches!(result, Err(Error::InvalidSegmentRange { .. })));
}

#[test]
fn test_unreadable_source_is_surfaced() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("missing");

    let result = extract_segment(&missing, 0, 1, &temp.path().join("out"));
    assert!(matches!(result, Err(Error::ArtifactUnreadable { .. })));
}

#[test]
fn test_failed_extraction_leaves_no_destination() {
    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"abc", b"def", b"ghi");
    let dest = temp.path().join("out");

    let _ = extract_segment(&artifact, 0, 1000, &dest);
    assert!(!dest.exists(), "invalid range must not create the destination");
}

// =============================================================================
// Runtime Segment
// =============================================================================

#[cfg(unix)]
#[test]
fn test_runtime_segment_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"#!/bin/sh\n", b"\x7fELFfake", b"img");

    let dest = temp.path().join("runtime");
    extract_runtime(&artifact, 10, 8, &dest).unwrap();

    assert_eq!(fs::read(&dest).unwrap(), b"\x7fELFfake");
    let mode = fs::metadata(&dest).unwrap().permissions().mode();
    assert_ne!(mode & 0o100, 0, "owner execute bit must be set");
    assert_ne!(mode & 0o010, 0, "group execute bit must be set");
    assert_ne!(mode & 0o001, 0, "other execute bit must be set");
}

#[test]
fn test_extraction_overwrites_stale_destination() {
    let temp = TempDir::new().unwrap();
    let artifact = build_artifact(&temp, b"s", b"r", b"fresh image");

    let dest = temp.path().join("image");
    fs::write(&dest, b"stale image from a previous artifact").unwrap();

    extract_tail(&artifact, 2, &dest).unwrap();
    assert_eq!(fs::read(&dest).unwrap(), b"fresh image");
}
