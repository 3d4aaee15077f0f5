//! Tests for the checksum-gated image cache.
//!
//! Validates hit/miss decisions, idempotence, and that a verified hit
//! performs no filesystem write (observable via the modification time).

use exsif::{ensure_image, file_digest, CacheStatus};
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

fn digest_of(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

// =============================================================================
// Digest Computation
// =============================================================================

#[test]
fn test_file_digest_matches_in_memory_digest() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("blob");
    let data: Vec<u8> = (0..200_000u32).map(|i| (i % 256) as u8).collect();
    fs::write(&path, &data).unwrap();

    assert_eq!(file_digest(&path).unwrap(), digest_of(&data));
}

#[test]
fn test_file_digest_of_missing_file_fails() {
    let temp = TempDir::new().unwrap();
    assert!(file_digest(&temp.path().join("missing")).is_err());
}

// =============================================================================
// Hit / Miss Decisions
// =============================================================================

#[test]
fn test_matching_checksum_is_a_hit() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image");
    fs::write(&path, b"cached image").unwrap();

    let calls = Cell::new(0u32);
    let status = ensure_image(&path, &digest_of(b"cached image"), |_| {
        calls.set(calls.get() + 1);
        Ok(())
    })
    .unwrap();

    assert_eq!(status, CacheStatus::Hit);
    assert_eq!(calls.get(), 0, "extractor must not run on a hit");
}

#[test]
fn test_checksum_mismatch_triggers_re_extraction() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image");
    fs::write(&path, b"stale image").unwrap();

    let status = ensure_image(&path, &digest_of(b"current image"), |dest: &Path| {
        fs::write(dest, b"current image")?;
        Ok(())
    })
    .unwrap();

    assert_eq!(status, CacheStatus::Refreshed);
    assert_eq!(fs::read(&path).unwrap(), b"current image");
}

#[test]
fn test_absent_file_triggers_extraction() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image");

    let status = ensure_image(&path, &digest_of(b"image"), |dest: &Path| {
        fs::write(dest, b"image")?;
        Ok(())
    })
    .unwrap();

    assert_eq!(status, CacheStatus::Refreshed);
}

// =============================================================================
// Idempotence
// =============================================================================

#[test]
fn test_second_call_never_re_invokes_extractor() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image");
    let checksum = digest_of(b"payload");

    let calls = Cell::new(0u32);
    let extractor = |dest: &Path| {
        calls.set(calls.get() + 1);
        fs::write(dest, b"payload")?;
        Ok(())
    };

    assert_eq!(
        ensure_image(&path, &checksum, extractor).unwrap(),
        CacheStatus::Refreshed
    );
    assert_eq!(
        ensure_image(&path, &checksum, extractor).unwrap(),
        CacheStatus::Hit
    );
    assert_eq!(calls.get(), 1);
}

#[test]
fn test_verified_hit_does_not_touch_the_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image");
    fs::write(&path, b"image bytes").unwrap();

    let mtime_before = fs::metadata(&path).unwrap().modified().unwrap();
    // Coarse-mtime filesystems need the gap to make a rewrite observable.
    std::thread::sleep(Duration::from_millis(20));

    ensure_image(&path, &digest_of(b"image bytes"), |dest: &Path| {
        fs::write(dest, b"image bytes")?;
        Ok(())
    })
    .unwrap();

    let mtime_after = fs::metadata(&path).unwrap().modified().unwrap();
    assert_eq!(mtime_before, mtime_after, "a hit must not rewrite the file");
}

// =============================================================================
// Error Propagation
// =============================================================================

#[test]
fn test_extractor_errors_surface() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("image");

    let result = ensure_image(&path, &digest_of(b"whatever"), |_| {
        Err(exsif::Error::ProvisionFailed("boom".into()))
    });
    assert!(result.is_err());
}
