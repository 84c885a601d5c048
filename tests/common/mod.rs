// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use upgrade_store::{PackageStore, StoreConfig, hash};

/// SHA-256 of `testdata`
pub const TESTDATA_HASH: &str = "810ff2fb242a5dee4220f2cb0e6a519891fb67f2f828a6cab4ef8894633b1f50";

/// SHA-256 of the `fake.apk` fixture (`fake data\n`)
pub const FAKE_APK_HASH: &str = "78ad74cecb99d1023206bf2f7d9b11b28767fbb9369daa0afa5e4d062c7ce041";

/// Path of a checked-in fixture file
pub fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Open a fresh store for an installed build of `version`.
///
/// Returns (TempDir, store) - keep the TempDir alive to prevent cleanup.
pub async fn open_store(version: &str) -> (TempDir, PackageStore) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = PackageStore::open(temp_dir.path(), StoreConfig::new(version))
        .await
        .unwrap();
    (temp_dir, store)
}

/// Write `content` through a session declared with its true hash.
pub async fn write_package(
    store: &PackageStore,
    name: &str,
    version: &str,
    content: &[u8],
) -> upgrade_store::PackageRecord {
    let expected = hash::hash_bytes(content);
    let mut session = store
        .begin_write(name, version, expected.as_str())
        .await
        .unwrap();
    session.write(content).await.unwrap();
    session.finish().await.unwrap()
}

/// Number of entries in a directory
pub fn entry_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}
