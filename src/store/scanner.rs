// src/store/scanner.rs

//! Directory scanning: rebuild the package set from the store root
//!
//! There is no index. Every listing re-reads the root directory, so the
//! directory itself is the only source of truth and survives restarts
//! unchanged. In-progress writes live under `tmp/` and are never looked at.

use super::layout::{self, StoreLayout};
use super::record::{PackageManifest, PackageRecord};
use crate::error::{Error, Result};
use std::io;
use tracing::debug;

/// Scan the store root and return every valid package, sorted by file name
///
/// Entries that cannot be parsed as a package are skipped; only a failure
/// to read the directory itself is an error.
pub async fn scan(layout: &StoreLayout) -> Result<Vec<PackageRecord>> {
    let mut records = Vec::new();
    let mut entries = tokio::fs::read_dir(layout.root()).await?;

    while let Some(entry) = entries.next_entry().await? {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !layout::is_package_name(&name) {
            continue;
        }

        match load_record(layout, &name).await {
            Ok(Some(record)) => records.push(record),
            Ok(None) => debug!("Skipping {}: no metadata sidecar", name),
            Err(e) => debug!("Skipping {}: {}", name, e),
        }
    }

    records.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(records)
}

/// Find the package whose content hash equals `hash`, ignoring case
pub async fn find_by_hash(layout: &StoreLayout, hash: &str) -> Result<Option<PackageRecord>> {
    let records = scan(layout).await?;
    Ok(records
        .into_iter()
        .find(|record| record.hash.eq_ignore_ascii_case(hash)))
}

/// Load one package record by file name
///
/// Returns `Ok(None)` when the package file or its sidecar is absent. A
/// package whose size on disk differs from the recorded size is invalid.
pub async fn load_record(layout: &StoreLayout, name: &str) -> Result<Option<PackageRecord>> {
    let metadata = match tokio::fs::metadata(layout.package_path(name)).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if !metadata.is_file() {
        return Ok(None);
    }

    let Some(manifest) = load_manifest(layout, name).await? else {
        return Ok(None);
    };

    if metadata.len() != manifest.size {
        return Err(Error::validation(format!(
            "size on disk {} does not match recorded size {}",
            metadata.len(),
            manifest.size
        )));
    }

    Ok(Some(PackageRecord::from_manifest(name, manifest)))
}

/// Read and decode a package's sidecar, if present
pub(crate) async fn load_manifest(
    layout: &StoreLayout,
    name: &str,
) -> Result<Option<PackageManifest>> {
    match tokio::fs::read(layout.sidecar_path(name)).await {
        Ok(bytes) => PackageManifest::from_json(&bytes).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
