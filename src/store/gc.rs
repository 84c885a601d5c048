// src/store/gc.rs

//! Obsolete package cleanup
//!
//! A stored package is worth keeping only while it is strictly newer than
//! the installed build. Anything at or below the installed version offers
//! no upgrade and is deleted.

use super::layout::StoreLayout;
use super::record::PackageRecord;
use super::scanner;
use crate::error::Result;
use crate::version::PackageVersion;
use std::io;
use tracing::{debug, info, warn};

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    /// Records that were deleted
    pub removed: Vec<PackageRecord>,
    /// Records that are still upgrades and were kept
    pub kept: Vec<PackageRecord>,
}

/// Whether a record no longer represents an upgrade
///
/// Records with an unparseable version are obsolete; they can never be
/// offered as an upgrade.
pub fn is_obsolete(record: &PackageRecord, installed: &PackageVersion) -> bool {
    match record.parsed_version() {
        Ok(version) => !version.is_newer_than(installed),
        Err(_) => true,
    }
}

/// Delete every obsolete record under `layout`
///
/// Each deletion is attempted independently. If any fail, the first error
/// is returned after all deletions have been tried.
pub async fn clear_obsolete(layout: &StoreLayout, installed: &PackageVersion) -> Result<ClearReport> {
    let records = scanner::scan(layout).await?;
    let mut report = ClearReport::default();
    let mut first_error = None;

    for record in records {
        if !is_obsolete(&record, installed) {
            debug!(
                "Keeping {} (version {} > installed {})",
                record.filename, record.version, installed
            );
            report.kept.push(record);
            continue;
        }

        match remove_record(layout, &record).await {
            Ok(()) => report.removed.push(record),
            Err(e) => {
                warn!("Failed to remove obsolete package {}: {}", record.filename, e);
                first_error.get_or_insert(e);
            }
        }
    }

    info!(
        "Obsolete cleanup complete: {} removed, {} kept",
        report.removed.len(),
        report.kept.len()
    );

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// Delete one record: the package first, so it vanishes in one step, then
/// its sidecar
///
/// If a writer republished the same name in between, the sidecar stays
/// with the new package.
pub async fn remove_record(layout: &StoreLayout, record: &PackageRecord) -> Result<()> {
    let package_path = layout.package_path(&record.filename);
    remove_if_present(&package_path).await?;
    if tokio::fs::try_exists(&package_path).await? {
        debug!("{} was stored again during removal", record.filename);
        return Ok(());
    }
    remove_if_present(&layout.sidecar_path(&record.filename)).await?;
    debug!("Removed package {} ({})", record.filename, record.hash);
    Ok(())
}

async fn remove_if_present(path: &std::path::Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;
    use crate::store::record::PackageManifest;

    fn record(version: &str) -> PackageRecord {
        let manifest = PackageManifest::new(
            &hash::hash_bytes(version.as_bytes()),
            version.len() as u64,
            &PackageVersion::parse(version).unwrap(),
            vec!["arm64-v8a".to_string()],
        );
        PackageRecord::from_manifest("pkg.apk", manifest)
    }

    #[test]
    fn test_is_obsolete() {
        let installed = PackageVersion::parse("4.0.0").unwrap();
        assert!(is_obsolete(&record("3.0.0"), &installed));
        assert!(is_obsolete(&record("4.0.0"), &installed));
        assert!(!is_obsolete(&record("4.0.1"), &installed));
        assert!(!is_obsolete(&record("10.0.0"), &installed));
    }

    #[test]
    fn test_unparseable_version_is_obsolete() {
        let installed = PackageVersion::parse("1.0.0").unwrap();
        let mut broken = record("2.0.0");
        broken.version = "2..0".to_string();
        assert!(is_obsolete(&broken, &installed));
    }
}
