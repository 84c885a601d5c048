// src/store/mod.rs

//! Durable local store for upgrade packages
//!
//! The store root holds completed packages (each with a metadata sidecar)
//! and a `tmp/` directory for writes in progress. Visibility of a package
//! flips with a single rename out of `tmp/` after its hash is verified, so
//! listing, reading, and cleanup can all run alongside open write sessions
//! without locks.
//!
//! # Example
//!
//! ```ignore
//! use upgrade_store::{PackageStore, StoreConfig};
//!
//! let store = PackageStore::open("/data/upgrades", StoreConfig::new("4.0.0")).await?;
//!
//! let mut session = store.begin_write("app.apk", "4.1.0", &expected_hash).await?;
//! session.write(&bytes).await?;
//! let record = session.finish().await?;
//!
//! let content = store.read_by_hash(&record.hash).await?.read_to_vec().await?;
//! store.clear_obsolete().await?;
//! ```

mod gc;
mod layout;
mod reader;
mod record;
mod scanner;
mod session;

pub use gc::{ClearReport, is_obsolete};
pub use layout::{SIDECAR_SUFFIX, StoreLayout, TMP_DIR_NAME};
pub use reader::PackageReader;
pub use record::PackageRecord;
pub use session::WriteSession;

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::hash;
use crate::inspector::{ApkInspector, PackageInspector};
use crate::version::PackageVersion;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Extension given to packages imported under a managed name
const IMPORT_EXTENSION: &str = "apk";

/// Handle to an upgrade package store
///
/// Cheap to clone; clones share the same root and inspector.
#[derive(Clone)]
pub struct PackageStore {
    layout: StoreLayout,
    config: StoreConfig,
    installed: PackageVersion,
    inspector: Arc<dyn PackageInspector>,
}

impl PackageStore {
    /// Open (or create) a store rooted at `root`
    ///
    /// Any file left in `tmp/` belongs to a write that never completed and
    /// is deleted. Sidecars whose package never arrived and packages whose
    /// sidecar is gone are deleted as well.
    pub async fn open<P: AsRef<Path>>(root: P, config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let installed = config.installed_version()?;
        let layout = StoreLayout::new(root);

        if !layout.tmp_dir().exists() {
            tokio::fs::create_dir_all(layout.tmp_dir()).await?;
            debug!("Created upgrade store at {}", layout.root().display());
        }

        let inspector: Arc<dyn PackageInspector> =
            Arc::new(ApkInspector::new(config.current_arch.clone()));
        let store = Self {
            layout,
            config,
            installed,
            inspector,
        };
        store.recover().await?;
        Ok(store)
    }

    /// Replace the inspector used by [`import_existing`](Self::import_existing)
    pub fn with_inspector(mut self, inspector: Arc<dyn PackageInspector>) -> Self {
        self.inspector = inspector;
        self
    }

    /// Store root directory
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Installed build this store was opened for
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Crash recovery: purge `tmp/`, then drop half-removed or half-published records
    async fn recover(&self) -> Result<()> {
        let tmp_dir = self.layout.tmp_dir().to_path_buf();
        let purged = tokio::task::spawn_blocking(move || purge_dir(&tmp_dir)).await??;
        if purged > 0 {
            info!("Removed {} interrupted write(s) from previous run", purged);
        }

        let mut entries = tokio::fs::read_dir(self.layout.root()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };

            if let Some(package) = layout::package_name_for_sidecar(&name) {
                if tokio::fs::try_exists(self.layout.package_path(package)).await? {
                    continue;
                }
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => debug!("Removed orphaned sidecar for {}", package),
                    Err(e) => warn!("Failed to remove orphaned sidecar for {}: {}", package, e),
                }
            } else if layout::is_package_name(&name) && entry.file_type().await?.is_file() {
                // A package without metadata is invisible but still holds its name
                if tokio::fs::try_exists(self.layout.sidecar_path(&name)).await? {
                    continue;
                }
                match tokio::fs::remove_file(entry.path()).await {
                    Ok(()) => info!("Removed package {} with no metadata", name),
                    Err(e) => warn!("Failed to remove package {} with no metadata: {}", name, e),
                }
            }
        }

        Ok(())
    }

    /// Every valid package currently in the store
    pub async fn list_available_upgrades(&self) -> Result<Vec<PackageRecord>> {
        scanner::scan(&self.layout).await
    }

    /// Packages that can actually be installed over the current build
    ///
    /// Strictly newer than the installed version, for the configured
    /// platform, and built for the configured architecture.
    pub async fn compatible_upgrades(&self) -> Result<Vec<PackageRecord>> {
        let records = self.list_available_upgrades().await?;
        Ok(records
            .into_iter()
            .filter(|record| !gc::is_obsolete(record, &self.installed))
            .filter(|record| record.platform == self.config.current_platform)
            .filter(|record| record.arch.iter().any(|a| *a == self.config.current_arch))
            .collect())
    }

    /// Start streaming a package into the store under `name`
    ///
    /// The package is recorded for the configured platform and
    /// architecture. `expected_hash` is not validated here: a value that
    /// can never match simply fails at [`WriteSession::finish`].
    pub async fn begin_write(
        &self,
        name: &str,
        version: &str,
        expected_hash: &str,
    ) -> Result<WriteSession> {
        layout::validate_package_name(name)?;
        let version = PackageVersion::parse(version)?;
        WriteSession::create(
            self.layout.clone(),
            name.to_string(),
            version,
            expected_hash.to_string(),
            vec![self.config.current_arch.clone()],
        )
        .await
    }

    /// Copy an already-complete local package into the store
    ///
    /// The file is hashed and inspected first, then streamed through a
    /// write session under the managed name `<hash>.apk`, so the copy gets
    /// the same verification and atomic publication as any other write.
    pub async fn import_existing<P: AsRef<Path>>(
        &self,
        source: P,
        version: &str,
    ) -> Result<PackageRecord> {
        let source = source.as_ref().to_path_buf();
        let version = PackageVersion::parse(version)?;

        let inspector = Arc::clone(&self.inspector);
        let path = source.clone();
        let (content_hash, size, info) = tokio::task::spawn_blocking(move || {
            let mut file = fs::File::open(&path)?;
            let (content_hash, size) = hash::hash_reader(&mut file)?;
            let info = inspector.inspect(&path)?;
            Ok::<_, Error>((content_hash, size, info))
        })
        .await??;

        debug!(
            "Importing {} ({} bytes, hash {}, arch {:?})",
            source.display(),
            size,
            content_hash,
            info.arch
        );

        let name = format!("{}.{}", content_hash, IMPORT_EXTENSION);
        let session = WriteSession::create(
            self.layout.clone(),
            name,
            version,
            content_hash.into_string(),
            info.arch,
        )
        .await?;

        let mut file = tokio::fs::File::open(&source).await?;
        session.copy_from(&mut file).await
    }

    /// Open a package for reading by its content hash
    pub async fn read_by_hash(&self, hash: &str) -> Result<PackageReader> {
        let record = scanner::find_by_hash(&self.layout, hash)
            .await?
            .ok_or_else(|| Error::NotFound(hash.to_string()))?;
        PackageReader::open(&self.layout, record).await
    }

    /// Delete one package by its content hash
    pub async fn remove_by_hash(&self, hash: &str) -> Result<PackageRecord> {
        let record = scanner::find_by_hash(&self.layout, hash)
            .await?
            .ok_or_else(|| Error::NotFound(hash.to_string()))?;
        gc::remove_record(&self.layout, &record).await?;
        info!("Removed package {} ({})", record.filename, record.hash);
        Ok(record)
    }

    /// Delete every package that is not newer than the installed build
    pub async fn clear_obsolete(&self) -> Result<ClearReport> {
        gc::clear_obsolete(&self.layout, &self.installed).await
    }
}

/// Remove everything inside `dir`, returning how many entries went
fn purge_dir(dir: &Path) -> io::Result<usize> {
    let mut purged = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        debug!("Purged {}", path.display());
        purged += 1;
    }
    Ok(purged)
}
