// src/store/session.rs

//! Write sessions: stream one candidate package into the store
//!
//! A session owns a private temporary file under `tmp/`. Bytes are appended
//! to it and folded into a running SHA-256 at the same time. Nothing is
//! visible in the store until [`WriteSession::finish`] has verified the
//! digest and moved the file into place:
//!
//! 1. the metadata sidecar is persisted next to the destination
//! 2. the package file is persisted to the destination (the visibility point)
//!
//! Both steps are no-clobber renames out of `tmp/`, so a crash at any point
//! leaves either nothing, or an orphaned sidecar that the scanner ignores
//! and the next open removes. Dropping a session without finishing it
//! deletes the temporary file.

use super::layout::StoreLayout;
use super::record::{PackageManifest, PackageRecord};
use super::scanner;
use crate::error::{Error, Result};
use crate::hash::{self, Hasher};
use crate::version::PackageVersion;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// An open write session for one package
///
/// Consumed by [`finish`](Self::finish), [`abort`](Self::abort), or
/// [`copy_from`](Self::copy_from); a closed session cannot be reused.
pub struct WriteSession {
    layout: StoreLayout,
    name: String,
    version: PackageVersion,
    expected_hash: String,
    arch: Vec<String>,
    file: tokio::fs::File,
    temp_path: TempPath,
    hasher: Hasher,
    failed: bool,
}

impl WriteSession {
    pub(crate) async fn create(
        layout: StoreLayout,
        name: String,
        version: PackageVersion,
        expected_hash: String,
        arch: Vec<String>,
    ) -> Result<Self> {
        let tmp_dir = layout.tmp_dir().to_path_buf();
        let temp = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix("upgrade-")
                .suffix(".part")
                .tempfile_in(&tmp_dir)
        })
        .await??;
        let (file, temp_path) = temp.into_parts();

        debug!(
            "Opened write session for {} (version {}) at {}",
            name,
            version,
            temp_path.display()
        );

        Ok(Self {
            layout,
            name,
            version,
            expected_hash,
            arch,
            file: tokio::fs::File::from_std(file),
            temp_path,
            hasher: Hasher::new(),
            failed: false,
        })
    }

    /// Destination file name inside the store
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The digest the content must match
    pub fn expected_hash(&self) -> &str {
        &self.expected_hash
    }

    /// Bytes accepted so far
    pub fn bytes_written(&self) -> u64 {
        self.hasher.bytes_hashed()
    }

    /// Append bytes to the package
    ///
    /// A failed write poisons the session; [`finish`](Self::finish) will
    /// then refuse to publish it.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if self.failed {
            return Err(Error::Io(io::Error::other(format!(
                "write session for {} already failed",
                self.name
            ))));
        }

        if let Err(e) = self.file.write_all(bytes).await {
            self.failed = true;
            return Err(e.into());
        }
        self.hasher.update(bytes);
        Ok(())
    }

    /// Drain a byte source into the package, then finish
    ///
    /// A read error from `source` aborts the session and is returned as
    /// [`Error::Source`].
    pub async fn copy_from<R>(mut self, source: &mut R) -> Result<PackageRecord>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        loop {
            let n = match source.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => return Err(self.abort(Error::Source(e)).await),
            };
            if let Err(e) = self.write(&buffer[..n]).await {
                return Err(self.abort(e).await);
            }
        }
        self.finish().await
    }

    /// Abandon the session after a source failure
    ///
    /// The temporary file is deleted no matter how much was written, and
    /// `err` is handed back for the caller to propagate.
    pub async fn abort(self, err: Error) -> Error {
        warn!(
            "Write session for {} aborted after {} bytes: {}",
            self.name,
            self.bytes_written(),
            err
        );
        drop(self.file);
        discard(self.temp_path).await;
        err
    }

    /// Verify the content and publish it into the store
    ///
    /// Finishing into a name that already holds the same content at the
    /// same version returns the existing record. A different hash or a
    /// different version under that name is [`Error::AlreadyExists`].
    pub async fn finish(self) -> Result<PackageRecord> {
        let Self {
            layout,
            name,
            version,
            expected_hash,
            arch,
            mut file,
            temp_path,
            hasher,
            failed,
        } = self;

        if failed {
            drop(file);
            discard(temp_path).await;
            return Err(Error::Io(io::Error::other(format!(
                "write session for {} failed before completion",
                name
            ))));
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        let size = hasher.bytes_hashed();
        let actual = hasher.finalize();
        if !actual.matches(&expected_hash) {
            warn!(
                "Rejecting {}: expected hash {}, got {}",
                name, expected_hash, actual
            );
            discard(temp_path).await;
            return Err(Error::HashMismatch {
                expected: expected_hash,
                actual: actual.into_string(),
            });
        }

        let manifest = PackageManifest::new(&actual, size, &version, arch);
        let record = publish(&layout, &name, manifest, temp_path).await?;
        info!(
            "Stored package {} ({} bytes, version {}, hash {})",
            record.filename, record.size, record.version, record.hash
        );
        Ok(record)
    }
}

/// Move a verified temporary file and its sidecar into the store
///
/// An existing package under `name` is only accepted when it has the same
/// hash and version; anything else is `AlreadyExists`.
async fn publish(
    layout: &StoreLayout,
    name: &str,
    manifest: PackageManifest,
    temp_path: TempPath,
) -> Result<PackageRecord> {
    let json = manifest.to_json()?;
    let placed_sidecar = write_sidecar(layout, name, json.clone()).await?;

    if !placed_sidecar {
        // Someone already claimed this name; only the same package may share it
        let existing = scanner::load_manifest(layout, name).await.ok().flatten();
        let same_package = existing
            .as_ref()
            .is_some_and(|m| m.hash == manifest.hash && m.version == manifest.version);
        if !same_package {
            discard(temp_path).await;
            return Err(Error::AlreadyExists(name.to_string()));
        }
    }

    let package_path = layout.package_path(name);
    let target = package_path.clone();
    let persisted =
        tokio::task::spawn_blocking(move || temp_path.persist_noclobber(&target)).await?;

    match persisted {
        Ok(()) => {
            // A concurrent removal may have taken the sidecar after it was checked
            restore_sidecar(layout, name, json).await?;
            sync_dir(layout.root()).await;
            Ok(PackageRecord::from_manifest(name, manifest))
        }
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
            discard(e.path).await;
            let occupant_matches = file_has_hash(&package_path, &manifest.hash).await;

            if !occupant_matches {
                if placed_sidecar {
                    remove_quietly(&layout.sidecar_path(name)).await;
                }
                return Err(Error::AlreadyExists(name.to_string()));
            }

            debug!("{} already stored with identical content", name);
            restore_sidecar(layout, name, json).await?;
            scanner::load_record(layout, name)
                .await?
                .filter(|record| record.version == manifest.version)
                .ok_or_else(|| Error::AlreadyExists(name.to_string()))
        }
        Err(e) => {
            discard(e.path).await;
            if placed_sidecar {
                remove_quietly(&layout.sidecar_path(name)).await;
            }
            Err(e.error.into())
        }
    }
}

async fn write_sidecar(layout: &StoreLayout, name: &str, json: Vec<u8>) -> Result<bool> {
    let tmp_dir = layout.tmp_dir().to_path_buf();
    let sidecar_path = layout.sidecar_path(name);
    tokio::task::spawn_blocking(move || place_sidecar(&tmp_dir, &sidecar_path, &json)).await?
}

/// Put a package's sidecar back if it is missing
async fn restore_sidecar(layout: &StoreLayout, name: &str, json: Vec<u8>) -> Result<()> {
    if tokio::fs::try_exists(layout.sidecar_path(name)).await? {
        return Ok(());
    }
    if write_sidecar(layout, name, json).await? {
        warn!("Restored missing sidecar for {}", name);
    }
    Ok(())
}

/// Write a sidecar through `tmp/` and persist it without overwriting
///
/// Returns `false` if a sidecar already exists at the destination.
fn place_sidecar(tmp_dir: &Path, sidecar_path: &Path, json: &[u8]) -> Result<bool> {
    let mut temp = tempfile::Builder::new()
        .prefix("meta-")
        .suffix(".part")
        .tempfile_in(tmp_dir)?;
    temp.write_all(json)?;
    temp.as_file().sync_all()?;

    match temp.persist_noclobber(sidecar_path) {
        Ok(_) => Ok(true),
        Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e.error.into()),
    }
}

/// Whether the file at `path` has the given content hash
async fn file_has_hash(path: &Path, expected: &str) -> bool {
    let path = path.to_path_buf();
    let result = tokio::task::spawn_blocking(move || {
        let mut file = fs::File::open(&path)?;
        hash::hash_reader(&mut file)
    })
    .await;

    matches!(result, Ok(Ok((actual, _))) if actual.matches(expected))
}

/// Delete a temporary file, logging instead of failing
async fn discard(temp_path: TempPath) {
    let shown: PathBuf = temp_path.to_path_buf();
    match tokio::task::spawn_blocking(move || temp_path.close()).await {
        Ok(Ok(())) => debug!("Discarded temporary file {}", shown.display()),
        Ok(Err(e)) => warn!("Failed to remove temporary file {}: {}", shown.display(), e),
        Err(e) => warn!("Failed to remove temporary file {}: {}", shown.display(), e),
    }
}

async fn remove_quietly(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Flush directory entries so a completed rename survives power loss
async fn sync_dir(dir: &Path) {
    #[cfg(unix)]
    {
        let dir = dir.to_path_buf();
        let result = tokio::task::spawn_blocking(move || fs::File::open(&dir)?.sync_all()).await;
        if let Ok(Err(e)) = result {
            debug!("Directory sync failed: {}", e);
        }
    }
    #[cfg(not(unix))]
    let _ = dir;
}
