// src/store/layout.rs

//! On-disk layout of the package store
//!
//! ```text
//! <root>/
//!   tmp/                    in-progress writes, purged on open
//!   foo.apk                 package bytes
//!   foo.apk.meta.json       package metadata sidecar
//! ```

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// Name of the temporary subdirectory
pub const TMP_DIR_NAME: &str = "tmp";

/// Suffix appended to a package file name to form its sidecar name
pub const SIDECAR_SUFFIX: &str = ".meta.json";

/// Paths inside a store root
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
    tmp_dir: PathBuf,
}

impl StoreLayout {
    /// Layout for a store rooted at `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        let root = root.as_ref().to_path_buf();
        let tmp_dir = root.join(TMP_DIR_NAME);
        Self { root, tmp_dir }
    }

    /// Store root directory
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding writes in progress
    #[inline]
    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    /// Path of a stored package
    pub fn package_path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Path of a stored package's metadata sidecar
    pub fn sidecar_path(&self, name: &str) -> PathBuf {
        self.root.join(sidecar_name(name))
    }
}

/// Sidecar file name for a package file name
pub fn sidecar_name(name: &str) -> String {
    format!("{}{}", name, SIDECAR_SUFFIX)
}

/// Package file name a sidecar belongs to, if `name` is a sidecar
pub fn package_name_for_sidecar(name: &str) -> Option<&str> {
    name.strip_suffix(SIDECAR_SUFFIX).filter(|n| !n.is_empty())
}

/// Whether a top-level entry name could be a package file
///
/// Hidden files, sidecars, and the temporary directory never are.
pub fn is_package_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name != TMP_DIR_NAME
        && !name.ends_with(SIDECAR_SUFFIX)
        && !name.contains(['/', '\\'])
}

/// Check a caller-supplied destination name
pub fn validate_package_name(name: &str) -> Result<()> {
    if is_package_name(name) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "'{}' is not a valid package file name",
            name
        )))
    }
}
