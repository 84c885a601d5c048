// src/inspector.rs

//! Package inspection for imported files
//!
//! Importing a package that was not streamed through a write session
//! requires figuring out which architectures it runs on. That knowledge is
//! format-specific, so it sits behind the [`PackageInspector`] trait and
//! the store only ever sees the resulting [`PackageInfo`].

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// ZIP local file header magic
const ZIP_MAGIC: [u8; 4] = [0x50, 0x4b, 0x03, 0x04];

/// What an inspector learned about a package file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    /// Architecture tags, sorted and deduplicated
    pub arch: Vec<String>,
}

impl PackageInfo {
    pub fn new<I, S>(arch: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let arch: BTreeSet<String> = arch.into_iter().map(Into::into).collect();
        Self {
            arch: arch.into_iter().collect(),
        }
    }
}

/// Derives package metadata from a file on disk
///
/// Implementations run on a blocking thread and may do ordinary
/// synchronous I/O.
pub trait PackageInspector: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<PackageInfo>;
}

/// Reports the same architecture tags for every package
#[derive(Debug, Clone)]
pub struct FixedArchInspector {
    arch: Vec<String>,
}

impl FixedArchInspector {
    pub fn new<I, S>(arch: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            arch: PackageInfo::new(arch).arch,
        }
    }
}

impl PackageInspector for FixedArchInspector {
    fn inspect(&self, _path: &Path) -> Result<PackageInfo> {
        Ok(PackageInfo {
            arch: self.arch.clone(),
        })
    }
}

/// Detects native ABIs from the `lib/<abi>/` entries of an APK
///
/// A package without native code runs on any architecture, and so does a
/// payload that is not an archive at all; both report the fallback tag.
#[derive(Debug, Clone)]
pub struct ApkInspector {
    fallback_arch: String,
}

impl ApkInspector {
    pub fn new(fallback_arch: impl Into<String>) -> Self {
        Self {
            fallback_arch: fallback_arch.into(),
        }
    }

    fn native_abis(&self, file: File, path: &Path) -> Result<BTreeSet<String>> {
        let mut archive = ZipArchive::new(file).map_err(|e| {
            Error::validation(format!("{} is not a readable APK: {}", path.display(), e))
        })?;

        let mut abis = BTreeSet::new();
        for i in 0..archive.len() {
            let entry = archive.by_index(i).map_err(|e| {
                Error::validation(format!("corrupt entry in {}: {}", path.display(), e))
            })?;
            if let Some(abi) = abi_from_entry(entry.name()) {
                abis.insert(abi.to_string());
            }
        }

        Ok(abis)
    }
}

impl PackageInspector for ApkInspector {
    fn inspect(&self, path: &Path) -> Result<PackageInfo> {
        let mut file = File::open(path)?;

        let mut magic = [0u8; 4];
        let read = file.read(&mut magic)?;
        if read == 0 {
            return Err(Error::validation(format!(
                "{} is empty",
                path.display()
            )));
        }

        if read < magic.len() || magic != ZIP_MAGIC {
            debug!(
                "{} is not an archive, assuming {}",
                path.display(),
                self.fallback_arch
            );
            return Ok(PackageInfo::new([self.fallback_arch.clone()]));
        }

        file.seek(SeekFrom::Start(0))?;
        let abis = self.native_abis(file, path)?;

        if abis.is_empty() {
            debug!(
                "{} has no native libraries, assuming {}",
                path.display(),
                self.fallback_arch
            );
            Ok(PackageInfo::new([self.fallback_arch.clone()]))
        } else {
            Ok(PackageInfo::new(abis))
        }
    }
}

/// Extract the ABI directory from an entry such as `lib/arm64-v8a/libfoo.so`
fn abi_from_entry(name: &str) -> Option<&str> {
    let rest = name.strip_prefix("lib/")?;
    let (abi, file) = rest.split_once('/')?;
    if abi.is_empty() || file.is_empty() {
        return None;
    }
    Some(abi)
}
