// src/store/record.rs

//! Package records and their on-disk sidecar encoding

use crate::config::SUPPORTED_PLATFORM;
use crate::error::{Error, Result};
use crate::hash::{self, ContentHash};
use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};

/// A stored upgrade package, as reported to callers
///
/// Records are never updated in place. `id` always equals `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageRecord {
    pub hash: String,
    pub size: u64,
    pub version: String,
    pub hash_type: String,
    pub platform: String,
    pub arch: Vec<String>,
    pub id: String,
    /// File name of the package inside the store root
    pub filename: String,
}

impl PackageRecord {
    pub(crate) fn from_manifest(filename: &str, manifest: PackageManifest) -> Self {
        Self {
            id: manifest.hash.clone(),
            hash: manifest.hash,
            size: manifest.size,
            version: manifest.version,
            hash_type: manifest.hash_type,
            platform: manifest.platform,
            arch: manifest.arch,
            filename: filename.to_string(),
        }
    }

    /// Parsed version of this package
    pub fn parsed_version(&self) -> Result<PackageVersion> {
        PackageVersion::parse(&self.version)
    }
}

/// Metadata sidecar written next to every package file
///
/// The sidecar is what lets a directory scan rebuild the package set after
/// a restart without any other index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PackageManifest {
    pub hash: String,
    pub size: u64,
    pub version: String,
    pub hash_type: String,
    pub platform: String,
    pub arch: Vec<String>,
}

impl PackageManifest {
    pub fn new(hash: &ContentHash, size: u64, version: &PackageVersion, arch: Vec<String>) -> Self {
        Self {
            hash: hash.as_str().to_string(),
            size,
            version: version.as_str().to_string(),
            hash_type: hash::HASH_TYPE.to_string(),
            platform: SUPPORTED_PLATFORM.to_string(),
            arch,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decode and validate a sidecar
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let manifest: Self = serde_json::from_slice(bytes)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        hash::check_hash_type(&self.hash_type)?;
        let parsed = ContentHash::parse(&self.hash)?;
        if parsed.as_str() != self.hash {
            return Err(Error::validation(format!(
                "hash {} is not lowercase",
                self.hash
            )));
        }
        PackageVersion::parse(&self.version)?;
        if self.platform != SUPPORTED_PLATFORM {
            return Err(Error::validation(format!(
                "unsupported platform '{}'",
                self.platform
            )));
        }
        if self.arch.is_empty() {
            return Err(Error::validation("package has no architecture tags"));
        }
        Ok(())
    }
}
