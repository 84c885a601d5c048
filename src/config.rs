// src/config.rs

//! Host configuration for the upgrade store
//!
//! Describes the build currently installed on the device. The store only
//! reads it, to decide which stored packages are still upgrades.
//!
//! Configuration can be built in code or loaded from a TOML file:
//!
//! ```toml
//! current_version = "4.0.0"
//! current_platform = "android"
//! current_arch = "arm64-v8a"
//! ```

use crate::error::{Error, Result};
use crate::version::PackageVersion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

/// The single platform packages are modeled for
pub const SUPPORTED_PLATFORM: &str = "android";

/// Architecture assumed when none is configured
pub const DEFAULT_ARCH: &str = "arm64-v8a";

/// Version assumed when none is configured; every real package is newer
pub const DEFAULT_VERSION: &str = "0.0.0";

/// The installed build, as seen by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Version of the build currently installed
    pub current_version: String,
    /// Platform of the installed build
    pub current_platform: String,
    /// Architecture tag of the installed build
    pub current_arch: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            current_version: DEFAULT_VERSION.to_string(),
            current_platform: SUPPORTED_PLATFORM.to_string(),
            current_arch: DEFAULT_ARCH.to_string(),
        }
    }
}

impl StoreConfig {
    /// Configuration for an installed build of the given version
    pub fn new(current_version: impl Into<String>) -> Self {
        Self {
            current_version: current_version.into(),
            ..Self::default()
        }
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.current_arch = arch.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.current_platform = platform.into();
        self
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        debug!("Loaded store configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Check that the configuration describes a supported build
    pub fn validate(&self) -> Result<()> {
        PackageVersion::parse(&self.current_version)?;

        if self.current_platform != SUPPORTED_PLATFORM {
            return Err(Error::validation(format!(
                "unsupported platform '{}' (only '{}' is supported)",
                self.current_platform, SUPPORTED_PLATFORM
            )));
        }

        if self.current_arch.is_empty() {
            return Err(Error::validation("architecture must not be empty"));
        }

        Ok(())
    }

    /// The installed version, parsed
    pub fn installed_version(&self) -> Result<PackageVersion> {
        PackageVersion::parse(&self.current_version)
    }
}
