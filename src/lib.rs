// src/lib.rs

//! Upgrade Store
//!
//! Crash-safe local storage for self-update packages on devices that may
//! be offline. Packages arrive as byte streams from some transport, are
//! verified against an expected SHA-256 digest, and only become visible
//! once completely and correctly written.
//!
//! # Architecture
//!
//! - Directory as ledger: the store root is rescanned on every listing;
//!   there is no index to drift out of sync
//! - Atomic visibility: writes land in `tmp/` and are renamed into place
//!   only after their hash verifies
//! - Crash recovery: `tmp/` is purged whenever a store is opened
//! - Obsolescence: packages not newer than the installed build are pruned

pub mod config;
mod error;
pub mod hash;
pub mod inspector;
pub mod store;
pub mod version;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use hash::{ContentHash, Hasher};
pub use inspector::{ApkInspector, FixedArchInspector, PackageInfo, PackageInspector};
pub use store::{ClearReport, PackageReader, PackageRecord, PackageStore, WriteSession};
pub use version::PackageVersion;
