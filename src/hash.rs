// src/hash.rs

//! Content hashing for package integrity and identity
//!
//! Every stored package is identified by the SHA-256 digest of its full
//! byte content. The same digest is used to verify an incoming stream and
//! to select a package for reading, so a package handed to the installer
//! is always the one the caller asked for.
//!
//! [`Hasher`] knows nothing about files: write
//! sessions feed it chunk by chunk, readers feed it as they stream, and
//! imports run it over a whole file through [`hash_reader`].

use sha2::{Digest, Sha256};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;
use thiserror::Error;

/// Name of the only supported hash algorithm, as recorded in package metadata
pub const HASH_TYPE: &str = "sha256";

/// Length of a SHA-256 digest in hex characters
pub const HEX_LEN: usize = 64;

/// Hash parsing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    /// Hash algorithm other than sha256
    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// Hash string has wrong length
    #[error("invalid hash length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    /// Hash string contains invalid hex characters
    #[error("invalid hex in hash: {0}")]
    InvalidHex(String),
}

/// A validated SHA-256 digest, stored as lowercase hex
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(String);

impl ContentHash {
    /// Parse a hex digest, accepting either case
    pub fn parse(value: &str) -> Result<Self, HashError> {
        if value.len() != HEX_LEN {
            return Err(HashError::InvalidLength {
                expected: HEX_LEN,
                got: value.len(),
            });
        }

        if !value.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex(value.to_string()));
        }

        Ok(Self(value.to_ascii_lowercase()))
    }

    /// Get the digest as a lowercase hex string
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compare against a caller-supplied digest, ignoring case
    ///
    /// The other side is not required to be well-formed; anything that is
    /// not the same hex digest simply does not match.
    pub fn matches(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }

    /// Consume the hash, returning its hex string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Validate a recorded hash algorithm name
pub fn check_hash_type(name: &str) -> Result<(), HashError> {
    if name.eq_ignore_ascii_case(HASH_TYPE) {
        Ok(())
    } else {
        Err(HashError::UnsupportedAlgorithm(name.to_string()))
    }
}

/// Incremental SHA-256 hasher
#[derive(Clone, Default)]
pub struct Hasher {
    state: Sha256,
    len: u64,
}

impl Hasher {
    /// Start an empty digest
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold more data into the running digest
    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes hashed so far
    #[inline]
    pub fn bytes_hashed(&self) -> u64 {
        self.len
    }

    /// Finalize and return the digest
    pub fn finalize(self) -> ContentHash {
        ContentHash(hex::encode(self.state.finalize()))
    }
}

/// Compute the digest of a byte slice
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Compute the digest and length of everything a reader yields
pub fn hash_reader<R: Read>(reader: &mut R) -> io::Result<(ContentHash, u64)> {
    let mut hasher = Hasher::new();
    let mut buffer = [0u8; 8192];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    let len = hasher.bytes_hashed();
    Ok((hasher.finalize(), len))
}
