// src/version/mod.rs

//! Version handling for upgrade packages
//!
//! Package versions are dotted strings such as `1.2.3`. Comparison follows
//! dotted numeric precedence: segments are compared left to right and the
//! first difference decides. Every pair of versions goes through the same
//! rule, so the ordering is total:
//!
//! - a missing segment sorts before any present one (`1.0 < 1.0.0`)
//! - a segment's leading digits compare numerically (`1.10 > 1.9`), and a
//!   segment with no leading digits sorts after every numeric one
//! - the remaining text compares lexically, except that a bare number
//!   sorts after the same number with a suffix (`3.0.0-beta < 3.0.0`)

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A validated package version string
#[derive(Debug, Clone)]
pub struct PackageVersion {
    raw: String,
}

impl PackageVersion {
    /// Parse a version string
    ///
    /// Rejects empty strings, whitespace, and empty segments (`1..2`).
    /// Segments themselves may be anything else; non-numeric segments are
    /// compared lexically.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::validation("empty version string"));
        }

        if s.chars().any(char::is_whitespace) {
            return Err(Error::validation(format!(
                "version '{}' contains whitespace",
                s
            )));
        }

        if s.split('.').any(str::is_empty) {
            return Err(Error::validation(format!(
                "version '{}' has an empty segment",
                s
            )));
        }

        Ok(Self { raw: s.to_string() })
    }

    /// The version as originally written
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this version is strictly newer than `other`
    pub fn is_newer_than(&self, other: &PackageVersion) -> bool {
        self.cmp(other) == Ordering::Greater
    }

    /// Compare two versions
    pub fn compare(&self, other: &PackageVersion) -> Ordering {
        let mut left = self.raw.split('.');
        let mut right = other.raw.split('.');
        loop {
            let ord = match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(a), Some(b)) => compare_segment(a, b),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
    }
}

/// Compare one dotted segment: leading digits first, then the rest
fn compare_segment(a: &str, b: &str) -> Ordering {
    let (a_digits, a_rest) = split_digits(a);
    let (b_digits, b_rest) = split_digits(b);
    compare_digits(a_digits, b_digits).then_with(|| compare_rest(a_rest, b_rest))
}

fn split_digits(segment: &str) -> (&str, &str) {
    let end = segment
        .bytes()
        .position(|c| !c.is_ascii_digit())
        .unwrap_or(segment.len());
    segment.split_at(end)
}

/// Digit runs compare by value without parsing, so arbitrarily long build
/// numbers cannot overflow. No digits at all sorts last.
fn compare_digits(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
    }
}

/// Text after the digits; none at all sorts last
fn compare_rest(a: &str, b: &str) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.cmp(b),
    }
}

impl fmt::Display for PackageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for PackageVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
