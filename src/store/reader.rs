// src/store/reader.rs

//! Read access to stored packages
//!
//! [`PackageReader`] streams a package's bytes and re-hashes them on the
//! way through. If the file on disk no longer matches the hash it was
//! selected by, the final read fails instead of silently handing corrupt
//! bytes to the installer.

use super::layout::StoreLayout;
use super::record::PackageRecord;
use crate::error::{Error, Result};
use crate::hash::Hasher;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};

/// Sequential reader over one stored package
pub struct PackageReader {
    record: PackageRecord,
    file: tokio::fs::File,
    hasher: Option<Hasher>,
    mismatch: Option<String>,
}

impl PackageReader {
    pub(crate) async fn open(layout: &StoreLayout, record: PackageRecord) -> Result<Self> {
        let file = match tokio::fs::File::open(layout.package_path(&record.filename)).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::NotFound(record.hash));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            record,
            file,
            hasher: Some(Hasher::new()),
            mismatch: None,
        })
    }

    /// The record this reader was opened for
    pub fn record(&self) -> &PackageRecord {
        &self.record
    }

    /// Read the whole package into memory
    pub async fn read_to_vec(mut self) -> Result<Vec<u8>> {
        let mut content = Vec::with_capacity(self.record.size as usize);
        match self.read_to_end(&mut content).await {
            Ok(_) => Ok(content),
            Err(e) => match self.mismatch.take() {
                Some(actual) => Err(Error::HashMismatch {
                    expected: self.record.hash.clone(),
                    actual,
                }),
                None => Err(e.into()),
            },
        }
    }

    fn verify(&mut self) -> io::Result<()> {
        let Some(hasher) = self.hasher.take() else {
            return Ok(());
        };

        let len = hasher.bytes_hashed();
        let actual = hasher.finalize();
        if len == self.record.size && actual.matches(&self.record.hash) {
            return Ok(());
        }

        let message = format!(
            "stored package {} is corrupt: expected {} ({} bytes), read {} ({} bytes)",
            self.record.filename, self.record.hash, self.record.size, actual, len
        );
        self.mismatch = Some(actual.into_string());
        Err(io::Error::new(io::ErrorKind::InvalidData, message))
    }
}

impl AsyncRead for PackageReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let had_room = buf.remaining() > 0;

        ready!(Pin::new(&mut this.file).poll_read(cx, buf))?;

        let fresh = &buf.filled()[before..];
        if fresh.is_empty() {
            if had_room {
                // End of file
                this.verify()?;
            }
        } else if let Some(hasher) = this.hasher.as_mut() {
            hasher.update(fresh);
        }

        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;
    use crate::store::record::PackageManifest;
    use crate::version::PackageVersion;
    use std::fs;
    use tempfile::TempDir;

    fn record_for(layout: &StoreLayout, name: &str, content: &[u8]) -> PackageRecord {
        fs::write(layout.package_path(name), content).unwrap();
        let manifest = PackageManifest::new(
            &hash::hash_bytes(content),
            content.len() as u64,
            &PackageVersion::parse("1.0.0").unwrap(),
            vec!["arm64-v8a".to_string()],
        );
        PackageRecord::from_manifest(name, manifest)
    }

    #[tokio::test]
    async fn test_reads_verified_content() {
        let temp_dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp_dir.path());
        let record = record_for(&layout, "foo.apk", b"testdata");

        let reader = PackageReader::open(&layout, record).await.unwrap();
        assert_eq!(reader.record().filename, "foo.apk");
        assert_eq!(reader.read_to_vec().await.unwrap(), b"testdata");
    }

    #[tokio::test]
    async fn test_tampered_content_fails() {
        let temp_dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp_dir.path());
        let record = record_for(&layout, "foo.apk", b"testdata");
        fs::write(layout.package_path("foo.apk"), b"TESTDATA").unwrap();

        let reader = PackageReader::open(&layout, record).await.unwrap();
        let err = reader.read_to_vec().await.unwrap_err();
        assert!(err.is_hash_mismatch());
    }

    #[tokio::test]
    async fn test_tampered_stream_reports_invalid_data() {
        let temp_dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp_dir.path());
        let record = record_for(&layout, "foo.apk", b"testdata");
        fs::write(layout.package_path("foo.apk"), b"testdat").unwrap();

        let mut reader = PackageReader::open(&layout, record).await.unwrap();
        let mut sink = Vec::new();
        let err = reader.read_to_end(&mut sink).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let layout = StoreLayout::new(temp_dir.path());
        let record = record_for(&layout, "foo.apk", b"testdata");
        fs::remove_file(layout.package_path("foo.apk")).unwrap();

        let err = PackageReader::open(&layout, record).await.err().unwrap();
        assert!(err.is_not_found());
    }
}
