//! Remote object storage.
//!
//! Jobs name their remote inputs and outputs with `s3://bucket/key` URIs.
//! The [`ObjectGateway`] trait moves objects between the store and a job's
//! workspace; [`S3Gateway`] is the production implementation.

mod s3;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use thiserror::Error;

use crate::{Error, Result};

pub use s3::S3Gateway;

/// Scheme prefix every object reference must start with.
pub const S3_SCHEME: &str = "s3://";

/// Failures talking to the remote store.
///
/// Local filesystem errors while staging objects are not storage errors; they
/// are reported as [`Error::IoPath`].
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("object {uri} does not exist")]
    NotFound { uri: String },

    #[error("download of {uri} failed: {message}")]
    Fetch { uri: String, message: String },

    #[error("upload to {uri} failed: {message}")]
    Publish { uri: String, message: String },
}

/// A `(bucket, key)` pair parsed from an `s3://bucket/key` URI.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    /// Parse an object URI.
    ///
    /// The part after the scheme must split at its first `/` into a non-empty
    /// bucket and a non-empty key. The key may itself contain `/`.
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(S3_SCHEME)
            .ok_or_else(|| Error::InvalidObjectRef(uri.to_string()))?;

        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => Ok(Self {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            _ => Err(Error::InvalidObjectRef(format!(
                "{uri} (expected {S3_SCHEME}bucket/key)"
            ))),
        }
    }

    /// Extension of the key's final path segment, if it has one.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.key.rsplit('/').next()?;
        Path::new(file_name).extension().and_then(|e| e.to_str())
    }
}

impl FromStr for ObjectRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", S3_SCHEME, self.bucket, self.key)
    }
}

/// Moves objects between remote storage and local files.
///
/// Both operations are single attempts. Implementations must not retry.
#[async_trait]
pub trait ObjectGateway: Send + Sync {
    /// Download `object` into `dest`, returning the number of bytes written.
    async fn fetch(&self, object: &ObjectRef, dest: &Path) -> Result<u64>;

    /// Upload the file at `src` to `object`.
    async fn publish(&self, src: &Path, object: &ObjectRef) -> Result<()>;
}
