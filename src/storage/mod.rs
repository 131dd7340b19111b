//! Raw document storage.
//!
//! Two backends implement [`DocumentStore`]: [`BucketStorage`] (S3 through `object_store`) and
//! [`RepositoryStorage`] (GitHub contents). Callers address documents by filename only; the
//! backend-specific key never leaves this module except in [`StoredDocument::key`].
//!
//! Re-upload behavior is an explicit [`UploadPolicy`]: `Overwrite` keeps a single object at
//! `pdfs/<filename>`, `Accumulate` writes `pdfs/<YYYYMMDD_HHMMSS>_<filename>` per upload and
//! resolves reads to the newest version.

pub mod bucket;
pub mod repository;

use crate::config::{StorageBackendKind, UploadPolicy};
use crate::error::ErrorKind;
use crate::github::GitHubError;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use time::{OffsetDateTime, format_description::well_known::Rfc3339, macros::format_description};

pub use bucket::BucketStorage;
pub use repository::RepositoryStorage;

/// Directory (or key prefix) holding raw documents.
pub const DOCUMENT_PREFIX: &str = "pdfs";
/// Only objects with this suffix are treated as documents.
pub const DOCUMENT_EXTENSION: &str = ".pdf";

/// Errors raised by storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No stored object matches the filename.
    #[error("Document not found: {filename}")]
    NotFound {
        /// Filename that was requested.
        filename: String,
    },
    /// Repository backend failure.
    #[error("Repository storage failed: {0}")]
    GitHub(#[from] GitHubError),
    /// Bucket backend failure.
    #[error("Bucket storage failed: {0}")]
    ObjectStore(#[from] object_store::Error),
    /// HTTP layer failed during bucket bootstrap.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Bucket endpoint answered bootstrap with an unexpected status.
    #[error("Unexpected bucket response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the bucket endpoint.
        status: reqwest::StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

impl StorageError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::GitHub(inner) => inner.kind(),
            Self::ObjectStore(object_store::Error::NotFound { .. }) => ErrorKind::NotFound,
            Self::ObjectStore(
                object_store::Error::Precondition { .. }
                | object_store::Error::AlreadyExists { .. },
            ) => ErrorKind::Conflict,
            Self::ObjectStore(_) | Self::Http(_) | Self::UnexpectedStatus { .. } => {
                ErrorKind::Transport
            }
        }
    }
}

/// Result of a successful upload.
#[derive(Debug, Clone, Serialize)]
pub struct StoredDocument {
    /// Filename as supplied by the caller.
    pub filename: String,
    /// Backend-internal locator.
    pub key: String,
    /// Access URL (pre-signed and expiring for buckets, direct for repositories).
    pub url: String,
    /// Byte length of the stored content.
    pub size: u64,
    /// RFC 3339 upload timestamp.
    pub upload_date: String,
}

/// One entry of a backend listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileListing {
    /// Filename with any version prefix removed.
    pub filename: String,
    /// Byte length of the stored object.
    pub size: u64,
    /// Access URL.
    pub url: String,
    /// RFC 3339 modification time when the backend reports one.
    pub last_modified: Option<String>,
}

/// Capability set shared by every raw-document backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Which backend this is.
    fn backend(&self) -> StorageBackendKind;

    /// Re-upload policy applied by this backend.
    fn upload_policy(&self) -> UploadPolicy;

    /// Make sure the storage root exists, creating it when absent. Idempotent.
    async fn ensure_root(&self) -> Result<(), StorageError>;

    /// Store `content` under a key derived from `filename` and the upload policy.
    async fn upload(&self, filename: &str, content: Vec<u8>)
    -> Result<StoredDocument, StorageError>;

    /// Resolve a fetchable URL; fails with [`StorageError::NotFound`] when absent.
    async fn get_file_url(&self, filename: &str) -> Result<String, StorageError>;

    /// Read the raw bytes of the current version.
    async fn fetch(&self, filename: &str) -> Result<Vec<u8>, StorageError>;

    /// Enumerate stored documents in backend order.
    async fn list_files(&self) -> Result<Vec<FileListing>, StorageError>;

    /// Remove every stored version of `filename`; `Ok(false)` when nothing was stored.
    async fn delete_file(&self, filename: &str) -> Result<bool, StorageError>;
}

/// Derive the storage key for a new upload.
pub fn storage_key(policy: UploadPolicy, filename: &str, now: OffsetDateTime) -> String {
    match policy {
        UploadPolicy::Overwrite => format!("{DOCUMENT_PREFIX}/{filename}"),
        UploadPolicy::Accumulate => {
            let stamp = now
                .format(format_description!(
                    "[year][month][day]_[hour][minute][second]"
                ))
                .unwrap_or_else(|_| "00000000_000000".to_string());
            format!("{DOCUMENT_PREFIX}/{stamp}_{filename}")
        }
    }
}

/// Recover the caller-facing filename from a storage key.
///
/// Returns `None` for keys outside the document prefix or without the document extension.
pub fn filename_from_key(policy: UploadPolicy, key: &str) -> Option<&str> {
    let name = key
        .strip_prefix(DOCUMENT_PREFIX)
        .and_then(|rest| rest.strip_prefix('/'))?;
    if name.contains('/') || !name.ends_with(DOCUMENT_EXTENSION) {
        return None;
    }
    match policy {
        UploadPolicy::Overwrite => Some(name),
        UploadPolicy::Accumulate => strip_version_stamp(name),
    }
}

fn strip_version_stamp(name: &str) -> Option<&str> {
    let bytes = name.as_bytes();
    if bytes.len() <= 16 {
        return None;
    }
    let digits = |range: std::ops::Range<usize>| bytes[range].iter().all(u8::is_ascii_digit);
    if digits(0..8) && bytes[8] == b'_' && digits(9..15) && bytes[15] == b'_' {
        Some(&name[16..])
    } else {
        None
    }
}

/// Current timestamp formatted for listings and registry entries.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
