//! Error definitions and outcomes for the document pipeline.

use crate::completion::CompletionClientError;
use crate::config::ConfigError;
use crate::embedding::EmbeddingClientError;
use crate::error::ErrorKind;
use crate::github::GitHubError;
use crate::index::IndexError;
use crate::registry::RegistryError;
use crate::storage::StorageError;
use serde::Serialize;
use thiserror::Error;

/// Errors emitted by the document service.
#[derive(Debug, Error)]
pub enum ProcessingError {
    /// Supplied filename is empty or unsafe.
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    /// Supplied file is not a PDF.
    #[error("File must be a PDF")]
    NotPdf,
    /// No index has been persisted for the filename.
    #[error("PDF not indexed")]
    NotIndexed {
        /// Filename that was queried.
        filename: String,
    },
    /// Raw storage failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Metadata registry failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// Index build or query failed.
    #[error(transparent)]
    Index(#[from] IndexError),
    /// Repository client could not be constructed or bootstrapped.
    #[error(transparent)]
    GitHub(#[from] GitHubError),
    /// Configuration was missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Embedding client could not be constructed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingClientError),
    /// Completion client could not be constructed.
    #[error(transparent)]
    Completion(#[from] CompletionClientError),
}

impl ProcessingError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFilename(_) | Self::NotPdf => ErrorKind::InvalidInput,
            Self::NotIndexed { .. } => ErrorKind::NotFound,
            Self::Storage(inner) => inner.kind(),
            Self::Registry(inner) => inner.kind(),
            Self::Index(inner) => inner.kind(),
            Self::GitHub(inner) => inner.kind(),
            Self::Config(inner) => inner.kind(),
            Self::Embedding(inner) => inner.kind(),
            Self::Completion(inner) => inner.kind(),
        }
    }
}

/// Summary of a completed upload.
#[derive(Debug, Clone, Serialize)]
pub struct UploadOutcome {
    /// Sanitized filename the document is stored under.
    pub filename: String,
    /// Byte length of the upload.
    pub size: u64,
    /// RFC 3339 upload timestamp.
    pub upload_date: String,
    /// Access URL returned by the backend.
    pub url: String,
    /// Hex SHA-256 of the uploaded bytes.
    pub sha256: String,
    /// Number of chunks indexed.
    pub chunk_count: usize,
}
