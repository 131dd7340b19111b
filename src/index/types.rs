//! Error definitions and summaries for the per-document index.

use crate::completion::CompletionClientError;
use crate::embedding::EmbeddingClientError;
use crate::error::ErrorKind;
use anyhow::Error as TokenizerError;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while turning raw text into semantic chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Caller configured an impossible token budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Tokenizer resources were unavailable.
    #[error("failed to initialize tokenizer '{encoding}': {source}")]
    Tokenizer {
        /// Encoding we attempted to load.
        encoding: String,
        /// Underlying error raised by the tokenizer library.
        #[source]
        source: TokenizerError,
    },
}

/// Errors raised while building, persisting, loading or querying an index.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The persistence directory holds no complete index.
    #[error("No index persisted at {}", path.display())]
    NotIndexed {
        /// Directory that was checked.
        path: PathBuf,
    },
    /// Persisted files exist but are inconsistent or unparsable.
    #[error("Index at {} is corrupt: {reason}", path.display())]
    Corrupt {
        /// Directory holding the artifact.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },
    /// The uploaded bytes are not a readable PDF.
    #[error("Failed to extract text from PDF: {0}")]
    Extraction(String),
    /// Chunking step failed to segment the document.
    #[error("Failed to chunk document: {0}")]
    Chunking(#[from] ChunkingError),
    /// Embedding provider failed to produce vectors.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Completion provider failed to answer.
    #[error("Failed to generate answer: {0}")]
    Completion(#[from] CompletionClientError),
    /// Query vector does not match the stored vectors.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension of the persisted vectors.
        expected: usize,
        /// Dimension produced for the query.
        actual: usize,
    },
    /// Persistence directory has no final component to stage next to (`.`, `..`, `/`).
    #[error("Invalid persistence directory: {}", path.display())]
    InvalidPersistDir {
        /// Directory that was supplied.
        path: PathBuf,
    },
    /// Local filesystem failure.
    #[error("Index IO failed at {}: {source}", path.display())]
    Io {
        /// Path being read or written.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// Artifact serialization failed.
    #[error("Failed to serialize index: {0}")]
    Serialization(#[from] serde_json::Error),
    /// Chunking worker panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl IndexError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotIndexed { .. } => ErrorKind::NotFound,
            Self::Extraction(_) | Self::InvalidPersistDir { .. } => ErrorKind::InvalidInput,
            Self::Embedding(inner) => inner.kind(),
            Self::Completion(inner) => inner.kind(),
            Self::Corrupt { .. }
            | Self::Chunking(_)
            | Self::DimensionMismatch { .. }
            | Self::Io { .. }
            | Self::Serialization(_)
            | Self::Task(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone, Serialize)]
pub struct IndexSummary {
    /// Number of nodes (chunks) stored.
    pub node_count: usize,
    /// Token budget used for chunking.
    pub chunk_size: usize,
    /// Token overlap between neighbouring chunks.
    pub chunk_overlap: usize,
    /// Hex SHA-256 of the source bytes.
    pub source_sha256: String,
    /// Directory the artifact was written to.
    pub persist_dir: PathBuf,
}
