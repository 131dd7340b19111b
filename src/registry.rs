//! Filename-keyed upload metadata kept as a JSON file in the repository.
//!
//! [`MetadataRegistry::record`] and [`MetadataRegistry::remove`] read the whole file together
//! with its `sha`, change it in memory and write it back guarded by that same `sha`. A writer
//! that lost a race gets a conflict from the contents API instead of clobbering the other
//! update. [`MetadataRegistry::save`] writes over whatever is current (last writer wins).

use crate::error::ErrorKind;
use crate::github::{ContentsApi, GitHubError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Summary stored per filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Natural key.
    pub filename: String,
    /// RFC 3339 timestamp of the latest upload.
    pub upload_date: String,
    /// Byte length of the latest upload.
    pub size: u64,
    /// Hex SHA-256 of the uploaded bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Full registry content, ordered by filename.
pub type RegistryMap = BTreeMap<String, DocumentSummary>;

/// Errors raised while reading or writing the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The file exists but does not parse as a registry.
    #[error("Registry file {path} is corrupt: {source}")]
    Corrupt {
        /// Repository path of the registry file.
        path: String,
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// The repository could not be read or written.
    #[error("Registry backend failed: {0}")]
    Backend(#[from] GitHubError),
    /// The in-memory mapping could not be serialized.
    #[error("Failed to serialize registry: {0}")]
    Serialization(#[source] serde_json::Error),
}

impl RegistryError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Corrupt { .. } | Self::Serialization(_) => ErrorKind::Internal,
            Self::Backend(inner) => inner.kind(),
        }
    }
}

/// Handle on the registry file.
#[derive(Clone)]
pub struct MetadataRegistry {
    contents: Arc<dyn ContentsApi>,
    path: String,
}

impl MetadataRegistry {
    /// Registry stored at `path` inside the repository behind `contents`.
    pub fn new(contents: Arc<dyn ContentsApi>, path: impl Into<String>) -> Self {
        Self {
            contents,
            path: path.into(),
        }
    }

    /// Read the full mapping. A missing file is an empty registry.
    pub async fn load(&self) -> Result<RegistryMap, RegistryError> {
        let bytes = self.contents.read(&self.path).await.inspect_err(|error| {
            tracing::error!(path = %self.path, error = %error, "Error loading registry");
        })?;
        self.parse(bytes)
    }

    /// Write the full mapping back over the current revision, creating the file when absent.
    pub async fn save(&self, registry: &RegistryMap) -> Result<(), RegistryError> {
        let current = self.contents.stat(&self.path).await?;
        let sha = current.as_ref().map(|entry| entry.sha.as_str());
        self.write(registry, sha).await
    }

    /// Insert or replace the entry for `summary.filename`.
    pub async fn record(&self, summary: DocumentSummary) -> Result<(), RegistryError> {
        let (mut registry, sha) = self.load_revision().await?;
        registry.insert(summary.filename.clone(), summary);
        self.write(&registry, sha.as_deref()).await
    }

    /// Drop the entry for `filename`; returns whether one existed.
    pub async fn remove(&self, filename: &str) -> Result<bool, RegistryError> {
        let (mut registry, sha) = self.load_revision().await?;
        if registry.remove(filename).is_none() {
            return Ok(false);
        }
        self.write(&registry, sha.as_deref()).await?;
        Ok(true)
    }

    /// Mapping plus the `sha` it was read at. The `sha` is taken first, so a write landing in
    /// between makes the later guarded write fail instead of being overwritten.
    async fn load_revision(&self) -> Result<(RegistryMap, Option<String>), RegistryError> {
        let sha = self
            .contents
            .stat(&self.path)
            .await
            .inspect_err(|error| {
                tracing::error!(path = %self.path, error = %error, "Error loading registry");
            })?
            .map(|entry| entry.sha);
        let bytes = self.contents.read(&self.path).await.inspect_err(|error| {
            tracing::error!(path = %self.path, error = %error, "Error loading registry");
        })?;
        Ok((self.parse(bytes)?, sha))
    }

    fn parse(&self, bytes: Option<Vec<u8>>) -> Result<RegistryMap, RegistryError> {
        let Some(bytes) = bytes else {
            tracing::debug!(path = %self.path, "Registry file absent; starting empty");
            return Ok(RegistryMap::new());
        };

        serde_json::from_slice(&bytes).map_err(|source| {
            tracing::error!(path = %self.path, error = %source, "Registry file is not valid JSON");
            RegistryError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })
    }

    async fn write(&self, registry: &RegistryMap, sha: Option<&str>) -> Result<(), RegistryError> {
        let body = serde_json::to_vec_pretty(registry).map_err(RegistryError::Serialization)?;
        self.contents
            .write(&self.path, &body, sha, "Update PDF database")
            .await
            .inspect_err(|error| {
                tracing::error!(path = %self.path, error = %error, "Error saving registry");
            })?;
        tracing::debug!(path = %self.path, entries = registry.len(), "Saved registry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::InMemoryContents;

    fn summary(filename: &str, size: u64) -> DocumentSummary {
        DocumentSummary {
            filename: filename.to_string(),
            upload_date: "2025-01-02T03:04:05Z".to_string(),
            size,
            sha256: None,
        }
    }

    #[tokio::test]
    async fn absent_file_loads_as_empty() {
        let registry = MetadataRegistry::new(Arc::new(InMemoryContents::new()), "pdf_database.json");
        assert!(registry.load().await.expect("load").is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let contents = Arc::new(InMemoryContents::new());
        contents
            .write("pdf_database.json", b"{not json", None, "seed")
            .await
            .unwrap();
        let registry = MetadataRegistry::new(contents, "pdf_database.json");

        let error = registry.load().await.expect_err("corrupt");
        assert!(matches!(error, RegistryError::Corrupt { .. }));
        assert_eq!(error.kind(), ErrorKind::Internal);
    }

    #[tokio::test]
    async fn save_of_load_preserves_bytes() {
        let contents = Arc::new(InMemoryContents::new());
        let registry = MetadataRegistry::new(contents.clone(), "pdf_database.json");
        registry.record(summary("b.pdf", 20)).await.unwrap();
        registry.record(summary("a.pdf", 10)).await.unwrap();
        let before = contents.read("pdf_database.json").await.unwrap().unwrap();

        let loaded = registry.load().await.unwrap();
        registry.save(&loaded).await.expect("resave");

        let after = contents.read("pdf_database.json").await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn record_replaces_and_remove_drops_entries() {
        let registry = MetadataRegistry::new(Arc::new(InMemoryContents::new()), "pdf_database.json");
        registry.record(summary("a.pdf", 10)).await.unwrap();
        registry.record(summary("a.pdf", 99)).await.unwrap();
        assert_eq!(registry.load().await.unwrap()["a.pdf"].size, 99);

        assert!(registry.remove("a.pdf").await.unwrap());
        assert!(!registry.remove("a.pdf").await.unwrap());
        assert!(registry.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_at_stale_revision_conflicts() {
        let contents = Arc::new(InMemoryContents::new());
        let first = MetadataRegistry::new(contents.clone(), "pdf_database.json");
        let second = MetadataRegistry::new(contents.clone(), "pdf_database.json");
        first.record(summary("a.pdf", 10)).await.unwrap();

        let (mut stale, sha) = first.load_revision().await.unwrap();
        second.record(summary("b.pdf", 20)).await.unwrap();
        stale.insert("c.pdf".into(), summary("c.pdf", 30));

        let error = first
            .write(&stale, sha.as_deref())
            .await
            .expect_err("lost the race");
        assert_eq!(error.kind(), ErrorKind::Conflict);

        let current = first.load().await.unwrap();
        assert_eq!(current.keys().collect::<Vec<_>>(), vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn legacy_entries_without_digest_parse() {
        let raw = r#"{"a.pdf": {"filename": "a.pdf", "upload_date": "x", "size": 1}}"#;
        let parsed: RegistryMap = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed["a.pdf"].sha256, None);
    }
}
