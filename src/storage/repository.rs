//! Repository backend over the GitHub contents API.

use crate::config::{StorageBackendKind, UploadPolicy};
use crate::github::{ContentEntry, ContentsApi, EntryType};
use crate::storage::{
    DOCUMENT_PREFIX, DocumentStore, FileListing, StorageError, StoredDocument,
    current_timestamp_rfc3339, filename_from_key, storage_key,
};
use async_trait::async_trait;
use std::sync::Arc;
use time::OffsetDateTime;

const PLACEHOLDER_NAME: &str = "README.md";
const PLACEHOLDER_CONTENT: &str = "# pdfs Directory\nThis directory contains PDF files.";

/// Documents kept as tracked files under `pdfs/` in a repository.
pub struct RepositoryStorage {
    contents: Arc<dyn ContentsApi>,
    policy: UploadPolicy,
}

impl RepositoryStorage {
    /// Wrap a contents client.
    pub fn new(contents: Arc<dyn ContentsApi>, policy: UploadPolicy) -> Self {
        Self { contents, policy }
    }

    async fn document_entries(&self) -> Result<Vec<ContentEntry>, StorageError> {
        let entries = self.contents.list_directory(DOCUMENT_PREFIX).await?;
        Ok(entries
            .into_iter()
            .filter(|entry| {
                entry.entry_type == EntryType::File
                    && filename_from_key(self.policy, &entry.path).is_some()
            })
            .collect())
    }

    /// Stored versions of `filename`, oldest first.
    async fn versions(&self, filename: &str) -> Result<Vec<ContentEntry>, StorageError> {
        match self.policy {
            UploadPolicy::Overwrite => {
                let path = storage_key(self.policy, filename, OffsetDateTime::now_utc());
                Ok(self
                    .contents
                    .stat(&path)
                    .await?
                    .filter(|entry| entry.entry_type == EntryType::File)
                    .into_iter()
                    .collect())
            }
            UploadPolicy::Accumulate => {
                let mut matching: Vec<ContentEntry> = self
                    .document_entries()
                    .await?
                    .into_iter()
                    .filter(|entry| filename_from_key(self.policy, &entry.path) == Some(filename))
                    .collect();
                matching.sort_by(|a, b| a.path.cmp(&b.path));
                Ok(matching)
            }
        }
    }

    async fn current_version(&self, filename: &str) -> Result<ContentEntry, StorageError> {
        self.versions(filename)
            .await?
            .pop()
            .ok_or_else(|| StorageError::NotFound {
                filename: filename.to_string(),
            })
    }
}

fn access_url(entry: &ContentEntry, filename: &str) -> Result<String, StorageError> {
    entry
        .download_url
        .clone()
        .ok_or_else(|| StorageError::NotFound {
            filename: filename.to_string(),
        })
}

#[async_trait]
impl DocumentStore for RepositoryStorage {
    fn backend(&self) -> StorageBackendKind {
        StorageBackendKind::GitHub
    }

    fn upload_policy(&self) -> UploadPolicy {
        self.policy
    }

    async fn ensure_root(&self) -> Result<(), StorageError> {
        self.contents.ensure_repository().await?;
        if self.contents.stat(DOCUMENT_PREFIX).await?.is_some() {
            return Ok(());
        }

        let placeholder = format!("{DOCUMENT_PREFIX}/{PLACEHOLDER_NAME}");
        self.contents
            .write(
                &placeholder,
                PLACEHOLDER_CONTENT.as_bytes(),
                None,
                "Create pdfs directory",
            )
            .await?;
        tracing::info!(path = %placeholder, "Seeded document directory");
        Ok(())
    }

    async fn upload(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<StoredDocument, StorageError> {
        let key = storage_key(self.policy, filename, OffsetDateTime::now_utc());
        let existing = self.contents.stat(&key).await?;
        let (sha, message) = match &existing {
            Some(entry) => (Some(entry.sha.as_str()), format!("Update {filename}")),
            None => (None, format!("Upload {filename}")),
        };

        let entry = self
            .contents
            .write(&key, &content, sha, &message)
            .await
            .inspect_err(|error| {
                tracing::error!(key = %key, error = %error, "Error uploading file to repository");
            })?;
        tracing::debug!(key = %key, size = content.len(), updated = existing.is_some(), "Uploaded document");

        Ok(StoredDocument {
            filename: filename.to_string(),
            url: access_url(&entry, filename)?,
            key,
            size: content.len() as u64,
            upload_date: current_timestamp_rfc3339(),
        })
    }

    async fn get_file_url(&self, filename: &str) -> Result<String, StorageError> {
        let entry = self.current_version(filename).await?;
        access_url(&entry, filename)
    }

    async fn fetch(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        let entry = self.current_version(filename).await?;
        self.contents
            .read(&entry.path)
            .await
            .inspect_err(|error| {
                tracing::error!(filename, error = %error, "Error reading file from repository");
            })?
            .ok_or_else(|| StorageError::NotFound {
                filename: filename.to_string(),
            })
    }

    async fn list_files(&self) -> Result<Vec<FileListing>, StorageError> {
        let entries = self.document_entries().await.inspect_err(|error| {
            tracing::error!(error = %error, "Error listing files from repository");
        })?;

        let mut files = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(filename) = filename_from_key(self.policy, &entry.path) else {
                continue;
            };
            let last_modified = self.contents.last_modified(&entry.path).await?;
            files.push(FileListing {
                filename: filename.to_string(),
                size: entry.size,
                url: entry.download_url.clone().unwrap_or_default(),
                last_modified,
            });
        }
        Ok(files)
    }

    async fn delete_file(&self, filename: &str) -> Result<bool, StorageError> {
        let versions = self.versions(filename).await?;
        if versions.is_empty() {
            return Ok(false);
        }
        for entry in &versions {
            self.contents
                .delete(&entry.path, &entry.sha, &format!("Delete {filename}"))
                .await
                .inspect_err(|error| {
                    tracing::error!(path = %entry.path, error = %error, "Error deleting file from repository");
                })?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::github::InMemoryContents;

    fn storage(policy: UploadPolicy) -> (Arc<InMemoryContents>, RepositoryStorage) {
        let contents = Arc::new(InMemoryContents::new());
        let storage = RepositoryStorage::new(contents.clone(), policy);
        (contents, storage)
    }

    #[tokio::test]
    async fn ensure_root_seeds_placeholder_once() {
        let (contents, storage) = storage(UploadPolicy::Overwrite);
        storage.ensure_root().await.expect("first bootstrap");
        storage.ensure_root().await.expect("second bootstrap");

        assert!(contents.repository_exists().await);
        assert_eq!(contents.paths().await, vec!["pdfs/README.md".to_string()]);
        let readme = contents.read("pdfs/README.md").await.unwrap().unwrap();
        assert!(String::from_utf8(readme).unwrap().starts_with("# pdfs Directory"));
    }

    #[tokio::test]
    async fn upload_lists_pdf_with_size() {
        let (_, storage) = storage(UploadPolicy::Overwrite);
        storage.ensure_root().await.expect("bootstrap");
        let stored = storage
            .upload("report.pdf", b"0123456789".to_vec())
            .await
            .expect("upload");
        assert_eq!(stored.key, "pdfs/report.pdf");

        let files = storage.list_files().await.expect("list");
        assert_eq!(files.len(), 1, "placeholder must not be listed");
        assert_eq!(files[0].filename, "report.pdf");
        assert_eq!(files[0].size, 10);
        assert!(files[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn reupload_updates_in_place() {
        let (contents, storage) = storage(UploadPolicy::Overwrite);
        storage.upload("a.pdf", b"one".to_vec()).await.unwrap();
        storage
            .upload("a.pdf", b"two".to_vec())
            .await
            .expect("update with current sha");

        assert_eq!(storage.fetch("a.pdf").await.unwrap(), b"two".to_vec());
        assert_eq!(
            contents.paths().await,
            vec!["pdfs/a.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn accumulate_keeps_each_upload() {
        let (contents, storage) = storage(UploadPolicy::Accumulate);
        contents
            .write("pdfs/20240101_000000_a.pdf", b"old", None, "seed")
            .await
            .unwrap();
        storage.upload("a.pdf", b"new".to_vec()).await.unwrap();

        let files = storage.list_files().await.unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(storage.fetch("a.pdf").await.unwrap(), b"new".to_vec());
    }

    #[tokio::test]
    async fn delete_removes_file_and_reports_absence() {
        let (_, storage) = storage(UploadPolicy::Overwrite);
        storage.upload("a.pdf", b"abc".to_vec()).await.unwrap();

        assert!(storage.delete_file("a.pdf").await.expect("delete"));
        assert!(!storage.delete_file("a.pdf").await.expect("repeat delete"));

        let error = storage.get_file_url("a.pdf").await.expect_err("gone");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }
}
