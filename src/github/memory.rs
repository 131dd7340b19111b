//! In-process [`ContentsApi`] used by tests and offline runs.
//!
//! Mirrors the GitHub rules that matter to callers: writes to an existing path must carry the
//! current `sha`, deletes must carry the current `sha`, and every write yields a fresh one.

use crate::github::{
    ContentsApi,
    types::{ContentEntry, EntryType, GitHubError},
};
use async_trait::async_trait;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

struct StoredFile {
    content: Vec<u8>,
    sha: String,
    modified: String,
}

/// Repository contents held in memory.
#[derive(Default)]
pub struct InMemoryContents {
    files: RwLock<BTreeMap<String, StoredFile>>,
    repository_created: RwLock<bool>,
    revision: AtomicU64,
}

impl InMemoryContents {
    /// Create an empty repository that does not exist yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `ensure_repository` has run.
    pub async fn repository_exists(&self) -> bool {
        *self.repository_created.read().await
    }

    /// Paths currently stored, in lexical order.
    pub async fn paths(&self) -> Vec<String> {
        self.files.read().await.keys().cloned().collect()
    }

    fn next_sha(&self, path: &str, content: &[u8]) -> String {
        let revision = self.revision.fetch_add(1, Ordering::Relaxed);
        let mut hasher = Sha256::new();
        hasher.update(path.as_bytes());
        hasher.update(revision.to_le_bytes());
        hasher.update(content);
        hex::encode(&hasher.finalize()[..20])
    }

    fn entry_for(path: &str, file: &StoredFile) -> ContentEntry {
        ContentEntry {
            entry_type: EntryType::File,
            name: path.rsplit('/').next().unwrap_or(path).to_string(),
            path: path.to_string(),
            sha: file.sha.clone(),
            size: file.content.len() as u64,
            download_url: Some(format!("memory://{path}")),
        }
    }
}

fn normalize(path: &str) -> String {
    path.trim_matches('/').to_string()
}

fn conflict(path: &str, body: &str) -> GitHubError {
    GitHubError::Conflict {
        path: path.to_string(),
        status: StatusCode::CONFLICT,
        body: body.to_string(),
    }
}

#[async_trait]
impl ContentsApi for InMemoryContents {
    async fn ensure_repository(&self) -> Result<(), GitHubError> {
        let mut created = self.repository_created.write().await;
        *created = true;
        Ok(())
    }

    async fn stat(&self, path: &str) -> Result<Option<ContentEntry>, GitHubError> {
        let path = normalize(path);
        let files = self.files.read().await;
        if let Some(file) = files.get(&path) {
            return Ok(Some(Self::entry_for(&path, file)));
        }

        let prefix = format!("{path}/");
        if files.keys().any(|key| key.starts_with(&prefix)) {
            return Ok(Some(ContentEntry {
                entry_type: EntryType::Dir,
                name: path.rsplit('/').next().unwrap_or(&path).to_string(),
                path: path.clone(),
                sha: String::new(),
                size: 0,
                download_url: None,
            }));
        }
        Ok(None)
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, GitHubError> {
        let path = normalize(path);
        Ok(self
            .files
            .read()
            .await
            .get(&path)
            .map(|file| file.content.clone()))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<ContentEntry>, GitHubError> {
        let path = normalize(path);
        let prefix = if path.is_empty() {
            String::new()
        } else {
            format!("{path}/")
        };
        let files = self.files.read().await;
        let mut entries = Vec::new();
        let mut directories = Vec::new();
        for (key, file) in files.iter() {
            let Some(rest) = key.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('/') {
                None => entries.push(Self::entry_for(key, file)),
                Some((dir, _)) if !directories.iter().any(|seen| seen == dir) => {
                    directories.push(dir.to_string());
                }
                Some(_) => {}
            }
        }
        entries.extend(directories.into_iter().map(|dir| ContentEntry {
            entry_type: EntryType::Dir,
            path: format!("{prefix}{dir}"),
            name: dir,
            sha: String::new(),
            size: 0,
            download_url: None,
        }));
        Ok(entries)
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        _message: &str,
    ) -> Result<ContentEntry, GitHubError> {
        let path = normalize(path);
        let mut files = self.files.write().await;
        match (files.get(&path), sha) {
            (Some(existing), Some(sha)) if existing.sha != sha => {
                return Err(conflict(&path, "sha does not match"));
            }
            (Some(_), None) => {
                return Err(conflict(&path, "sha wasn't supplied"));
            }
            _ => {}
        }

        let stored = StoredFile {
            content: content.to_vec(),
            sha: self.next_sha(&path, content),
            modified: crate::storage::current_timestamp_rfc3339(),
        };
        let entry = Self::entry_for(&path, &stored);
        files.insert(path, stored);
        Ok(entry)
    }

    async fn delete(&self, path: &str, sha: &str, _message: &str) -> Result<(), GitHubError> {
        let path = normalize(path);
        let mut files = self.files.write().await;
        match files.get(&path) {
            None => Err(GitHubError::NotFound { path }),
            Some(existing) if existing.sha != sha => Err(conflict(&path, "sha does not match")),
            Some(_) => {
                files.remove(&path);
                Ok(())
            }
        }
    }

    async fn last_modified(&self, path: &str) -> Result<Option<String>, GitHubError> {
        let path = normalize(path);
        Ok(self
            .files
            .read()
            .await
            .get(&path)
            .map(|file| file.modified.clone()))
    }
}
