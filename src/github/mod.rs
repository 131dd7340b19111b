//! GitHub repository contents integration.
//!
//! The repository plays two roles: it stores raw PDFs for the version-controlled backend and it
//! hosts the metadata registry file. Both go through [`ContentsApi`] so the content-hash rules
//! live in one place.

pub mod client;
pub mod memory;
pub mod types;

use async_trait::async_trait;

pub use client::GitHubClient;
pub use memory::InMemoryContents;
pub use types::{ContentEntry, EntryType, GitHubError};

/// Operations on a single repository's tracked files.
///
/// Absent paths are reported as `Ok(None)` / empty listings; writes and deletes that violate
/// the content-hash precondition fail with [`GitHubError::Conflict`].
#[async_trait]
pub trait ContentsApi: Send + Sync {
    /// Create the repository when it does not exist yet. Safe to call repeatedly.
    async fn ensure_repository(&self) -> Result<(), GitHubError>;

    /// Metadata for a path, `None` when absent.
    async fn stat(&self, path: &str) -> Result<Option<ContentEntry>, GitHubError>;

    /// Raw bytes of a file, `None` when absent.
    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, GitHubError>;

    /// Entries directly below a directory; an absent directory lists as empty.
    async fn list_directory(&self, path: &str) -> Result<Vec<ContentEntry>, GitHubError>;

    /// Create (`sha = None`) or update (`sha = Some(current)`) a file.
    async fn write(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<ContentEntry, GitHubError>;

    /// Remove a file guarded by its current `sha`.
    async fn delete(&self, path: &str, sha: &str, message: &str) -> Result<(), GitHubError>;

    /// Timestamp of the latest commit touching `path`.
    async fn last_modified(&self, path: &str) -> Result<Option<String>, GitHubError>;
}
