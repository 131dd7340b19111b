//! Shared types used by the GitHub contents client and its in-memory counterpart.

use crate::error::ErrorKind;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

/// Errors returned while interacting with the GitHub contents API.
#[derive(Debug, Error)]
pub enum GitHubError {
    /// Base URL failed to parse or normalize.
    #[error("Invalid GitHub API URL: {0}")]
    InvalidUrl(String),
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// A path that must exist was missing.
    #[error("GitHub path not found: {path}")]
    NotFound {
        /// Repository-relative path that was requested.
        path: String,
    },
    /// The content-hash precondition was rejected (stale or missing `sha`).
    #[error("Content hash precondition failed for {path} ({status}): {body}")]
    Conflict {
        /// Repository-relative path being written or deleted.
        path: String,
        /// Status GitHub answered with (409 or 422).
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// GitHub responded with an unexpected status code.
    #[error("Unexpected GitHub response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned from GitHub.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Response body could not be interpreted.
    #[error("Malformed GitHub response: {0}")]
    InvalidResponse(String),
}

impl GitHubError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::InvalidUrl(_) => ErrorKind::Configuration,
            Self::Http(_) | Self::UnexpectedStatus { .. } | Self::InvalidResponse(_) => {
                ErrorKind::Transport
            }
        }
    }
}

/// Kind of entry reported by the contents API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    /// Regular file.
    File,
    /// Directory.
    Dir,
    /// Symbolic link.
    Symlink,
    /// Git submodule.
    Submodule,
}

/// Metadata describing a file or directory in the repository.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    /// Entry type.
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    /// Final path component.
    pub name: String,
    /// Repository-relative path.
    pub path: String,
    /// Blob hash required to update or delete the entry.
    pub sha: String,
    /// Size in bytes (zero for directories).
    #[serde(default)]
    pub size: u64,
    /// Direct, non-expiring download URL (absent for directories).
    #[serde(default)]
    pub download_url: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct WriteResponse {
    pub(crate) content: ContentEntry,
}

#[derive(Deserialize)]
pub(crate) struct CommitListItem {
    pub(crate) commit: CommitDetail,
}

#[derive(Deserialize)]
pub(crate) struct CommitDetail {
    pub(crate) committer: Option<CommitSignature>,
}

#[derive(Deserialize)]
pub(crate) struct CommitSignature {
    pub(crate) date: Option<String>,
}
