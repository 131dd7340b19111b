//! HTTP client wrapper for the GitHub repository contents API.

use crate::config::GitHubSettings;
use crate::github::{
    ContentsApi,
    types::{CommitListItem, ContentEntry, EntryType, GitHubError, WriteResponse},
};
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use reqwest::{Client, Method, StatusCode, header};
use serde::Deserialize;
use serde_json::{Value, json};

const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// Lightweight HTTP client for a single GitHub repository.
pub struct GitHubClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) token: String,
    pub(crate) owner: String,
    pub(crate) repository: String,
    pub(crate) branch: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatResponse {
    Entry(ContentEntry),
    Listing(Vec<ContentEntry>),
}

impl GitHubClient {
    /// Construct a new client from explicit settings.
    pub fn new(settings: &GitHubSettings) -> Result<Self, GitHubError> {
        let client = Client::builder().user_agent("pdfqa/0.1").build()?;
        let base_url = normalize_base_url(&settings.api_url).map_err(GitHubError::InvalidUrl)?;
        tracing::debug!(
            url = %base_url,
            owner = %settings.owner,
            repository = %settings.repository,
            branch = %settings.branch,
            has_token = !settings.token.is_empty(),
            "Initialized GitHub HTTP client"
        );

        Ok(Self {
            client,
            base_url,
            token: settings.token.clone(),
            owner: settings.owner.clone(),
            repository: settings.repository.clone(),
            branch: settings.branch.clone(),
        })
    }

    fn repo_path(&self) -> String {
        format!("repos/{}/{}", self.owner, self.repository)
    }

    fn contents_path(&self, path: &str) -> String {
        let path = path.trim_matches('/');
        if path.is_empty() {
            format!("{}/contents", self.repo_path())
        } else {
            format!("{}/contents/{path}", self.repo_path())
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format_endpoint(&self.base_url, path);
        let mut req = self
            .client
            .request(method, url)
            .header(header::ACCEPT, JSON_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION);
        if !self.token.is_empty() {
            req = req.bearer_auth(&self.token);
        }
        req
    }

    async fn repository_exists(&self) -> Result<bool, GitHubError> {
        let response = self.request(Method::GET, &self.repo_path()).send().await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = GitHubError::UnexpectedStatus { status, body };
                tracing::error!(repository = %self.repository, error = %error, "Repository existence check failed");
                Err(error)
            }
        }
    }

    async fn ensure_success<F>(
        &self,
        path: &str,
        response: reqwest::Response,
        on_success: F,
    ) -> Result<reqwest::Response, GitHubError>
    where
        F: FnOnce(),
    {
        if response.status().is_success() {
            on_success();
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = classify_failure(path, status, body);
            tracing::error!(path, error = %error, "GitHub request failed");
            Err(error)
        }
    }
}

#[async_trait]
impl ContentsApi for GitHubClient {
    async fn ensure_repository(&self) -> Result<(), GitHubError> {
        if self.repository_exists().await? {
            return Ok(());
        }

        tracing::info!(repository = %self.repository, "Creating private repository");
        let body = json!({
            "name": self.repository,
            "private": true,
            "auto_init": true,
        });
        let response = self
            .request(Method::POST, "user/repos")
            .json(&body)
            .send()
            .await?;
        self.ensure_success("user/repos", response, || {
            tracing::debug!(repository = %self.repository, "Repository created");
        })
        .await
        .map(|_| ())
    }

    async fn stat(&self, path: &str) -> Result<Option<ContentEntry>, GitHubError> {
        let response = self
            .request(Method::GET, &self.contents_path(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.ensure_success(path, response, || {}).await?;
        match response.json::<StatResponse>().await? {
            StatResponse::Entry(entry) => Ok(Some(entry)),
            StatResponse::Listing(_) => Ok(Some(ContentEntry {
                entry_type: EntryType::Dir,
                name: path.rsplit('/').next().unwrap_or(path).to_string(),
                path: path.trim_matches('/').to_string(),
                sha: String::new(),
                size: 0,
                download_url: None,
            })),
        }
    }

    async fn read(&self, path: &str) -> Result<Option<Vec<u8>>, GitHubError> {
        let response = self
            .request(Method::GET, &self.contents_path(path))
            .header(header::ACCEPT, RAW_MEDIA_TYPE)
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.ensure_success(path, response, || {}).await?;
        let bytes = response.bytes().await?;
        tracing::debug!(path, size = bytes.len(), "Read repository file");
        Ok(Some(bytes.to_vec()))
    }

    async fn list_directory(&self, path: &str) -> Result<Vec<ContentEntry>, GitHubError> {
        let response = self
            .request(Method::GET, &self.contents_path(path))
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = self.ensure_success(path, response, || {}).await?;
        match response.json::<StatResponse>().await? {
            StatResponse::Listing(entries) => Ok(entries),
            StatResponse::Entry(entry) => Err(GitHubError::InvalidResponse(format!(
                "expected a directory listing for {path}, found {:?} {}",
                entry.entry_type, entry.path
            ))),
        }
    }

    async fn write(
        &self,
        path: &str,
        content: &[u8],
        sha: Option<&str>,
        message: &str,
    ) -> Result<ContentEntry, GitHubError> {
        let mut body = json!({
            "message": message,
            "content": STANDARD.encode(content),
            "branch": self.branch,
        });
        if let Some(sha) = sha
            && let Some(object) = body.as_object_mut()
        {
            object.insert("sha".into(), Value::String(sha.to_string()));
        }

        let response = self
            .request(Method::PUT, &self.contents_path(path))
            .json(&body)
            .send()
            .await?;
        let response = self
            .ensure_success(path, response, || {
                tracing::debug!(path, size = content.len(), updated = sha.is_some(), "Committed file");
            })
            .await?;
        let WriteResponse { content } = response.json().await?;
        Ok(content)
    }

    async fn delete(&self, path: &str, sha: &str, message: &str) -> Result<(), GitHubError> {
        let body = json!({
            "message": message,
            "sha": sha,
            "branch": self.branch,
        });
        let response = self
            .request(Method::DELETE, &self.contents_path(path))
            .json(&body)
            .send()
            .await?;
        self.ensure_success(path, response, || {
            tracing::debug!(path, "Deleted file");
        })
        .await
        .map(|_| ())
    }

    async fn last_modified(&self, path: &str) -> Result<Option<String>, GitHubError> {
        let response = self
            .request(Method::GET, &format!("{}/commits", self.repo_path()))
            .query(&[("path", path), ("sha", self.branch.as_str()), ("per_page", "1")])
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.ensure_success(path, response, || {}).await?;
        let commits: Vec<CommitListItem> = response.json().await?;
        Ok(commits
            .into_iter()
            .next()
            .and_then(|item| item.commit.committer)
            .and_then(|committer| committer.date))
    }
}

fn classify_failure(path: &str, status: StatusCode, body: String) -> GitHubError {
    match status {
        StatusCode::NOT_FOUND => GitHubError::NotFound {
            path: path.to_string(),
        },
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => GitHubError::Conflict {
            path: path.to_string(),
            status,
            body,
        },
        status => GitHubError::UnexpectedStatus { status, body },
    }
}

fn normalize_base_url(url: &str) -> Result<String, String> {
    let mut parsed = reqwest::Url::parse(url).map_err(|err| err.to_string())?;
    let path = parsed.path().trim_end_matches('/').to_string();
    parsed.set_path(&path);
    Ok(parsed.to_string())
}

fn format_endpoint(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
