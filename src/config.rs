use crate::error::ErrorKind;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_COMPLETION_MODEL: &str = "gpt-4o-mini";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";
const DEFAULT_GITHUB_BRANCH: &str = "main";
const DEFAULT_AWS_REGION: &str = "us-east-1";
const DEFAULT_INDEX_STORAGE_DIR: &str = "storage";
const DEFAULT_REGISTRY_FILE: &str = "pdf_database.json";
const DEFAULT_SERVER_PORT: u16 = 8000;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

impl ConfigError {
    /// Classify the failure for the request layer.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Configuration
    }
}

/// Runtime configuration for the service, constructed once and handed to each component.
#[derive(Debug, Clone)]
pub struct Config {
    /// Embedding and generation provider settings.
    pub openai: OpenAiSettings,
    /// Version-controlled backend settings; also home of the metadata registry.
    pub github: GitHubSettings,
    /// Which backend stores raw PDF bytes.
    pub storage_backend: StorageBackendKind,
    /// Bucket settings, present when `storage_backend` is [`StorageBackendKind::S3`].
    pub s3: Option<S3Settings>,
    /// How re-uploading an existing filename is handled.
    pub upload_policy: UploadPolicy,
    /// Root directory holding one persistence directory per document.
    pub index_root: PathBuf,
    /// Path of the registry file inside the repository.
    pub registry_path: String,
    /// HTTP listen port.
    pub server_port: u16,
}

/// Credentials and model names for the OpenAI-compatible provider.
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    /// API key sent as a bearer token.
    pub api_key: String,
    /// Base URL including the version segment (e.g. `https://api.openai.com/v1`).
    pub base_url: String,
    /// Chat model used to phrase answers.
    pub completion_model: String,
    /// Embedding model used for chunks and queries.
    pub embedding_model: String,
}

/// Access settings for the GitHub repository backend.
#[derive(Debug, Clone)]
pub struct GitHubSettings {
    /// Personal access token.
    pub token: String,
    /// Account owning the repository.
    pub owner: String,
    /// Repository name.
    pub repository: String,
    /// Branch commits are written to.
    pub branch: String,
    /// API root, overridable for GitHub Enterprise or tests.
    pub api_url: String,
}

/// Access settings for the bucket backend.
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Access key identifier.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Bucket region.
    pub region: String,
    /// Bucket name.
    pub bucket: String,
    /// Optional S3-compatible endpoint (path-style requests, plain HTTP permitted).
    pub endpoint: Option<String>,
}

/// Supported raw-document backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// GitHub repository contents.
    GitHub,
    /// S3 bucket.
    S3,
}

/// Re-upload behavior shared by both backends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadPolicy {
    /// One object per filename, replaced in place.
    #[default]
    Overwrite,
    /// One object per upload under a time-prefixed key; reads resolve the newest.
    Accumulate,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(&lookup);
        let storage_backend = vars
            .optional("STORAGE_BACKEND")
            .map(|value| {
                value
                    .parse()
                    .map_err(|()| ConfigError::InvalidValue("STORAGE_BACKEND".into()))
            })
            .transpose()?
            .unwrap_or(StorageBackendKind::GitHub);

        let s3 = match storage_backend {
            StorageBackendKind::S3 => Some(S3Settings {
                access_key_id: vars.required("AWS_ACCESS_KEY_ID")?,
                secret_access_key: vars.required("AWS_SECRET_ACCESS_KEY")?,
                region: vars
                    .optional("AWS_REGION")
                    .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string()),
                bucket: vars.required("AWS_BUCKET_NAME")?,
                endpoint: vars.optional("AWS_ENDPOINT"),
            }),
            StorageBackendKind::GitHub => None,
        };

        Ok(Self {
            openai: OpenAiSettings::from_vars(&vars)?,
            github: GitHubSettings {
                token: vars.required("GITHUB_TOKEN")?,
                owner: vars.required("GITHUB_USERNAME")?,
                repository: vars.required("GITHUB_REPO")?,
                branch: vars
                    .optional("GITHUB_BRANCH")
                    .unwrap_or_else(|| DEFAULT_GITHUB_BRANCH.to_string()),
                api_url: vars
                    .optional("GITHUB_API_URL")
                    .unwrap_or_else(|| DEFAULT_GITHUB_API_URL.to_string()),
            },
            storage_backend,
            s3,
            upload_policy: vars
                .optional("UPLOAD_POLICY")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("UPLOAD_POLICY".into()))
                })
                .transpose()?
                .unwrap_or_default(),
            index_root: vars
                .optional("INDEX_STORAGE_DIR")
                .unwrap_or_else(|| DEFAULT_INDEX_STORAGE_DIR.to_string())
                .into(),
            registry_path: vars
                .optional("REGISTRY_FILE")
                .unwrap_or_else(|| DEFAULT_REGISTRY_FILE.to_string()),
            server_port: vars
                .optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?
                .unwrap_or(DEFAULT_SERVER_PORT),
        })
    }
}

impl OpenAiSettings {
    /// Load only the provider settings; used by the command-line tool.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| env::var(key).ok();
        Self::from_vars(&Vars(&lookup))
    }

    fn from_vars<F>(vars: &Vars<'_, F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            api_key: vars.required("OPENAI_API_KEY")?,
            base_url: vars
                .optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            completion_model: vars
                .optional("OPENAI_COMPLETION_MODEL")
                .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
            embedding_model: vars
                .optional("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
        })
    }
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
    }

    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }
}

impl std::str::FromStr for StorageBackendKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(Self::GitHub),
            "s3" => Ok(Self::S3),
            _ => Err(()),
        }
    }
}

impl std::str::FromStr for UploadPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "accumulate" => Ok(Self::Accumulate),
            _ => Err(()),
        }
    }
}

/// Load `.env` (when present) and build the configuration from the process environment.
pub fn load() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        storage_backend = ?config.storage_backend,
        upload_policy = ?config.upload_policy,
        repository = %format!("{}/{}", config.github.owner, config.github.repository),
        index_root = %config.index_root.display(),
        server_port = config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
