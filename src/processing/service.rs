//! Document service coordinating storage, indexing and the metadata registry.

use crate::{
    completion::{CompletionClient, OpenAiCompletionClient},
    config::{Config, StorageBackendKind},
    embedding::{EmbeddingClient, OpenAiEmbeddingClient},
    github::{ContentsApi, GitHubClient},
    index::{self, IndexBuilder, IndexError, QueryEngine},
    metrics::{DocumentMetrics, MetricsSnapshot},
    processing::{
        sanitize::{ensure_plain_filename, sanitize_filename},
        types::{ProcessingError, UploadOutcome},
    },
    registry::{DocumentSummary, MetadataRegistry},
    storage::{BucketStorage, DocumentStore, FileListing, RepositoryStorage, StorageError},
};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;

/// Coordinates the upload pipeline: raw storage, index build and registry update.
///
/// Every collaborator is handed in at construction; there is no process-wide state. Build the
/// service once near process start and share it through an `Arc`.
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    registry: MetadataRegistry,
    builder: IndexBuilder,
    engine: QueryEngine,
    index_root: PathBuf,
    metrics: Arc<DocumentMetrics>,
}

/// Abstraction over the document pipeline used by the HTTP surface.
#[async_trait]
pub trait DocumentApi: Send + Sync {
    /// Store, index and register an uploaded PDF.
    async fn upload(&self, filename: &str, content: Vec<u8>)
    -> Result<UploadOutcome, ProcessingError>;

    /// Enumerate stored documents as reported by the backend.
    async fn list_documents(&self) -> Result<Vec<FileListing>, ProcessingError>;

    /// Registry entries ordered by filename.
    async fn registry_entries(&self) -> Result<Vec<DocumentSummary>, ProcessingError>;

    /// Raw bytes of a stored document.
    async fn fetch(&self, filename: &str) -> Result<Vec<u8>, ProcessingError>;

    /// Answer a question against one document's index.
    async fn query(&self, filename: &str, query: &str) -> Result<String, ProcessingError>;

    /// Remove a document and its registry entry; the index directory is left in place.
    async fn delete(&self, filename: &str) -> Result<bool, ProcessingError>;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Assemble a service from explicit collaborators.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        registry: MetadataRegistry,
        builder: IndexBuilder,
        engine: QueryEngine,
        index_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            registry,
            builder,
            engine,
            index_root: index_root.into(),
            metrics: Arc::new(DocumentMetrics::new()),
        }
    }

    /// Build the production service and bootstrap the repository and storage root.
    pub async fn from_config(config: &Config) -> Result<Self, ProcessingError> {
        let contents: Arc<dyn ContentsApi> = Arc::new(GitHubClient::new(&config.github)?);
        tracing::info!(
            repository = %format!("{}/{}", config.github.owner, config.github.repository),
            "Ensuring registry repository"
        );
        contents.ensure_repository().await?;

        let store: Arc<dyn DocumentStore> = match config.storage_backend {
            StorageBackendKind::GitHub => Arc::new(RepositoryStorage::new(
                contents.clone(),
                config.upload_policy,
            )),
            StorageBackendKind::S3 => {
                let settings = config.s3.as_ref().ok_or_else(|| {
                    crate::config::ConfigError::MissingVariable("AWS_BUCKET_NAME".into())
                })?;
                Arc::new(BucketStorage::new(settings, config.upload_policy)?)
            }
        };
        store.ensure_root().await?;
        tracing::info!(backend = ?store.backend(), policy = ?store.upload_policy(), "Storage ready");

        let embedder: Arc<dyn EmbeddingClient> =
            Arc::new(OpenAiEmbeddingClient::new(&config.openai)?);
        let completer: Arc<dyn CompletionClient> =
            Arc::new(OpenAiCompletionClient::new(&config.openai)?);

        Ok(Self::new(
            store,
            MetadataRegistry::new(contents, config.registry_path.clone()),
            IndexBuilder::new(embedder.clone()),
            QueryEngine::new(embedder, completer),
            config.index_root.clone(),
        ))
    }

    /// Store, index and register an uploaded PDF.
    ///
    /// Steps run in order and stop at the first failure; earlier steps are not rolled back.
    pub async fn upload(
        &self,
        raw_filename: &str,
        content: Vec<u8>,
    ) -> Result<UploadOutcome, ProcessingError> {
        let filename = sanitize_filename(raw_filename)?;
        tracing::info!(filename, size = content.len(), "Processing upload");

        self.store.ensure_root().await?;
        let stored = self.store.upload(&filename, content.clone()).await?;

        let persist_dir = index::persist_dir(&self.index_root, &filename);
        let summary = self.builder.build(content, &persist_dir).await?;

        self.registry
            .record(DocumentSummary {
                filename: filename.clone(),
                upload_date: stored.upload_date.clone(),
                size: stored.size,
                sha256: Some(summary.source_sha256.clone()),
            })
            .await?;

        self.metrics.record_upload(summary.node_count as u64);
        tracing::info!(
            filename,
            key = %stored.key,
            chunks = summary.node_count,
            "Document uploaded and indexed"
        );

        Ok(UploadOutcome {
            filename,
            size: stored.size,
            upload_date: stored.upload_date,
            url: stored.url,
            sha256: summary.source_sha256,
            chunk_count: summary.node_count,
        })
    }

    /// Enumerate stored documents as reported by the backend.
    pub async fn list_documents(&self) -> Result<Vec<FileListing>, ProcessingError> {
        Ok(self.store.list_files().await?)
    }

    /// Registry entries ordered by filename.
    pub async fn registry_entries(&self) -> Result<Vec<DocumentSummary>, ProcessingError> {
        Ok(self.registry.load().await?.into_values().collect())
    }

    /// Raw bytes of a stored document.
    pub async fn fetch(&self, filename: &str) -> Result<Vec<u8>, ProcessingError> {
        let filename = ensure_plain_filename(filename)?;
        Ok(self.store.fetch(filename).await?)
    }

    /// Access URL of a stored document.
    pub async fn file_url(&self, filename: &str) -> Result<String, ProcessingError> {
        let filename = ensure_plain_filename(filename)?;
        Ok(self.store.get_file_url(filename).await?)
    }

    /// Answer a question against one document's index.
    pub async fn query(&self, filename: &str, query: &str) -> Result<String, ProcessingError> {
        let filename = ensure_plain_filename(filename)?;
        let persist_dir = index::persist_dir(&self.index_root, filename);
        tracing::info!(filename, "Answering query");

        let result = self
            .engine
            .answer(query, &persist_dir)
            .await
            .map_err(|error| match error {
                IndexError::NotIndexed { .. } => ProcessingError::NotIndexed {
                    filename: filename.to_string(),
                },
                other => ProcessingError::Index(other),
            });
        self.metrics.record_query(result.is_ok());
        result
    }

    /// Remove a document and its registry entry; the index directory is left in place.
    pub async fn delete(&self, filename: &str) -> Result<bool, ProcessingError> {
        let filename = ensure_plain_filename(filename)?;
        let removed_object = match self.store.delete_file(filename).await {
            Ok(removed) => removed,
            Err(StorageError::NotFound { .. }) => false,
            Err(error) => return Err(error.into()),
        };
        let removed_entry = self.registry.remove(filename).await?;

        let deleted = removed_object || removed_entry;
        if deleted {
            self.metrics.record_delete();
        }
        tracing::info!(filename, removed_object, removed_entry, "Processed delete");
        Ok(deleted)
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl DocumentApi for DocumentService {
    async fn upload(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<UploadOutcome, ProcessingError> {
        DocumentService::upload(self, filename, content).await
    }

    async fn list_documents(&self) -> Result<Vec<FileListing>, ProcessingError> {
        DocumentService::list_documents(self).await
    }

    async fn registry_entries(&self) -> Result<Vec<DocumentSummary>, ProcessingError> {
        DocumentService::registry_entries(self).await
    }

    async fn fetch(&self, filename: &str) -> Result<Vec<u8>, ProcessingError> {
        DocumentService::fetch(self, filename).await
    }

    async fn query(&self, filename: &str, query: &str) -> Result<String, ProcessingError> {
        DocumentService::query(self, filename, query).await
    }

    async fn delete(&self, filename: &str) -> Result<bool, ProcessingError> {
        DocumentService::delete(self, filename).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}
