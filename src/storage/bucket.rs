//! S3 bucket backend built on `object_store`.

use crate::config::{S3Settings, StorageBackendKind, UploadPolicy};
use crate::storage::{
    DOCUMENT_PREFIX, DocumentStore, FileListing, StorageError, StoredDocument,
    current_timestamp_rfc3339, filename_from_key, storage_key,
};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::TryStreamExt;
use object_store::{
    ObjectMeta, ObjectStore, PutPayload, aws::AmazonS3Builder, path::Path as ObjPath,
    signer::Signer,
};
use reqwest::{Client, Method, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Lifetime of pre-signed access URLs.
pub const PRESIGNED_URL_TTL: Duration = Duration::from_secs(3600);

const DEFAULT_REGION: &str = "us-east-1";

/// Bucket-backed document storage with pre-signed access URLs.
pub struct BucketStorage {
    store: Arc<dyn ObjectStore>,
    signer: Arc<dyn Signer>,
    http: Client,
    bucket: String,
    region: String,
    policy: UploadPolicy,
}

impl BucketStorage {
    /// Build an S3 client from explicit credentials.
    pub fn new(settings: &S3Settings, policy: UploadPolicy) -> Result<Self, StorageError> {
        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region)
            .with_access_key_id(&settings.access_key_id)
            .with_secret_access_key(&settings.secret_access_key);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder.with_endpoint(endpoint).with_allow_http(true);
        }
        let s3 = Arc::new(builder.build()?);
        tracing::debug!(
            bucket = %settings.bucket,
            region = %settings.region,
            endpoint = ?settings.endpoint,
            ?policy,
            "Initialized bucket storage"
        );

        Ok(Self::with_backend(
            s3.clone(),
            s3,
            &settings.bucket,
            &settings.region,
            policy,
        ))
    }

    /// Assemble a bucket backend from an explicit object store and URL signer.
    pub fn with_backend(
        store: Arc<dyn ObjectStore>,
        signer: Arc<dyn Signer>,
        bucket: &str,
        region: &str,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            store,
            signer,
            http: Client::new(),
            bucket: bucket.to_string(),
            region: region.to_string(),
            policy,
        }
    }

    async fn presign(&self, method: Method, path: &ObjPath) -> Result<String, StorageError> {
        let url = self
            .signer
            .signed_url(method, path, PRESIGNED_URL_TTL)
            .await?;
        Ok(url.to_string())
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        let url = self.presign(Method::HEAD, &ObjPath::default()).await?;
        let response = self.http.head(url).send().await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StorageError::UnexpectedStatus { status, body };
                tracing::error!(bucket = %self.bucket, error = %error, "Bucket existence check failed");
                Err(error)
            }
        }
    }

    async fn create_bucket(&self) -> Result<(), StorageError> {
        let url = self.presign(Method::PUT, &ObjPath::default()).await?;
        let mut request = self.http.put(url);
        if self.region != DEFAULT_REGION {
            request = request.body(format!(
                "<CreateBucketConfiguration xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
                 <LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>",
                self.region
            ));
        }
        let response = request.send().await?;

        match response.status() {
            status if status.is_success() => {
                tracing::info!(bucket = %self.bucket, region = %self.region, "Created bucket");
                Ok(())
            }
            StatusCode::CONFLICT => {
                tracing::debug!(bucket = %self.bucket, "Bucket already owned");
                Ok(())
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                let error = StorageError::UnexpectedStatus { status, body };
                tracing::error!(bucket = %self.bucket, error = %error, "Bucket creation failed");
                Err(error)
            }
        }
    }

    async fn list_documents(&self) -> Result<Vec<ObjectMeta>, StorageError> {
        let prefix = ObjPath::from(DOCUMENT_PREFIX);
        let objects: Vec<ObjectMeta> = self.store.list(Some(&prefix)).try_collect().await?;
        Ok(objects
            .into_iter()
            .filter(|meta| filename_from_key(self.policy, meta.location.as_ref()).is_some())
            .collect())
    }

    /// All stored versions of `filename`, oldest first.
    async fn versions(&self, filename: &str) -> Result<Vec<ObjectMeta>, StorageError> {
        match self.policy {
            UploadPolicy::Overwrite => {
                let path = ObjPath::from(storage_key(self.policy, filename, OffsetDateTime::now_utc()));
                match self.store.head(&path).await {
                    Ok(meta) => Ok(vec![meta]),
                    Err(object_store::Error::NotFound { .. }) => Ok(Vec::new()),
                    Err(error) => Err(error.into()),
                }
            }
            UploadPolicy::Accumulate => {
                let mut matching: Vec<ObjectMeta> = self
                    .list_documents()
                    .await?
                    .into_iter()
                    .filter(|meta| {
                        filename_from_key(self.policy, meta.location.as_ref()) == Some(filename)
                    })
                    .collect();
                matching.sort_by(|a, b| a.location.as_ref().cmp(b.location.as_ref()));
                Ok(matching)
            }
        }
    }

    async fn current_version(&self, filename: &str) -> Result<ObjectMeta, StorageError> {
        self.versions(filename)
            .await?
            .pop()
            .ok_or_else(|| StorageError::NotFound {
                filename: filename.to_string(),
            })
    }
}

#[async_trait]
impl DocumentStore for BucketStorage {
    fn backend(&self) -> StorageBackendKind {
        StorageBackendKind::S3
    }

    fn upload_policy(&self) -> UploadPolicy {
        self.policy
    }

    async fn ensure_root(&self) -> Result<(), StorageError> {
        if self.bucket_exists().await? {
            return Ok(());
        }
        self.create_bucket().await
    }

    async fn upload(
        &self,
        filename: &str,
        content: Vec<u8>,
    ) -> Result<StoredDocument, StorageError> {
        let key = storage_key(self.policy, filename, OffsetDateTime::now_utc());
        let path = ObjPath::from(key.as_str());
        let size = content.len() as u64;

        self.store
            .put(&path, PutPayload::from(Bytes::from(content)))
            .await
            .inspect_err(|error| {
                tracing::error!(bucket = %self.bucket, key = %key, error = %error, "Error uploading file to bucket");
            })?;
        let url = self.presign(Method::GET, &path).await?;
        tracing::debug!(bucket = %self.bucket, key = %key, size, "Uploaded document");

        Ok(StoredDocument {
            filename: filename.to_string(),
            key,
            url,
            size,
            upload_date: current_timestamp_rfc3339(),
        })
    }

    async fn get_file_url(&self, filename: &str) -> Result<String, StorageError> {
        let meta = self.current_version(filename).await?;
        self.presign(Method::GET, &meta.location)
            .await
            .inspect_err(|error| {
                tracing::error!(bucket = %self.bucket, filename, error = %error, "Error generating presigned URL");
            })
    }

    async fn fetch(&self, filename: &str) -> Result<Vec<u8>, StorageError> {
        let meta = self.current_version(filename).await?;
        let bytes = self
            .store
            .get(&meta.location)
            .await?
            .bytes()
            .await
            .inspect_err(|error| {
                tracing::error!(bucket = %self.bucket, filename, error = %error, "Error reading file from bucket");
            })?;
        Ok(bytes.to_vec())
    }

    async fn list_files(&self) -> Result<Vec<FileListing>, StorageError> {
        let objects = self.list_documents().await.inspect_err(|error| {
            tracing::error!(bucket = %self.bucket, error = %error, "Error listing files from bucket");
        })?;

        let mut files = Vec::with_capacity(objects.len());
        for meta in objects {
            let Some(filename) = filename_from_key(self.policy, meta.location.as_ref()) else {
                continue;
            };
            files.push(FileListing {
                filename: filename.to_string(),
                size: meta.size as u64,
                url: self.presign(Method::GET, &meta.location).await?,
                last_modified: Some(meta.last_modified.to_rfc3339()),
            });
        }
        Ok(files)
    }

    async fn delete_file(&self, filename: &str) -> Result<bool, StorageError> {
        let versions = self.versions(filename).await?;
        if versions.is_empty() {
            return Ok(false);
        }
        for meta in &versions {
            self.store
                .delete(&meta.location)
                .await
                .inspect_err(|error| {
                    tracing::error!(bucket = %self.bucket, key = %meta.location, error = %error, "Error deleting file from bucket");
                })?;
        }
        tracing::debug!(bucket = %self.bucket, filename, versions = versions.len(), "Deleted document");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{
        Method::{HEAD, PUT},
        MockServer,
    };
    use object_store::{aws::AmazonS3, memory::InMemory};

    fn signer(endpoint: &str) -> Arc<AmazonS3> {
        Arc::new(
            AmazonS3Builder::new()
                .with_bucket_name("docs")
                .with_region("us-east-1")
                .with_access_key_id("AKIDEXAMPLE")
                .with_secret_access_key("secret")
                .with_endpoint(endpoint)
                .with_allow_http(true)
                .build()
                .expect("s3 signer"),
        )
    }

    fn memory_storage(policy: UploadPolicy) -> BucketStorage {
        BucketStorage::with_backend(
            Arc::new(InMemory::new()),
            signer("http://127.0.0.1:9000"),
            "docs",
            "us-east-1",
            policy,
        )
    }

    #[tokio::test]
    async fn upload_then_list_reports_filename_and_size() {
        let storage = memory_storage(UploadPolicy::Overwrite);
        let stored = storage
            .upload("report.pdf", b"0123456789".to_vec())
            .await
            .expect("upload");
        assert_eq!(stored.key, "pdfs/report.pdf");
        assert_eq!(stored.size, 10);
        assert!(stored.url.contains("X-Amz-Expires=3600"));

        let files = storage.list_files().await.expect("list");
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "report.pdf");
        assert_eq!(files[0].size, 10);
        assert!(files[0].last_modified.is_some());
    }

    #[tokio::test]
    async fn listing_ignores_non_pdf_objects() {
        let store = Arc::new(InMemory::new());
        store
            .put(&ObjPath::from("pdfs/notes.txt"), PutPayload::from_static(b"x"))
            .await
            .unwrap();
        store
            .put(&ObjPath::from("other/a.pdf"), PutPayload::from_static(b"x"))
            .await
            .unwrap();
        let storage = BucketStorage::with_backend(
            store,
            signer("http://127.0.0.1:9000"),
            "docs",
            "us-east-1",
            UploadPolicy::Overwrite,
        );

        assert!(storage.list_files().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn missing_file_url_is_not_found() {
        let storage = memory_storage(UploadPolicy::Overwrite);
        let error = storage
            .get_file_url("never.pdf")
            .await
            .expect_err("not found");
        assert_eq!(error.kind(), crate::error::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn delete_then_url_lookup_fails() {
        let storage = memory_storage(UploadPolicy::Overwrite);
        storage.upload("a.pdf", b"abc".to_vec()).await.unwrap();
        assert!(storage.delete_file("a.pdf").await.expect("delete"));
        assert!(!storage.delete_file("a.pdf").await.expect("second delete"));

        let error = storage.get_file_url("a.pdf").await.expect_err("gone");
        assert!(matches!(error, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn accumulate_policy_keeps_versions_and_reads_newest() {
        let store = Arc::new(InMemory::new());
        let older = storage_key(
            UploadPolicy::Accumulate,
            "a.pdf",
            time::macros::datetime!(2024-01-01 00:00:00 UTC),
        );
        store
            .put(&ObjPath::from(older.as_str()), PutPayload::from_static(b"old"))
            .await
            .unwrap();
        let storage = BucketStorage::with_backend(
            store,
            signer("http://127.0.0.1:9000"),
            "docs",
            "us-east-1",
            UploadPolicy::Accumulate,
        );

        let stored = storage.upload("a.pdf", b"newer".to_vec()).await.unwrap();
        assert_ne!(stored.key, older);

        let files = storage.list_files().await.unwrap();
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|file| file.filename == "a.pdf"));
        assert_eq!(storage.fetch("a.pdf").await.unwrap(), b"newer".to_vec());

        assert!(storage.delete_file("a.pdf").await.unwrap());
        assert!(storage.list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ensure_root_creates_missing_bucket_once() {
        let server = MockServer::start_async().await;
        let mut head_missing = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/docs/");
                then.status(404);
            })
            .await;
        let create = server
            .mock_async(|when, then| {
                when.method(PUT).path("/docs/");
                then.status(200);
            })
            .await;

        let s3 = signer(&server.base_url());
        let storage = BucketStorage::with_backend(
            s3.clone(),
            s3,
            "docs",
            "us-east-1",
            UploadPolicy::Overwrite,
        );
        storage.ensure_root().await.expect("bucket created");
        head_missing.assert_async().await;
        create.assert_async().await;
        head_missing.delete_async().await;

        let head_present = server
            .mock_async(|when, then| {
                when.method(HEAD).path("/docs/");
                then.status(200);
            })
            .await;
        storage.ensure_root().await.expect("bucket present");
        head_present.assert_async().await;
        create.assert_hits_async(1).await;
    }

    #[tokio::test]
    async fn ensure_root_escalates_unexpected_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/docs/");
                then.status(500);
            })
            .await;

        let s3 = signer(&server.base_url());
        let storage = BucketStorage::with_backend(
            s3.clone(),
            s3,
            "docs",
            "us-east-1",
            UploadPolicy::Overwrite,
        );
        let error = storage.ensure_root().await.expect_err("server error");
        assert_eq!(error.kind(), crate::error::ErrorKind::Transport);
    }
}
