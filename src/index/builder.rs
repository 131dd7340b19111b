//! Build a retrieval index from raw PDF bytes and persist it.

use crate::embedding::EmbeddingClient;
use crate::index::{
    chunking::{CHUNK_OVERLAP, CHUNK_SIZE, chunk_text},
    extract::extract_text,
    store::{IndexMetadata, TextNode, VectorIndex},
    types::{IndexError, IndexSummary},
};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Turns documents into persisted [`VectorIndex`] artifacts.
#[derive(Clone)]
pub struct IndexBuilder {
    embedder: Arc<dyn EmbeddingClient>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IndexBuilder {
    /// Builder using the fixed chunking constants.
    pub fn new(embedder: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            embedder,
            chunk_size: CHUNK_SIZE,
            chunk_overlap: CHUNK_OVERLAP,
        }
    }

    /// Extract, chunk, embed and persist `raw_bytes` into `persist_dir`.
    ///
    /// Bytes that do not parse as a PDF contribute no text and produce an empty index. Nothing
    /// is written until every chunk has an embedding; a failure leaves any previous artifact in
    /// `persist_dir` untouched.
    pub async fn build(
        &self,
        raw_bytes: Vec<u8>,
        persist_dir: &Path,
    ) -> Result<IndexSummary, IndexError> {
        let source_sha256 = hex::encode(Sha256::digest(&raw_bytes));
        let text = match extract_text(raw_bytes).await {
            Ok(text) => text,
            Err(IndexError::Extraction(reason)) => {
                tracing::warn!(dir = %persist_dir.display(), reason = %reason, "Unreadable PDF indexed as empty");
                String::new()
            }
            Err(error) => return Err(error),
        };
        let characters = text.len();
        let (chunk_size, chunk_overlap) = (self.chunk_size, self.chunk_overlap);
        let chunks =
            tokio::task::spawn_blocking(move || chunk_text(&text, chunk_size, chunk_overlap))
                .await??;

        tracing::debug!(
            dir = %persist_dir.display(),
            characters,
            chunks = chunks.len(),
            "Chunked document"
        );

        let embeddings = if chunks.is_empty() {
            tracing::warn!(dir = %persist_dir.display(), "Document has no extractable text");
            Vec::new()
        } else {
            self.embedder
                .generate_embeddings(chunks.clone())
                .await
                .inspect_err(|error| {
                    tracing::error!(dir = %persist_dir.display(), error = %error, "Embedding failed during index build");
                })?
        };

        let nodes: Vec<TextNode> = chunks
            .into_iter()
            .enumerate()
            .map(|(position, text)| TextNode {
                id: Uuid::new_v4().to_string(),
                text,
                position,
            })
            .collect();
        let metadata = IndexMetadata {
            embedding_model: self.embedder.model().to_string(),
            dimension: embeddings.first().map_or(0, Vec::len),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            source_sha256: source_sha256.clone(),
            created_at: crate::storage::current_timestamp_rfc3339(),
        };

        let index = VectorIndex::new(metadata, nodes, embeddings)?;
        index.persist(persist_dir).await.inspect_err(|error| {
            tracing::error!(dir = %persist_dir.display(), error = %error, "Failed to persist index");
        })?;

        tracing::info!(dir = %persist_dir.display(), nodes = index.len(), "Built index");
        Ok(IndexSummary {
            node_count: index.len(),
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            source_sha256,
            persist_dir: persist_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{EmbeddingClientError, HashingEmbeddingClient};
    use crate::index::extract::minimal_pdf;
    use crate::index::store::DOCSTORE_FILE;

    fn builder() -> IndexBuilder {
        IndexBuilder::new(Arc::new(HashingEmbeddingClient::new(16)))
    }

    #[tokio::test]
    async fn build_persists_loadable_index() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("report.pdf");
        let bytes = minimal_pdf("The total is 42 dollars");

        let summary = builder().build(bytes.clone(), &dir).await.expect("build");
        assert_eq!(summary.node_count, 1);
        assert_eq!(summary.source_sha256, hex::encode(Sha256::digest(&bytes)));

        let index = VectorIndex::load(&dir).await.expect("load");
        assert_eq!(index.len(), 1);
        assert_eq!(index.metadata().dimension, 16);
        assert_eq!(index.metadata().embedding_model, "hashing");
    }

    struct FailingEmbedder;

    #[async_trait::async_trait]
    impl EmbeddingClient for FailingEmbedder {
        fn model(&self) -> &str {
            "failing"
        }

        async fn generate_embeddings(
            &self,
            _texts: Vec<String>,
        ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
            Err(EmbeddingClientError::GenerationFailed("offline".into()))
        }
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_artifact() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("report.pdf");
        builder()
            .build(minimal_pdf("first version"), &dir)
            .await
            .unwrap();
        let before = std::fs::read(dir.join(DOCSTORE_FILE)).unwrap();

        let error = IndexBuilder::new(Arc::new(FailingEmbedder))
            .build(minimal_pdf("second version"), &dir)
            .await
            .expect_err("embedding fails");
        assert!(matches!(error, IndexError::Embedding(_)));
        assert_eq!(std::fs::read(dir.join(DOCSTORE_FILE)).unwrap(), before);
    }

    #[tokio::test]
    async fn unreadable_bytes_build_an_empty_index() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("report.pdf");

        let summary = builder()
            .build(b"0123456789".to_vec(), &dir)
            .await
            .expect("empty index");
        assert_eq!(summary.node_count, 0);

        let index = VectorIndex::load(&dir).await.expect("load");
        assert!(index.is_empty());
        assert_eq!(index.metadata().dimension, 0);
    }
}
