//! On-disk index artifact and exhaustive cosine retrieval.
//!
//! A persistence directory holds three JSON files: `docstore.json` (text nodes in document
//! order), `vector_store.json` (one embedding per node id) and `index_store.json` (build
//! metadata). The directory is only considered indexed when all three are present.

use crate::index::types::IndexError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Node text file.
pub const DOCSTORE_FILE: &str = "docstore.json";
/// Embedding file.
pub const VECTOR_STORE_FILE: &str = "vector_store.json";
/// Build metadata file.
pub const INDEX_STORE_FILE: &str = "index_store.json";

/// One retrievable chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextNode {
    /// Stable node identifier.
    pub id: String,
    /// Chunk text handed to the model as context.
    pub text: String,
    /// Position of the chunk within the source document.
    pub position: usize,
}

/// Build metadata persisted next to the nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Model that produced the vectors.
    pub embedding_model: String,
    /// Vector length.
    pub dimension: usize,
    /// Token budget used for chunking.
    pub chunk_size: usize,
    /// Token overlap used for chunking.
    pub chunk_overlap: usize,
    /// Hex SHA-256 of the source bytes.
    pub source_sha256: String,
    /// RFC 3339 build time.
    pub created_at: String,
}

#[derive(Serialize, Deserialize)]
struct DocStore {
    nodes: Vec<TextNode>,
}

#[derive(Serialize, Deserialize)]
struct VectorStore {
    embeddings: BTreeMap<String, Vec<f32>>,
}

/// A node paired with its similarity to the query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredNode<'a> {
    /// Matched node.
    pub node: &'a TextNode,
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
}

/// In-memory retrieval index over one document.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metadata: IndexMetadata,
    nodes: Vec<TextNode>,
    embeddings: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Pair nodes with their embeddings; both slices must align.
    pub fn new(
        metadata: IndexMetadata,
        nodes: Vec<TextNode>,
        embeddings: Vec<Vec<f32>>,
    ) -> Result<Self, IndexError> {
        if nodes.len() != embeddings.len() {
            return Err(IndexError::Corrupt {
                path: PathBuf::new(),
                reason: format!(
                    "{} nodes but {} embeddings",
                    nodes.len(),
                    embeddings.len()
                ),
            });
        }
        if let Some(actual) = embeddings
            .iter()
            .map(Vec::len)
            .find(|len| *len != metadata.dimension)
        {
            return Err(IndexError::DimensionMismatch {
                expected: metadata.dimension,
                actual,
            });
        }
        Ok(Self {
            metadata,
            nodes,
            embeddings,
        })
    }

    /// Build metadata.
    pub fn metadata(&self) -> &IndexMetadata {
        &self.metadata
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Highest-scoring `top_k` nodes, best first; ties keep document order.
    pub fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<ScoredNode<'_>>, IndexError> {
        if !self.is_empty() && query.len() != self.metadata.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.metadata.dimension,
                actual: query.len(),
            });
        }

        let mut scored: Vec<ScoredNode<'_>> = self
            .nodes
            .iter()
            .zip(&self.embeddings)
            .map(|(node, embedding)| ScoredNode {
                node,
                score: cosine_similarity(query, embedding),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Write the artifact to `dir`, replacing whatever was there.
    ///
    /// Files are staged in a sibling directory and swapped in once complete, so readers never
    /// observe a half-written artifact under `dir`. The staging directory is removed on failure.
    pub async fn persist(&self, dir: &Path) -> Result<(), IndexError> {
        let (target, staging) = staging_paths(dir)?;
        let result = match self.write_artifact(&staging).await {
            Ok(()) => swap_into_place(&staging, &target).await,
            Err(error) => Err(error),
        };

        if let Err(error) = result {
            match fs::remove_dir_all(&staging).await {
                Ok(()) => {}
                Err(cleanup) if cleanup.kind() == std::io::ErrorKind::NotFound => {}
                Err(cleanup) => {
                    tracing::warn!(staging = %staging.display(), error = %cleanup, "Failed to remove index staging directory");
                }
            }
            return Err(error);
        }

        tracing::debug!(dir = %target.display(), nodes = self.nodes.len(), "Persisted index");
        Ok(())
    }

    async fn write_artifact(&self, staging: &Path) -> Result<(), IndexError> {
        fs::create_dir_all(staging)
            .await
            .map_err(|source| IndexError::io(staging, source))?;

        let docstore = DocStore {
            nodes: self.nodes.clone(),
        };
        let vectors = VectorStore {
            embeddings: self
                .nodes
                .iter()
                .zip(&self.embeddings)
                .map(|(node, embedding)| (node.id.clone(), embedding.clone()))
                .collect(),
        };
        write_json(&staging.join(DOCSTORE_FILE), &docstore).await?;
        write_json(&staging.join(VECTOR_STORE_FILE), &vectors).await?;
        write_json(&staging.join(INDEX_STORE_FILE), &self.metadata).await
    }

    /// Read the artifact from `dir`.
    pub async fn load(dir: &Path) -> Result<Self, IndexError> {
        let docstore: DocStore = read_json(dir, DOCSTORE_FILE).await?;
        let vectors: VectorStore = read_json(dir, VECTOR_STORE_FILE).await?;
        let metadata: IndexMetadata = read_json(dir, INDEX_STORE_FILE).await?;

        let mut embeddings = Vec::with_capacity(docstore.nodes.len());
        let mut by_id = vectors.embeddings;
        for node in &docstore.nodes {
            let embedding = by_id.remove(&node.id).ok_or_else(|| IndexError::Corrupt {
                path: dir.to_path_buf(),
                reason: format!("node {} has no embedding", node.id),
            })?;
            embeddings.push(embedding);
        }

        Self::new(metadata, docstore.nodes, embeddings).map_err(|error| match error {
            IndexError::Corrupt { reason, .. } => IndexError::Corrupt {
                path: dir.to_path_buf(),
                reason,
            },
            other => other,
        })
    }
}

/// Normalized target directory and a unique staging sibling next to it.
///
/// Paths without a final component (`.`, `..`, `/`) are rejected: replacing them would remove
/// the caller's working directory or its parent.
fn staging_paths(dir: &Path) -> Result<(PathBuf, PathBuf), IndexError> {
    let (Some(parent), Some(name)) = (dir.parent(), dir.file_name()) else {
        return Err(IndexError::InvalidPersistDir {
            path: dir.to_path_buf(),
        });
    };
    let staging = parent.join(format!(
        ".{}.{}.staging",
        name.to_string_lossy(),
        uuid::Uuid::new_v4().simple()
    ));
    Ok((parent.join(name), staging))
}

async fn swap_into_place(staging: &Path, target: &Path) -> Result<(), IndexError> {
    match fs::remove_dir_all(target).await {
        Ok(()) => {}
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(source) => return Err(IndexError::io(target, source)),
    }
    fs::rename(staging, target)
        .await
        .map_err(|source| IndexError::io(target, source))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), IndexError> {
    let body = serde_json::to_vec(value)?;
    fs::write(path, body)
        .await
        .map_err(|source| IndexError::io(path, source))
}

async fn read_json<T: for<'de> Deserialize<'de>>(dir: &Path, file: &str) -> Result<T, IndexError> {
    let path = dir.join(file);
    let bytes = match fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(error)
            if matches!(
                error.kind(),
                std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
            ) =>
        {
            return Err(IndexError::NotIndexed {
                path: dir.to_path_buf(),
            });
        }
        Err(source) => return Err(IndexError::io(path, source)),
    };
    serde_json::from_slice(&bytes).map_err(|error| IndexError::Corrupt {
        path: dir.to_path_buf(),
        reason: format!("{file}: {error}"),
    })
}

/// Cosine similarity; zero for mismatched, empty or zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
