//! Answer questions from a persisted index.

use crate::completion::CompletionClient;
use crate::embedding::EmbeddingClient;
use crate::index::{store::VectorIndex, types::IndexError};
use std::path::Path;
use std::sync::Arc;

/// Number of chunks retrieved per question.
pub const TOP_K: usize = 8;

/// Fixed answer for questions the context cannot support.
pub const REFUSAL: &str = "I don't have enough information to answer that question.";

/// Retrieval plus generation over one document's index.
#[derive(Clone)]
pub struct QueryEngine {
    embedder: Arc<dyn EmbeddingClient>,
    completer: Arc<dyn CompletionClient>,
    top_k: usize,
}

impl QueryEngine {
    /// Engine retrieving [`TOP_K`] chunks per question.
    pub fn new(embedder: Arc<dyn EmbeddingClient>, completer: Arc<dyn CompletionClient>) -> Self {
        Self {
            embedder,
            completer,
            top_k: TOP_K,
        }
    }

    /// Answer `query_text` using the index persisted in `persist_dir`.
    ///
    /// Fails with [`IndexError::NotIndexed`] when the directory holds no complete index. The
    /// model's reply is returned verbatim.
    pub async fn answer(&self, query_text: &str, persist_dir: &Path) -> Result<String, IndexError> {
        let index = VectorIndex::load(persist_dir).await.inspect_err(|error| {
            tracing::error!(dir = %persist_dir.display(), error = %error, "Failed to load index");
        })?;

        if index.is_empty() {
            tracing::debug!(dir = %persist_dir.display(), "Index has no nodes; refusing");
            return Ok(REFUSAL.to_string());
        }

        let query_vector = self
            .embedder
            .generate_embeddings(vec![query_text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::DimensionMismatch {
                expected: index.metadata().dimension,
                actual: 0,
            })?;

        let hits = index.search(&query_vector, self.top_k)?;
        tracing::debug!(
            dir = %persist_dir.display(),
            retrieved = hits.len(),
            best_score = hits.first().map(|hit| hit.score),
            "Retrieved context"
        );

        let context: Vec<&str> = hits.iter().map(|hit| hit.node.text.as_str()).collect();
        let prompt = build_prompt(&context.join("\n\n"), query_text);
        let answer = self.completer.complete(&prompt).await.inspect_err(|error| {
            tracing::error!(dir = %persist_dir.display(), error = %error, "Completion failed");
        })?;
        Ok(answer)
    }
}

/// Context-bounded prompt instructing the model to answer only from `context`.
pub fn build_prompt(context: &str, query: &str) -> String {
    format!(
        "You are a helpful AI assistant. Answer the question based ONLY on the provided context. \
         If the context doesn't contain the answer, say '{REFUSAL}'\n\n\
         Context: {context}\n\n\
         Question: {query}\n\n\
         Answer: "
    )
}
