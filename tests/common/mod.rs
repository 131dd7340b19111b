#![allow(dead_code)]

mod pdf;

pub use pdf::minimal_pdf;

use async_trait::async_trait;
use pdfqa::{
    completion::{CompletionClient, CompletionClientError},
    config::UploadPolicy,
    embedding::{EmbeddingClient, HashingEmbeddingClient},
    github::InMemoryContents,
    index::{IndexBuilder, QueryEngine},
    processing::DocumentService,
    registry::MetadataRegistry,
    storage::RepositoryStorage,
};
use std::path::Path;
use std::sync::{Arc, Mutex};

pub const REGISTRY_PATH: &str = "pdf_database.json";

/// Completion stub that records prompts and answers with a fixed sentence.
#[derive(Default)]
pub struct ScriptedCompleter {
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedCompleter {
    pub fn prompt_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompleter {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionClientError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("The total is 42.".to_string())
    }
}

pub struct Harness {
    pub contents: Arc<InMemoryContents>,
    pub completer: Arc<ScriptedCompleter>,
    pub service: Arc<DocumentService>,
}

pub fn harness(index_root: &Path) -> Harness {
    harness_with_contents(index_root, Arc::new(InMemoryContents::new()))
}

/// Build a service over an existing in-memory repository, as a restarted process would.
pub fn harness_with_contents(index_root: &Path, contents: Arc<InMemoryContents>) -> Harness {
    let embedder: Arc<dyn EmbeddingClient> = Arc::new(HashingEmbeddingClient::new(64));
    let completer = Arc::new(ScriptedCompleter::default());
    let service = DocumentService::new(
        Arc::new(RepositoryStorage::new(
            contents.clone(),
            UploadPolicy::Overwrite,
        )),
        MetadataRegistry::new(contents.clone(), REGISTRY_PATH),
        IndexBuilder::new(embedder.clone()),
        QueryEngine::new(embedder, completer.clone()),
        index_root,
    );
    Harness {
        contents,
        completer,
        service: Arc::new(service),
    }
}
