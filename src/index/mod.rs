//! Per-document retrieval index.
//!
//! Each uploaded document gets its own persistence directory (`<index_root>/<filename>/`). The
//! artifact is a derived cache: it is rebuilt wholesale from the raw bytes on every upload and
//! never treated as a source of truth.

pub mod builder;
pub mod chunking;
pub mod extract;
pub mod query;
pub mod store;
pub mod types;

pub use builder::IndexBuilder;
pub use query::{QueryEngine, REFUSAL, TOP_K};
pub use store::{TextNode, VectorIndex};
pub use types::{ChunkingError, IndexError, IndexSummary};

use std::path::{Path, PathBuf};

/// Persistence directory for `filename` under `index_root`.
pub fn persist_dir(index_root: &Path, filename: &str) -> PathBuf {
    index_root.join(filename)
}
