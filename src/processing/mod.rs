//! Document pipeline: filename sanitization, storage, index build and registry updates.

pub mod sanitize;
mod service;
pub mod types;

pub use service::{DocumentApi, DocumentService};
pub use types::{ProcessingError, UploadOutcome};
