#![deny(missing_docs)]

//! Core library for the PDF question-answering service.

/// HTTP routing and REST handlers.
pub mod api;
/// Chat-completion client abstraction and adapters.
pub mod completion;
/// Environment-driven configuration.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Cross-component error classification.
pub mod error;
/// GitHub repository contents integration.
pub mod github;
/// Per-document retrieval index: extraction, chunking, persistence and querying.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and query counters.
pub mod metrics;
/// Document pipeline orchestration.
pub mod processing;
/// Filename-keyed upload metadata.
pub mod registry;
/// Raw document storage backends.
pub mod storage;
