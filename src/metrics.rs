use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters describing upload and query activity.
#[derive(Default)]
pub struct DocumentMetrics {
    documents_uploaded: AtomicU64,
    chunks_indexed: AtomicU64,
    documents_deleted: AtomicU64,
    queries_answered: AtomicU64,
    queries_failed: AtomicU64,
}

impl DocumentMetrics {
    /// Create an empty metrics accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an uploaded document and the number of chunks indexed for it.
    pub fn record_upload(&self, chunk_count: u64) {
        self.documents_uploaded.fetch_add(1, Ordering::Relaxed);
        self.chunks_indexed.fetch_add(chunk_count, Ordering::Relaxed);
    }

    /// Record a removed document.
    pub fn record_delete(&self) {
        self.documents_deleted.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a query.
    pub fn record_query(&self, succeeded: bool) {
        let counter = if succeeded {
            &self.queries_answered
        } else {
            &self.queries_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Return a snapshot of the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents_uploaded: self.documents_uploaded.load(Ordering::Relaxed),
            chunks_indexed: self.chunks_indexed.load(Ordering::Relaxed),
            documents_deleted: self.documents_deleted.load(Ordering::Relaxed),
            queries_answered: self.queries_answered.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
        }
    }
}

/// Immutable view of the counters used for reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Documents uploaded and indexed since startup.
    pub documents_uploaded: u64,
    /// Chunks produced across all uploads.
    pub chunks_indexed: u64,
    /// Documents removed since startup.
    pub documents_deleted: u64,
    /// Queries that produced an answer.
    pub queries_answered: u64,
    /// Queries that failed.
    pub queries_failed: u64,
}
