//! PDF text extraction through a scoped temporary file.

use crate::index::types::IndexError;
use std::io::Write;
use tempfile::NamedTempFile;

/// Extract plain text from PDF bytes.
///
/// The bytes are materialized as a `.pdf` temporary file that is removed when this function
/// returns, on success and failure alike. Parsing runs on a blocking worker.
pub async fn extract_text(raw_bytes: Vec<u8>) -> Result<String, IndexError> {
    tokio::task::spawn_blocking(move || {
        let mut file = tempfile::Builder::new()
            .prefix("pdfqa-")
            .suffix(".pdf")
            .tempfile()
            .map_err(|source| IndexError::io(std::env::temp_dir(), source))?;
        write_all(&mut file, &raw_bytes)?;

        pdf_extract::extract_text(file.path()).map_err(|error| {
            tracing::error!(path = %file.path().display(), error = %error, "PDF text extraction failed");
            IndexError::Extraction(error.to_string())
        })
    })
    .await
    .map_err(|error| {
        // pdf-extract panics on some malformed inputs; the join error carries that panic.
        tracing::error!(error = %error, "PDF extraction worker failed");
        IndexError::Extraction(format!("extraction worker failed: {error}"))
    })?
}

fn write_all(file: &mut NamedTempFile, bytes: &[u8]) -> Result<(), IndexError> {
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|source| IndexError::io(file.path(), source))
}

#[cfg(test)]
#[path = "../../tests/common/pdf.rs"]
mod pdf_fixture;
#[cfg(test)]
pub(crate) use pdf_fixture::minimal_pdf;
