//! HTTP surface for the PDF question-answering service.
//!
//! Endpoints:
//!
//! - `GET /api/pdfs` – Stored documents as listed by the backend (`filename`, `size`, `url`,
//!   `last_modified`).
//! - `GET /api/pdfs/:filename` – Raw PDF bytes served as an attachment.
//! - `DELETE /api/pdfs/:filename` – Remove a document and its registry entry.
//! - `POST /api/upload` – Multipart upload (field `file`); stores, indexes and registers the PDF.
//! - `POST /api/query` – `{ "query": ..., "filename": ... }` answered from that document's index.
//! - `GET /api/registry` – Metadata registry entries.
//! - `GET /metrics` – Upload and query counters.
//!
//! Errors are returned as `{ "error": "<reason>" }` with a status derived from the error kind.

use crate::error::ErrorKind;
use crate::metrics::MetricsSnapshot;
use crate::processing::{DocumentApi, ProcessingError, UploadOutcome};
use crate::registry::DocumentSummary;
use crate::storage::FileListing;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Upper bound on request bodies, sized for PDF uploads.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>) -> Router
where
    S: DocumentApi + 'static,
{
    Router::new()
        .route("/api/pdfs", get(list_pdfs::<S>))
        .route(
            "/api/pdfs/:filename",
            get(get_pdf::<S>).delete(delete_pdf::<S>),
        )
        .route("/api/upload", post(upload_pdf::<S>))
        .route("/api/query", post(query_pdf::<S>))
        .route("/api/registry", get(list_registry::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(service)
}

async fn list_pdfs<S>(State(service): State<Arc<S>>) -> Result<Json<Vec<FileListing>>, AppError>
where
    S: DocumentApi,
{
    Ok(Json(service.list_documents().await?))
}

async fn list_registry<S>(
    State(service): State<Arc<S>>,
) -> Result<Json<Vec<DocumentSummary>>, AppError>
where
    S: DocumentApi,
{
    Ok(Json(service.registry_entries().await?))
}

/// Serve the raw document with a download disposition.
async fn get_pdf<S>(
    State(service): State<Arc<S>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError>
where
    S: DocumentApi,
{
    let bytes = service.fetch(&filename).await?;
    let disposition = format!("attachment; filename=\"{filename}\"");
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

async fn delete_pdf<S>(
    State(service): State<Arc<S>>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, AppError>
where
    S: DocumentApi,
{
    let deleted = service.delete(&filename).await?;
    Ok(Json(DeleteResponse { deleted }))
}

#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    document: UploadOutcome,
}

/// Accept a multipart upload, then store, index and register it.
async fn upload_pdf<S>(
    State(service): State<Arc<S>>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError>
where
    S: DocumentApi,
{
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| AppError::bad_request(error.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|error| AppError::bad_request(error.body_text()))?;
        upload = Some((filename, bytes));
        break;
    }

    let Some((filename, bytes)) = upload else {
        return Err(AppError::bad_request("No file part"));
    };
    if filename.is_empty() {
        return Err(AppError::bad_request("No selected file"));
    }
    if !filename.ends_with(".pdf") {
        return Err(AppError::bad_request("File must be a PDF"));
    }

    let document = service.upload(&filename, bytes.to_vec()).await?;
    tracing::info!(
        filename = %document.filename,
        size = document.size,
        chunks = document.chunk_count,
        "Upload request completed"
    );
    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        document,
    }))
}

#[derive(Deserialize)]
struct QueryRequest {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    filename: Option<String>,
}

#[derive(Serialize)]
struct QueryResponse {
    response: String,
}

async fn query_pdf<S>(
    State(service): State<Arc<S>>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, AppError>
where
    S: DocumentApi,
{
    let Some(query) = request.query.filter(|value| !value.trim().is_empty()) else {
        return Err(AppError::bad_request("No query provided"));
    };
    let Some(filename) = request.filename.filter(|value| !value.trim().is_empty()) else {
        return Err(AppError::bad_request("No filename provided"));
    };

    let response = service.query(&filename, &query).await?;
    Ok(Json(QueryResponse { response }))
}

async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: DocumentApi,
{
    Json(service.metrics_snapshot())
}

/// Error rendered as `{ "error": message }`.
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::Transport => StatusCode::BAD_GATEWAY,
        ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        let kind = inner.kind();
        let status = status_for(kind);
        if status.is_server_error() {
            tracing::error!(%kind, error = %inner, "Request failed");
        } else {
            tracing::debug!(%kind, error = %inner, "Request rejected");
        }
        Self {
            status,
            message: inner.to_string(),
        }
    }
}
