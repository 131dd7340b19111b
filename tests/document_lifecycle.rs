mod common;

use axum::{
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use common::{REGISTRY_PATH, harness, harness_with_contents, minimal_pdf};
use pdfqa::{
    api::create_router,
    error::ErrorKind,
    github::ContentsApi,
    index::REFUSAL,
    processing::ProcessingError,
};
use regex::Regex;
use serde_json::{Value, json};
use tower::ServiceExt;

#[tokio::test]
async fn upload_then_query_answers_from_the_document() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());

    let outcome = h
        .service
        .upload("report.pdf", minimal_pdf("The quarterly total is 42"))
        .await
        .expect("upload");
    assert!(outcome.chunk_count >= 1);

    let listing = h.service.list_documents().await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].filename, "report.pdf");

    let answer = h
        .service
        .query("report.pdf", "What is the quarterly total?")
        .await
        .expect("answer");
    assert_eq!(answer, "The total is 42.");

    let prompts = h.completer.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("The quarterly total is 42"));
    assert!(prompts[0].contains("What is the quarterly total?"));
}

#[tokio::test]
async fn query_for_unknown_document_is_not_found() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());

    let error = h
        .service
        .query("never.pdf", "anything?")
        .await
        .expect_err("not indexed");
    assert!(matches!(error, ProcessingError::NotIndexed { .. }));
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert_eq!(h.completer.prompt_count(), 0);
    assert_eq!(h.service.metrics_snapshot().queries_failed, 1);
}

#[tokio::test]
async fn delete_removes_object_and_registry_entry() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());
    h.service
        .upload("report.pdf", minimal_pdf("delete me"))
        .await
        .unwrap();

    assert!(h.service.delete("report.pdf").await.unwrap());

    let error = h.service.file_url("report.pdf").await.expect_err("gone");
    assert_eq!(error.kind(), ErrorKind::NotFound);
    assert!(h.service.registry_entries().await.unwrap().is_empty());
    assert!(h.service.list_documents().await.unwrap().is_empty());

    assert!(!h.service.delete("report.pdf").await.unwrap());
}

#[tokio::test]
async fn reupload_replaces_content_and_rebuilds_index() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());

    let first = h
        .service
        .upload("report.pdf", minimal_pdf("first revision"))
        .await
        .unwrap();
    let second = h
        .service
        .upload("report.pdf", minimal_pdf("second revision"))
        .await
        .unwrap();
    assert_ne!(first.sha256, second.sha256);

    let entries = h.service.registry_entries().await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].sha256.as_deref(), Some(second.sha256.as_str()));

    let stored = h.service.fetch("report.pdf").await.unwrap();
    assert_eq!(stored, minimal_pdf("second revision"));

    h.service.query("report.pdf", "which revision?").await.unwrap();
    let prompts = h.completer.prompts.lock().unwrap().clone();
    assert!(prompts[0].contains("second revision"));
    assert!(!prompts[0].contains("first revision"));
}

#[tokio::test]
async fn bootstrap_is_idempotent_across_restarts() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());
    h.service
        .upload("report.pdf", minimal_pdf("kept across restarts"))
        .await
        .unwrap();
    let before = h.contents.paths().await;

    let restarted = harness_with_contents(root.path(), h.contents.clone());
    restarted
        .service
        .upload("second.pdf", minimal_pdf("another document"))
        .await
        .unwrap();

    let after = restarted.contents.paths().await;
    assert_eq!(
        after.iter().filter(|path| path.ends_with("README.md")).count(),
        1
    );
    for path in before {
        assert!(after.contains(&path), "{path} should survive a restart");
    }

    let entries = restarted.service.registry_entries().await.unwrap();
    let names: Vec<_> = entries.iter().map(|entry| entry.filename.as_str()).collect();
    assert_eq!(names, ["report.pdf", "second.pdf"]);

    let answer = restarted
        .service
        .query("report.pdf", "still there?")
        .await
        .unwrap();
    assert_eq!(answer, "The total is 42.");
}

#[tokio::test]
async fn ten_byte_report_is_listed_and_answered_with_refusal() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());

    let outcome = h
        .service
        .upload("report.pdf", b"0123456789".to_vec())
        .await
        .expect("upload");
    assert_eq!(outcome.size, 10);

    let listing = h.service.list_documents().await.unwrap();
    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].filename, "report.pdf");
    assert_eq!(listing[0].size, 10);

    let answer = h
        .service
        .query("report.pdf", "What is the total?")
        .await
        .expect("answer");
    assert_eq!(answer, REFUSAL);
    assert_eq!(h.completer.prompt_count(), 0);

    let raw = h.contents.read(REGISTRY_PATH).await.unwrap().expect("registered");
    let parsed: Value = serde_json::from_slice(&raw).unwrap();
    assert_eq!(parsed["report.pdf"]["size"], 10);
}

#[tokio::test]
async fn registry_file_is_pretty_printed_json_keyed_by_filename() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());
    let bytes = minimal_pdf("registry contents");
    h.service.upload("report.pdf", bytes.clone()).await.unwrap();

    let raw = h
        .contents
        .read(REGISTRY_PATH)
        .await
        .unwrap()
        .expect("registry written");
    let text = String::from_utf8(raw).unwrap();
    assert!(text.contains('\n'), "registry should be pretty-printed");

    let parsed: Value = serde_json::from_str(&text).unwrap();
    let entry = &parsed["report.pdf"];
    assert_eq!(entry["filename"], "report.pdf");
    assert_eq!(entry["size"], bytes.len() as u64);
    let rfc3339 =
        Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$").unwrap();
    let upload_date = entry["upload_date"].as_str().expect("upload_date string");
    assert!(rfc3339.is_match(upload_date), "{upload_date}");
}

async fn send(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("router response");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn multipart_upload(filename: &str, content: &[u8]) -> Request<Body> {
    const BOUNDARY: &str = "pdfqa-lifecycle";
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/pdf\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/api/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn query_request(filename: &str, query: &str) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/query")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "query": query, "filename": filename }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn http_surface_drives_the_full_lifecycle() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());
    let app = create_router(h.service.clone());

    let (status, body) = send(
        &app,
        multipart_upload("My Report.pdf", &minimal_pdf("Revenue grew to 42")),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["document"]["filename"], "My_Report.pdf");

    let (status, body) = send(
        &app,
        Request::builder().uri("/api/pdfs").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["filename"], "My_Report.pdf");

    let (status, body) = send(&app, query_request("My_Report.pdf", "How much revenue?")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "The total is 42.");

    let (status, body) = send(&app, query_request("missing.pdf", "How much revenue?")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "PDF not indexed");

    let (status, body) = send(
        &app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/api/pdfs/My_Report.pdf")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = send(
        &app,
        Request::builder()
            .uri("/api/pdfs/My_Report.pdf")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, metrics) = send(
        &app,
        Request::builder().uri("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(metrics["documentsUploaded"], 1);
    assert_eq!(metrics["documentsDeleted"], 1);
    assert_eq!(metrics["queriesAnswered"], 1);
    assert_eq!(metrics["queriesFailed"], 1);
}

#[tokio::test]
async fn empty_index_refuses_without_calling_the_model() {
    let root = tempfile::tempdir().unwrap();
    let h = harness(root.path());
    let outcome = h
        .service
        .upload("blank.pdf", minimal_pdf(""))
        .await
        .expect("upload");
    assert_eq!(outcome.chunk_count, 0);

    let answer = h.service.query("blank.pdf", "anything?").await.unwrap();
    assert_eq!(answer, REFUSAL);
    assert_eq!(h.completer.prompt_count(), 0);
}
