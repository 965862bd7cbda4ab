use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use insight_report::{config::Config, routes, AppState};
use tokio_test::assert_ok;
use tower::ServiceExt;

const BOUNDARY: &str = "insight-report-test-boundary";

fn app() -> Router {
    let config = Config {
        sample_seed: Some(11),
        ..Config::default()
    };
    routes::app(Arc::new(AppState::new(config)))
}

/// Builds a multipart body from `(field, file_name, content)` parts.
fn multipart_body(parts: &[(&str, &str, &str)]) -> String {
    let mut body = String::new();
    for (field, file_name, content) in parts {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    body
}

fn upload(parts: &[(&str, &str, &str)]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/generate-report")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

const CSV: &str = "age,income,city,plan\n\
    34,52000,Lisbon,basic\n\
    41,61000,Porto,pro\n\
    29,,Lisbon,basic\n\
    52,87000,Faro,pro\n\
    38,58000,Porto,basic\n";

#[tokio::test]
async fn health_check_responds() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = assert_ok!(to_bytes(response.into_body(), usize::MAX).await);
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn missing_dataset_is_a_client_error() {
    let response = app()
        .oneshot(upload(&[("template", "t.html", "{{ title }}")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = assert_ok!(to_bytes(response.into_body(), usize::MAX).await);
    let json: serde_json::Value = assert_ok!(serde_json::from_slice(&body));
    assert_eq!(json["error"], "No dataset file provided");
}

#[tokio::test]
async fn dataset_upload_returns_html_attachment() {
    let response = app()
        .oneshot(upload(&[("dataset", "people.csv", CSV)]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let headers = response.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"data_insight_report.html\""
    );

    let body = assert_ok!(to_bytes(response.into_body(), usize::MAX).await);
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains("Dataset Analysis Report"));
    assert!(html.contains("data:image/png;base64,iVBORw0KGgo"));
}

#[tokio::test]
async fn uploaded_template_replaces_default() {
    let template = "{{ title }}: {{ shape[0] }} rows, {{ numeric_cols | join(\"+\") }}";
    let response = app()
        .oneshot(upload(&[
            ("dataset", "people.csv", CSV),
            ("template", "custom.html", template),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = assert_ok!(to_bytes(response.into_body(), usize::MAX).await);
    assert_eq!(&body[..], b"Dataset Analysis Report: 5 rows, age+income");
}

#[tokio::test]
async fn broken_template_is_rejected() {
    let response = app()
        .oneshot(upload(&[
            ("dataset", "people.csv", CSV),
            ("template", "broken.html", "{% if %}"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
