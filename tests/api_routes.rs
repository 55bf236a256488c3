use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use property_dashboard::api::{self, AppState};
use property_dashboard::config::Config;
use property_dashboard::db::Database;
use property_dashboard::settings::SettingsStore;

/// Router over a pool pointed at a closed port. Requests that pass validation
/// reach the database and fail with a 500 after a one second acquire timeout.
fn app(dir: &TempDir) -> Router {
    let config = Config::from_pairs(vec![
        (
            "DATABASE_URL".to_string(),
            "postgres://dashboard@127.0.0.1:1/none".to_string(),
        ),
        ("DB_ACQUIRE_TIMEOUT_SECS".to_string(), "1".to_string()),
    ])
    .unwrap();
    let db = Database::connect_lazy(&config).unwrap();
    let settings = SettingsStore::new(dir.path().join("settings.json"));
    api::router(AppState::new(db, settings))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(app(&dir), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn aging_rejects_unknown_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(app(&dir), get("/api/common-fee/aging?bucket=30-45")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("30-45"));
}

#[tokio::test]
async fn aging_rejects_unknown_sort_column() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _) = send(
        app(&dir),
        get("/api/common-fee/aging?sort_by=amount&sort_order=asc"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn aging_rejects_non_numeric_year() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(app(&dir), get("/api/common-fee/aging?year=last")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("year"));
}

#[tokio::test]
async fn aging_treats_blank_filters_as_unset() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(
        app(&dir),
        get("/api/common-fee/aging?site_id=&year=&limit=&offset="),
    )
    .await;
    // validation passed; the unreachable database is what fails
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn aging_accepts_over_360_bucket_in_both_encodings() {
    for uri in [
        "/api/common-fee/aging?bucket=360+",
        "/api/common-fee/aging?bucket=360%2B",
    ] {
        let dir = tempfile::tempdir().unwrap();
        let (status, _) = send(app(&dir), get(uri)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{}", uri);
    }
}

#[tokio::test]
async fn person_detail_requires_a_name() {
    let dir = tempfile::tempdir().unwrap();
    let (status, body) = send(app(&dir), get("/api/sales-2025/vp/%20%20")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (status, _) = send(app(&dir), get("/api/sales-2024/vp")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn settings_default_then_persist() {
    let dir = tempfile::tempdir().unwrap();

    let (status, body) = send(app(&dir), get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["menu_visibility"], serde_json::json!({}));

    let put = Request::builder()
        .method(Method::PUT)
        .uri("/api/settings")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"menu_visibility":{"sales-mkt":false}}"#))
        .unwrap();
    let (status, body) = send(app(&dir), put).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["menu_visibility"]["sales-mkt"], false);

    // a fresh router reads what the previous one saved
    let (status, body) = send(app(&dir), get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["menu_visibility"]["sales-mkt"], false);
}
