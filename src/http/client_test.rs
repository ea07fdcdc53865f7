use super::*;
use crate::test_helpers::spawn_server;
use axum::body::Body;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;

const BLOB_LEN: usize = 10 * 1024;
const CHUNKS: [&str; 4] = ["alpha-", "beta-", "gamma-", "delta"];

async fn missing_route() -> (StatusCode, &'static str) {
    (StatusCode::NOT_FOUND, r#"{"error":"not found"}"#)
}

async fn echo_route(Json(body): Json<Value>) -> Json<Value> {
    Json(json!({ "echo": body }))
}

async fn headers_route(headers: axum::http::HeaderMap) -> Json<Value> {
    let trace = headers.get("x-trace").and_then(|v| v.to_str().ok()).unwrap_or("");
    Json(json!({ "trace": trace }))
}

async fn chunked_route() -> Body {
    let chunks = CHUNKS.map(|chunk| Ok::<_, Infallible>(Bytes::from_static(chunk.as_bytes())));
    Body::from_stream(futures_util::stream::iter(chunks))
}

async fn big_error_route() -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, "e".repeat(10_000))
}

fn random_blob() -> Vec<u8> {
    let mut blob = vec![0u8; BLOB_LEN];
    rand::rng().fill(&mut blob[..]);
    blob
}

async fn serve(blob: Vec<u8>) -> String {
    let app = Router::new()
        .route("/missing", get(missing_route))
        .route("/blob", get(move || async move { blob }))
        .route("/echo", post(echo_route))
        .route("/headers", get(headers_route))
        .route("/chunked", get(chunked_route))
        .route("/text", get(|| async { "plain text" }))
        .route("/big-error", get(big_error_route));
    format!("http://{}", spawn_server(app).await)
}

fn client() -> HttpClient {
    HttpClient::new().expect("client should build")
}

// =============================================================================
// STREAMING
// =============================================================================

#[tokio::test]
async fn stream_non_success_returns_status_error_without_reader() {
    let base = serve(Vec::new()).await;
    let err = client()
        .stream_get(&format!("{base}/missing"), &HeaderMap::new())
        .await
        .unwrap_err();

    match &err {
        HttpError::Status { status, body } => {
            assert_eq!(*status, 404);
            assert_eq!(body, r#"{"error":"not found"}"#);
        }
        other => panic!("expected status error, got {other:?}"),
    }
    let text = err.to_string();
    assert!(text.contains("404"), "{text}");
    assert!(text.contains(r#"{"error":"not found"}"#), "{text}");
}

#[tokio::test]
async fn stream_read_all_returns_whole_body_then_closes() {
    let blob = random_blob();
    let base = serve(blob.clone()).await;

    let mut reader = client()
        .stream_get(&format!("{base}/blob"), &HeaderMap::new())
        .await
        .expect("stream should open");
    assert_eq!(reader.status(), reqwest::StatusCode::OK);

    let body = reader.read_all().await.expect("body should drain");
    assert_eq!(body.len(), BLOB_LEN);
    assert_eq!(body, blob);
    assert!(reader.close().is_ok());
}

#[tokio::test]
async fn small_buffer_reads_reassemble_chunked_body() {
    let base = serve(Vec::new()).await;
    let mut reader = client()
        .stream_get(&format!("{base}/chunked"), &HeaderMap::new())
        .await
        .expect("stream should open");

    let mut collected = Vec::new();
    let mut buf = [0u8; 7];
    loop {
        let n = reader.read(&mut buf).await.expect("read should succeed");
        if n == 0 {
            break;
        }
        assert!(n <= buf.len());
        collected.extend_from_slice(&buf[..n]);
    }
    assert_eq!(collected, CHUNKS.concat().as_bytes());
    assert_eq!(reader.read(&mut buf).await.unwrap(), 0);
    reader.close().unwrap();
}

#[tokio::test]
async fn read_all_after_partial_read_returns_the_rest() {
    let blob = random_blob();
    let base = serve(blob.clone()).await;
    let mut reader = client()
        .stream_get(&format!("{base}/blob"), &HeaderMap::new())
        .await
        .expect("stream should open");

    let mut head = [0u8; 3];
    let n = reader.read(&mut head).await.unwrap();
    assert!(n > 0);
    let rest = reader.read_all().await.unwrap();
    assert_eq!([&head[..n], &rest[..]].concat(), blob);
}

#[tokio::test]
async fn stream_post_to_get_route_is_status_error() {
    let base = serve(Vec::new()).await;
    let err = client()
        .stream_post(&format!("{base}/blob"), &HeaderMap::new(), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Status { status: 405, .. }), "{err:?}");
}

#[tokio::test]
async fn empty_buffer_read_returns_zero() {
    let base = serve(b"data".to_vec()).await;
    let mut reader = client()
        .stream_get(&format!("{base}/blob"), &HeaderMap::new())
        .await
        .unwrap();
    assert_eq!(reader.read(&mut []).await.unwrap(), 0);
    assert_eq!(reader.read_all().await.unwrap(), b"data");
}

// =============================================================================
// BUFFERED
// =============================================================================

#[tokio::test]
async fn post_decodes_json_object() {
    let base = serve(Vec::new()).await;
    let map = client()
        .post(&format!("{base}/echo"), &HeaderMap::new(), &json!({ "name": "board" }))
        .await
        .expect("post should succeed");
    assert_eq!(map["echo"]["name"], "board");
}

#[tokio::test]
async fn request_forwards_caller_headers() {
    let base = serve(Vec::new()).await;
    let mut headers = HeaderMap::new();
    headers.insert("x-trace", HeaderValue::from_static("abc"));

    let map = client().get(&format!("{base}/headers"), &headers).await.unwrap();
    assert_eq!(map["trace"], "abc");
}

#[tokio::test]
async fn request_as_decodes_typed_value() {
    #[derive(Deserialize)]
    struct Echo {
        echo: Vec<u32>,
    }

    let base = serve(Vec::new()).await;
    let echo: Echo = client()
        .request_as(Method::POST, &format!("{base}/echo"), &HeaderMap::new(), Some(&[1, 2, 3]))
        .await
        .unwrap();
    assert_eq!(echo.echo, vec![1, 2, 3]);
}

#[tokio::test]
async fn buffered_non_success_is_status_error() {
    let base = serve(Vec::new()).await;
    let err = client().get(&format!("{base}/missing"), &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, HttpError::Status { status: 404, .. }), "{err:?}");
}

#[tokio::test]
async fn non_json_body_is_decode_error() {
    let base = serve(Vec::new()).await;
    let err = client().get(&format!("{base}/text"), &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, HttpError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn long_error_body_is_truncated() {
    let base = serve(Vec::new()).await;
    let config = HttpConfig { error_body_limit: 16, ..HttpConfig::default() };
    let client = HttpClient::with_config(config).unwrap();

    let err = client
        .stream_get(&format!("{base}/big-error"), &HeaderMap::new())
        .await
        .unwrap_err();
    let HttpError::Status { status, body } = err else {
        panic!("expected status error");
    };
    assert_eq!(status, 500);
    assert_eq!(body, format!("{} [truncated]", "e".repeat(16)));
}

#[tokio::test]
async fn unreachable_host_is_request_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client().get(&format!("http://{addr}/"), &HeaderMap::new()).await.unwrap_err();
    assert!(matches!(err, HttpError::Request(_)), "{err:?}");
}

#[test]
fn truncate_body_keeps_short_bodies_intact() {
    assert_eq!(truncate_body(b"short", 16), "short");
    assert_eq!(truncate_body(b"exactly-16-bytes", 16), "exactly-16-bytes");
    assert_eq!(truncate_body(b"0123456789", 4), "0123 [truncated]");
}

#[test]
fn truncate_body_never_splits_a_character() {
    assert_eq!(truncate_body("héllo".as_bytes(), 2), "h [truncated]");
    assert_eq!(truncate_body("日本語".as_bytes(), 4), "日 [truncated]");
    assert_eq!(truncate_body("日本語".as_bytes(), 6), "日本 [truncated]");
    assert!(!truncate_body("€€€€".as_bytes(), 5).contains('\u{FFFD}'));
}

#[tokio::test]
async fn truncated_error_body_keeps_whole_characters() {
    async fn accented_error() -> (StatusCode, String) {
        (StatusCode::BAD_REQUEST, "é".repeat(100))
    }

    let app = Router::new().route("/accented", get(accented_error));
    let base = format!("http://{}", spawn_server(app).await);
    let config = HttpConfig { error_body_limit: 7, ..HttpConfig::default() };
    let client = HttpClient::with_config(config).unwrap();

    let err = client.get(&format!("{base}/accented"), &HeaderMap::new()).await.unwrap_err();
    let HttpError::Status { status, body } = err else {
        panic!("expected status error");
    };
    assert_eq!(status, 400);
    assert_eq!(body, format!("{} [truncated]", "é".repeat(3)));
}
