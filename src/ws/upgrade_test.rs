use super::*;
use crate::test_helpers::spawn_server;
use crate::ws::WsError;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue};

async fn echo_route(ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>) -> Response {
    upgrade(ws, |client| async move {
        while let Ok((kind, data)) = client.read().await {
            if client.write(kind, data).await.is_err() {
                break;
            }
        }
    })
}

async fn ticket_route(
    headers: axum::http::HeaderMap,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let ticket = headers
        .get("x-ticket")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none")
        .to_owned();
    upgrade(ws, move |client| async move {
        let _ = client.write_string(ticket).await;
        let _ = client.close().await;
    })
}

async fn refuse_route() -> (StatusCode, &'static str) {
    (StatusCode::UNAUTHORIZED, "ticket required")
}

fn app() -> Router {
    Router::new()
        .route("/echo", get(echo_route))
        .route("/ticket", get(ticket_route))
        .route("/refuse", get(refuse_route))
}

#[tokio::test]
async fn dialed_client_round_trips_through_upgraded_server() {
    let addr = spawn_server(app()).await;
    let client = WsClient::dial(&format!("ws://{addr}/echo"), &HeaderMap::new())
        .await
        .expect("dial should succeed");

    client.write_string("hello").await.unwrap();
    assert_eq!(client.read_string().await.unwrap(), "hello");

    client.write_json(&serde_json::json!({ "syscall": "board:join" })).await.unwrap();
    let echoed: serde_json::Value = client.read_json().await.unwrap();
    assert_eq!(echoed["syscall"], "board:join");

    client.close().await.unwrap();
    assert!(client.is_closed());
}

#[tokio::test]
async fn dial_forwards_headers_and_sees_server_close() {
    let addr = spawn_server(app()).await;
    let mut headers = HeaderMap::new();
    headers.insert("x-ticket", HeaderValue::from_static("t-123"));

    let client = WsClient::dial(&format!("ws://{addr}/ticket"), &headers)
        .await
        .expect("dial should succeed");

    assert_eq!(client.read_string().await.unwrap(), "t-123");
    assert!(matches!(client.read().await, Err(WsError::NormalClose)));
    assert!(client.is_closed());
}

#[tokio::test]
async fn plain_request_to_upgrade_route_gets_api_error() {
    let addr = spawn_server(app()).await;
    let response = reqwest::get(format!("http://{addr}/echo"))
        .await
        .expect("request should succeed");

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.expect("body should be json");
    assert_eq!(body, serde_json::json!({ "code": 999, "msg": "upgrade ws failed" }));
}

#[tokio::test]
async fn refused_upgrade_is_dial_error() {
    let addr = spawn_server(app()).await;
    let err = WsClient::dial(&format!("ws://{addr}/refuse"), &HeaderMap::new())
        .await
        .unwrap_err();

    assert!(matches!(err, WsError::Dial(_)), "{err:?}");
    assert!(err.to_string().contains("401"), "{err}");
}
