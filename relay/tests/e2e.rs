//! End-to-end tests: relay, tunnel client, and a local target wired
//! together over real sockets. Each test gets its own port range so the
//! suites can run in parallel.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use futures_util::{FutureExt, StreamExt};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use reqbouncer::{Client, Config as ClientConfig};
use reqbouncer_relay::auth::{GithubUser, GithubUserProvider};
use reqbouncer_relay::{serve, Config};

fn stub_user_provider(login: &str) -> GithubUserProvider {
    let login = login.to_string();
    Arc::new(move |_token| {
        let login = login.clone();
        async move { Ok(GithubUser { login }) }.boxed()
    })
}

async fn start_relay(port: u16, github_client_id: &str) {
    let config = Config {
        port,
        github_client_id: github_client_id.to_string(),
        github_user_provider: stub_user_provider("client1"),
        ci_test_token: String::new(),
        debug: false,
    };
    tokio::spawn(async move {
        serve(config).await.expect("relay failed");
    });
    wait_for_health(port).await;
}

async fn wait_for_health(port: u16) {
    let url = format!("http://localhost:{port}/_health");
    for _ in 0..50 {
        if let Ok(response) = reqwest::get(&url).await {
            if response.status().is_success() {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("relay on port {port} never became healthy");
}

async fn start_target(port: u16) {
    let app = Router::new()
        .route("/", get(|| async { "Hello, world!" }))
        .route("/echo", post(|body: String| async move { body }));
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .expect("failed to bind target");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("target failed");
    });
}

fn tunnel_client(target_port: u16, server_port: u16) -> Client {
    Client::new(ClientConfig {
        target: format!("localhost:{target_port}"),
        server: format!("localhost:{server_port}"),
        path: "/_websocket".to_string(),
        access_token: "secret".to_string(),
        secure: false,
    })
    .expect("failed to build client")
}

/// Spawn a tunnel client and wait until forwarded requests reach it.
async fn start_client(target_port: u16, server_port: u16) {
    let client = tunnel_client(target_port, server_port);
    tokio::spawn(async move {
        let _ = client.listen().await;
    });

    let url = format!("http://localhost:{server_port}/");
    for _ in 0..50 {
        if let Ok(response) = reqwest::get(&url).await {
            if response.status() != reqwest::StatusCode::CONFLICT {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("tunnel client never came up on port {server_port}");
}

#[tokio::test]
async fn test_forwarding_through_tunnel() {
    let (target_port, server_port) = (50000, 50001);
    start_relay(server_port, "").await;
    start_target(target_port).await;
    start_client(target_port, server_port).await;

    // GET through the tunnel
    let response = reqwest::get(format!("http://localhost:{server_port}/"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Hello, world!");

    // POST body echoed back
    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://localhost:{server_port}/echo"))
        .header("content-type", "text/plain")
        .body("Hello, world!")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Hello, world!");

    // explicit client id targets the same tunnel
    let response = client
        .get(format!("http://localhost:{server_port}/"))
        .header("reqbouncer-client-id", "client1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "Hello, world!");
}

#[tokio::test]
async fn test_duplicate_client_is_rejected() {
    let (target_port, server_port) = (50002, 50003);
    start_relay(server_port, "").await;
    start_target(target_port).await;
    start_client(target_port, server_port).await;

    let second = tunnel_client(target_port, server_port);
    let result = tokio::time::timeout(Duration::from_secs(15), second.listen()).await;
    let err = result
        .expect("second client did not terminate within 15s")
        .expect_err("second client should have been rejected");
    assert!(err.to_string().contains("409"), "unexpected error: {err}");
}

#[tokio::test]
async fn test_util_endpoints() {
    let server_port = 50005;
    start_relay(server_port, "client1").await;

    let response = reqwest::get(format!("http://localhost:{server_port}/_health"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    assert!(response.text().await.unwrap().contains("\"status\":\"ok\""));

    let response = reqwest::get(format!("http://localhost:{server_port}/_config"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["github_client_id"], "client1");

    let client_config = ClientConfig {
        target: "localhost:50004".to_string(),
        server: format!("localhost:{server_port}"),
        path: "/_websocket".to_string(),
        access_token: "secret".to_string(),
        secure: false,
    };
    let client_id = reqbouncer::auth::fetch_github_client_id(&client_config)
        .await
        .unwrap();
    assert_eq!(client_id, "client1");
}

#[tokio::test]
async fn test_no_client_conflict() {
    let server_port = 50007;
    start_relay(server_port, "").await;

    let response = reqwest::get(format!("http://localhost:{server_port}/"))
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::CONFLICT);
    let body = response.text().await.unwrap();
    assert!(body.contains(&format!("localhost:{server_port}")), "body: {body}");
}

#[tokio::test]
async fn test_oversize_body_is_rejected() {
    let (target_port, server_port) = (50008, 50009);
    start_relay(server_port, "").await;
    start_target(target_port).await;
    start_client(target_port, server_port).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://localhost:{server_port}/echo"))
        .body(vec![b'x'; 1024 * 1024 + 1])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_session_expires_without_heartbeat() {
    let server_port = 50013;
    start_relay(server_port, "").await;

    // dial the upgrade endpoint directly and then stay silent
    let mut request = format!("ws://localhost:{server_port}/_websocket")
        .into_client_request()
        .unwrap();
    request
        .headers_mut()
        .insert(AUTHORIZATION, "Bearer secret".parse().unwrap());
    let (mut socket, _) = tokio_tungstenite::connect_async(request)
        .await
        .expect("tunnel dial failed");

    // the subdomain is occupied while the silent session lives
    let duplicate = tunnel_client(50012, server_port);
    let err = duplicate
        .listen()
        .await
        .expect_err("duplicate dial should be rejected");
    assert!(err.to_string().contains("409"), "unexpected error: {err}");

    // a peer that never pings trips the 15s deadline
    let closed = tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            match socket.next().await {
                Some(Ok(WsMessage::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "relay never closed the silent session");

    // the registry entry goes with it: a replacement dial must succeed
    // within one heartbeat period of the close
    let mut acquired = false;
    for _ in 0..10 {
        let replacement = tunnel_client(50012, server_port);
        match tokio::time::timeout(Duration::from_secs(2), replacement.listen()).await {
            // still listening after 2s: the replacement holds the subdomain
            Err(_) => {
                acquired = true;
                break;
            }
            // rejected: the old entry lingers, retry
            Ok(_) => tokio::time::sleep(Duration::from_millis(200)).await,
        }
    }
    assert!(acquired, "subdomain was never released after the deadline expired");
}

#[tokio::test]
async fn test_unauthorized_dial() {
    let server_port = 50011;
    let config = Config {
        port: server_port,
        github_client_id: String::new(),
        github_user_provider: Arc::new(|_token| {
            async { Err(anyhow::anyhow!("bad credentials")) }.boxed()
        }),
        ci_test_token: String::new(),
        debug: false,
    };
    tokio::spawn(async move {
        serve(config).await.expect("relay failed");
    });
    wait_for_health(server_port).await;

    let client = tunnel_client(50010, server_port);
    let err = client.listen().await.expect_err("dial should be rejected");
    assert!(err.to_string().contains("401"), "unexpected error: {err}");
}
