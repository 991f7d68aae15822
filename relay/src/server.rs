//! HTTP front for the relay.
//!
//! Virtual-host routing on the first Host label: the reserved endpoints
//! are served locally, `/_websocket` upgrades into a tunnel session, and
//! everything else is forwarded through the tunnel owning the subdomain.

use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::extract::ws::{close_code, CloseFrame, Message as WsMessage, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::HOST;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use reqbouncer_shared::Error;

use crate::auth;
use crate::bus::TopicBus;
use crate::config::Config;
use crate::dispatch;
use crate::http;
use crate::registry::ClientRegistry;
use crate::session;

/// Catch-all requests may carry this header to pick a tunnel explicitly;
/// it is the only way a direct `localhost:<port>` request can target one.
pub const CLIENT_ID_HEADER: &str = "reqbouncer-client-id";

/// Bodies above this are rejected with 413 before reaching the tunnel.
pub const MAX_REQUEST_BODY: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    registry: ClientRegistry,
    bus: TopicBus,
    config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            registry: ClientRegistry::new(),
            bus: TopicBus::new(),
            config,
        }
    }
}

/// Build the relay router.
pub fn app(config: Config) -> Router {
    let debug = config.debug;
    let state = AppState::new(config);
    let mut router = Router::new()
        .route("/_health", get(health_handler))
        .route("/_config", get(config_handler))
        .route("/_websocket", get(websocket_handler));
    if debug {
        router = router.route("/debug/state", get(debug_state_handler));
    }
    router.fallback(forward_handler).with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let router = app(config);
    info!("reqbouncer relay on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn config_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"github_client_id": state.config.github_client_id}))
}

async fn debug_state_handler(State(state): State<AppState>) -> impl IntoResponse {
    let subdomains = state.registry.snapshot();
    Json(json!({"connected_clients": subdomains.len(), "subdomains": subdomains}))
}

/// Tunnel dial: auth gate, free-subdomain guard, then the upgrade.
async fn websocket_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let subdomain = effective_subdomain(&headers);

    let identity = match auth::authorize(
        &headers,
        &subdomain,
        &state.config.ci_test_token,
        &state.config.github_user_provider,
    )
    .await
    {
        Ok(identity) => identity,
        Err(err) => {
            warn!(%subdomain, error = %err, "rejected tunnel dial");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": err.to_string()})),
            )
                .into_response();
        }
    };

    if state.registry.has(&subdomain) {
        error!(%subdomain, "client already connected");
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": Error::SubdomainTaken.to_string()})),
        )
            .into_response();
    }

    ws.on_upgrade(move |mut socket| async move {
        // the free check above ran before the upgrade; a loser of a
        // concurrent dial is caught here by the registry itself
        let Some(mut guard) = state.registry.try_acquire(&subdomain) else {
            error!(%subdomain, "client already connected");
            let _ = socket
                .send(WsMessage::Close(Some(CloseFrame {
                    code: close_code::NORMAL,
                    reason: Error::SubdomainTaken.to_string().into(),
                })))
                .await;
            return;
        };

        // loopback dials have no routable Host label, so the session also
        // answers to its authenticated login
        if auth::is_loopback(&subdomain) {
            if let Some(user) = identity {
                let alias = user.login.to_ascii_lowercase();
                if !guard.add_alias(&alias) {
                    warn!(%alias, "login alias already owned, skipping");
                }
            }
        }

        session::run(socket, guard, state.bus.clone()).await;
    })
}

/// Catch-all: owned-subdomain guard, then the dispatcher.
async fn forward_handler(State(state): State<AppState>, req: Request<Body>) -> Response {
    let subdomain = effective_subdomain(req.headers());
    let host = req
        .headers()
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();

    let Some(canonical) = state.registry.resolve(&subdomain) else {
        error!(%subdomain, "no clients connected for subdomain");
        return (
            StatusCode::CONFLICT,
            Json(json!({"error": Error::NoClient(host).to_string()})),
        )
            .into_response();
    };

    let (parts, body) = req.into_parts();
    let body = match to_bytes(body, MAX_REQUEST_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => {
            warn!(%subdomain, "request body exceeds limit");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(json!({"error": Error::PayloadTooLarge.to_string()})),
            )
                .into_response();
        }
    };

    let raw = http::serialize_request(&parts, &body);

    match dispatch::forward(&state.bus, &canonical, raw).await {
        Ok(payload) => match http::parse_response(&payload) {
            Ok(response) => response,
            Err(err) => {
                error!(error = %err, "client sent an unparseable response");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": "bad response from tunnel client"})),
                )
                    .into_response()
            }
        },
        Err(Error::Timeout) => {
            warn!(%subdomain, "timed out waiting for tunnel response");
            (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({"error": Error::Timeout.to_string()})),
            )
                .into_response()
        }
        Err(err) => {
            error!(error = %err, "forwarding failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": err.to_string()})),
            )
                .into_response()
        }
    }
}

/// First dot-separated Host label, lower-cased; the client-id header
/// overrides it when present.
fn effective_subdomain(headers: &HeaderMap) -> String {
    if let Some(id) = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        if !id.is_empty() {
            return id.to_ascii_lowercase();
        }
    }
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    subdomain_of(host)
}

fn subdomain_of(host: &str) -> String {
    host.split('.').next().unwrap_or_default().to_ascii_lowercase()
}
