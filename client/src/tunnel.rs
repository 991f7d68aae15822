//! The tunnel client.
//!
//! Dials the relay, authenticates, then serves forwarded requests until
//! the session ends: each binary frame is replayed against the local
//! target in its own task and answered on the same correlation id. Pings
//! go out every 5 seconds; a silent relay trips the 15 second deadline.

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, Duration, Instant};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use reqbouncer_shared::{Frame, HEARTBEAT_WINDOW, PING_INTERVAL};

use crate::config::Config;
use crate::proxy;

/// Ceiling on a single replay against the local target.
const REPLAY_TIMEOUT: Duration = Duration::from_secs(60);

pub struct Client {
    config: Config,
}

impl Client {
    pub fn new(config: Config) -> Result<Self> {
        if config.target.is_empty() {
            bail!("target must not be empty");
        }
        if config.server.is_empty() {
            bail!("server must not be empty");
        }
        Ok(Self { config })
    }

    /// Connect to the relay and serve forwarded requests until the
    /// session ends. The returned error names why the tunnel closed.
    pub async fn listen(&self) -> Result<()> {
        let url = self.config.websocket_url();
        let mut request = url.as_str().into_client_request()?;
        let bearer = format!("Bearer {}", self.config.access_token);
        request
            .headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_str(&bearer)?);

        info!(server = %self.config.server, "connecting to relay");
        let (ws, _) = match connect_async(request).await {
            Ok(conn) => conn,
            Err(WsError::Http(response)) => {
                bail!("relay rejected the dial with status {}", response.status());
            }
            Err(err) => return Err(err).context("failed to connect to relay"),
        };
        info!(target = %self.config.target, "tunnel established");

        let (mut sink, mut stream) = ws.split();
        let (responses_tx, mut responses_rx) = mpsc::channel::<Message>(64);

        let mut ping = interval(PING_INTERVAL);
        let deadline = sleep(HEARTBEAT_WINDOW);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                msg = stream.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => {
                            deadline.as_mut().reset(Instant::now() + HEARTBEAT_WINDOW);
                            match Frame::decode(&data) {
                                Ok(frame) => self.spawn_replay(frame, responses_tx.clone()),
                                Err(err) => warn!(error = %err, "failed to decode frame"),
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            deadline.as_mut().reset(Instant::now() + HEARTBEAT_WINDOW);
                            sink.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            deadline.as_mut().reset(Instant::now() + HEARTBEAT_WINDOW);
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                            bail!("relay closed the tunnel: {reason}");
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => return Err(err).context("tunnel socket failed"),
                        None => bail!("tunnel socket closed"),
                    }
                }
                Some(out) = responses_rx.recv() => {
                    sink.send(out).await.context("failed to send response frame")?;
                }
                _ = ping.tick() => {
                    sink.send(Message::Ping(Vec::new())).await.context("failed to ping relay")?;
                }
                () = &mut deadline => {
                    bail!("no frame from relay within {HEARTBEAT_WINDOW:?}");
                }
            }
        }
    }

    fn spawn_replay(&self, frame: Frame, responses: mpsc::Sender<Message>) {
        let target = self.config.target.clone();
        tokio::spawn(async move {
            debug!(message_id = %frame.id, "replaying request");
            let payload = match timeout(REPLAY_TIMEOUT, proxy::replay(&target, &frame.payload)).await
            {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(err)) => {
                    warn!(message_id = %frame.id, error = %err, "replay failed");
                    error_response(502, "Bad Gateway")
                }
                Err(_) => {
                    warn!(message_id = %frame.id, "replay timed out");
                    error_response(504, "Gateway Timeout")
                }
            };
            let response = Frame::new(frame.id, payload);
            if responses.send(Message::Binary(response.encode())).await.is_err() {
                warn!("tunnel closed before response could be sent");
            }
        });
    }
}

/// Minimal raw response for replay failures, so the relay is not left
/// waiting out its own timeout.
fn error_response(status: u16, reason: &str) -> Vec<u8> {
    format!("HTTP/1.1 {status} {reason}\r\ncontent-length: 0\r\n\r\n").into_bytes()
}
