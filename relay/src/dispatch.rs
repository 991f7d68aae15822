//! Per-request forwarding through the tunnel.
//!
//! Each public request is tagged with a fresh correlation id and
//! published on the owning session's topic; the dispatcher waits on a
//! private topic named by that id for the single response frame. The
//! subscription is opened before the publish so a fast client cannot
//! answer into the void, and dropping it on any exit path is the only
//! cleanup required.

use std::time::Duration;

use tokio::time::timeout;
use tracing::debug;
use uuid::Uuid;

use reqbouncer_shared::error::{Error, Result};

use crate::bus::{Message, TopicBus};

/// Hard ceiling on waiting for a client's response.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

/// Ship one serialized request to the session owning `subdomain` and wait
/// for the matching response payload.
pub async fn forward(bus: &TopicBus, subdomain: &str, raw_request: Vec<u8>) -> Result<Vec<u8>> {
    let request_id = Uuid::new_v4().to_string();

    let mut responses = bus.subscribe(&request_id);

    debug!(message_id = %request_id, %subdomain, "publishing request");
    bus.publish(subdomain, Message::new(request_id.clone(), raw_request));

    match timeout(RESPONSE_TIMEOUT, responses.recv()).await {
        Ok(Some(msg)) => {
            debug!(message_id = %msg.id, "received response");
            msg.ack();
            Ok(msg.payload)
        }
        Ok(None) => Err(Error::Transport("response channel closed".to_string())),
        Err(_) => Err(Error::Timeout),
    }
}
