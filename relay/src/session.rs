//! Tunnel session lifecycle.
//!
//! One session per connected client. A single select loop multiplexes the
//! socket read side (response frames, heartbeats), the subdomain topic
//! (outbound requests), and the heartbeat deadline. Whatever path exits
//! the loop, dropping the registry guard and the subscription releases
//! the subdomain and stops delivery; buffered outbound frames go down
//! with the subscription.

use axum::extract::ws::{Message as WsMessage, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use reqbouncer_shared::{Frame, HEARTBEAT_WINDOW};

use crate::bus::{self, TopicBus};
use crate::registry::RegistryGuard;

pub(crate) async fn run(socket: WebSocket, guard: RegistryGuard, bus: TopicBus) {
    let subdomain = guard.subdomain().to_string();
    let mut requests = bus.subscribe(&subdomain);
    let (mut sink, mut stream) = socket.split();

    info!(%subdomain, "tunnel session established");

    let deadline = sleep(HEARTBEAT_WINDOW);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            msg = stream.next() => {
                match msg {
                    Some(Ok(WsMessage::Binary(data))) => {
                        deadline.as_mut().reset(Instant::now() + HEARTBEAT_WINDOW);
                        match Frame::decode(&data) {
                            Ok(frame) => {
                                debug!(message_id = %frame.id, "received response frame");
                                let topic = frame.id.clone();
                                bus.publish(&topic, bus::Message::new(frame.id, frame.payload));
                            }
                            // a bad frame does not tear the session down
                            Err(err) => error!(error = %err, "failed to decode frame"),
                        }
                    }
                    Some(Ok(WsMessage::Ping(data))) => {
                        deadline.as_mut().reset(Instant::now() + HEARTBEAT_WINDOW);
                        if sink.send(WsMessage::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(WsMessage::Pong(_))) => {
                        deadline.as_mut().reset(Instant::now() + HEARTBEAT_WINDOW);
                    }
                    Some(Ok(WsMessage::Close(_))) | None => break,
                    Some(Ok(_)) => error!("received non-binary message"),
                    Some(Err(err)) => {
                        warn!(error = %err, "socket read failed");
                        break;
                    }
                }
            }
            Some(msg) = requests.recv() => {
                let frame = Frame::new(msg.id.clone(), msg.payload.clone());
                debug!(message_id = %frame.id, "sending request frame");
                if sink.send(WsMessage::Binary(frame.encode())).await.is_err() {
                    error!(%subdomain, "failed to write frame");
                    break;
                }
                msg.ack();
            }
            () = &mut deadline => {
                info!(%subdomain, "heartbeat deadline expired");
                break;
            }
        }
    }

    info!(%subdomain, "tunnel session closed");
}
