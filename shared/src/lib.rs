//! reqbouncer shared library
//!
//! Wire framing, error types, and raw-HTTP helpers used by both the
//! relay and the tunnel client.

use std::time::Duration;

pub mod error;
pub mod http;
pub mod wire;

pub use error::{Error, Result};
pub use wire::Frame;

/// How often a tunnel peer sends a keepalive ping.
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

/// A peer is considered gone when no frame of any kind arrived within
/// this window.
pub const HEARTBEAT_WINDOW: Duration = Duration::from_secs(15);

/// Normal-closure WebSocket code, sent when rejecting a duplicate client.
pub const CLOSE_NORMAL: u16 = 1000;
