//! reqbouncer tunnel client
//!
//! Dials a relay, claims a subdomain, and replays forwarded requests
//! against a local HTTP server.

pub mod auth;
pub mod config;
pub mod proxy;
pub mod tunnel;

pub use config::Config;
pub use tunnel::Client;
