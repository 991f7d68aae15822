//! reqbouncer relay
//!
//! Public-facing half of the reverse tunnel. Accepts HTTP on virtual
//! hosts, hands each request over the tunnel to the client owning the
//! subdomain, and writes back whatever raw response the client produced.

pub mod auth;
pub mod bus;
pub mod config;
pub mod dispatch;
pub mod http;
pub mod registry;
pub mod server;
pub(crate) mod session;

pub use config::Config;
pub use server::serve;
