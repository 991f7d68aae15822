//! Error types for reqbouncer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing Authorization header")]
    MissingAuth,

    #[error("malformed Authorization header")]
    MalformedAuth,

    #[error("invalid token")]
    InvalidToken,

    #[error("user not allowed to access this subdomain")]
    NotAllowed,

    #[error("client already connected")]
    SubdomainTaken,

    #[error("no clients connected for host'{0}'")]
    NoClient(String),

    #[error("request body too large")]
    PayloadTooLarge,

    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    #[error("timed out waiting for tunnel response")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
