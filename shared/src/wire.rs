//! Wire framing for the tunnel channel.
//!
//! Every data frame exchanged over the duplex socket is a single
//! length-prefixed `(id, payload)` pair: a 4-byte big-endian length of the
//! id, the id bytes (ASCII), then the payload as the remainder. The codec
//! is self-delimiting so frames survive transport fragmentation; the
//! payload is opaque to the codec.

use crate::error::{Error, Result};

/// Length of the id-size prefix in bytes.
const ID_LEN_PREFIX: usize = 4;

/// A correlation id plus an opaque payload.
///
/// Relay-to-client payloads are serialized HTTP requests; client-to-relay
/// payloads are raw HTTP response bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: String,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(id: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { id: id.into(), payload }
    }

    /// Serialize to the on-the-wire layout.
    pub fn encode(&self) -> Vec<u8> {
        let id = self.id.as_bytes();
        let mut buf = Vec::with_capacity(ID_LEN_PREFIX + id.len() + self.payload.len());
        buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
        buf.extend_from_slice(id);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse a frame back out of raw bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ID_LEN_PREFIX {
            return Err(Error::MalformedFrame(format!(
                "frame too short: {} bytes",
                bytes.len()
            )));
        }
        let mut prefix = [0u8; ID_LEN_PREFIX];
        prefix.copy_from_slice(&bytes[..ID_LEN_PREFIX]);
        let id_len = u32::from_be_bytes(prefix) as usize;

        let rest = &bytes[ID_LEN_PREFIX..];
        if id_len > rest.len() {
            return Err(Error::MalformedFrame(format!(
                "id length {} exceeds frame length {}",
                id_len,
                rest.len()
            )));
        }

        let id = std::str::from_utf8(&rest[..id_len])
            .map_err(|_| Error::MalformedFrame("id is not valid UTF-8".to_string()))?
            .to_string();
        Ok(Self { id, payload: rest[id_len..].to_vec() })
    }
}
