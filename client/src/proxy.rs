//! Replay of forwarded requests against the local target.
//!
//! The relay ships each request as complete HTTP/1.1 bytes; they are
//! written verbatim to a fresh TCP connection and the response bytes are
//! collected until the message is complete: Content-Length satisfied,
//! terminal chunk seen, a bodiless status, or the target closing the
//! connection.

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use reqbouncer_shared::http::{content_length, find_header_end, is_chunked, parse_status_code};

pub async fn replay(target: &str, raw_request: &[u8]) -> Result<Vec<u8>> {
    let mut stream = TcpStream::connect(target)
        .await
        .with_context(|| format!("failed to connect to target {target}"))?;
    stream.write_all(raw_request).await?;

    let mut buf = Vec::new();
    let mut tmp = [0u8; 8192];
    loop {
        let n = stream.read(&mut tmp).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&tmp[..n]);
        if let Some(total) = expected_len(&buf) {
            if buf.len() >= total {
                buf.truncate(total);
                break;
            }
        }
    }

    if buf.is_empty() {
        bail!("target closed the connection without responding");
    }
    Ok(buf)
}

/// Total message size, once it can be known from the bytes read so far.
/// `None` keeps reading: headers still incomplete, terminal chunk not yet
/// seen, or the message is delimited by EOF.
fn expected_len(buf: &[u8]) -> Option<usize> {
    let header_end = find_header_end(buf)?;
    let body_start = header_end + 4;
    let head = &buf[..header_end];

    if let Some(len) = content_length(head) {
        return Some(body_start + len);
    }

    if is_chunked(head) {
        let body = &buf[body_start..];
        if body.starts_with(b"0\r\n\r\n") {
            return Some(body_start + 5);
        }
        let terminal = b"\r\n0\r\n\r\n";
        return body
            .windows(terminal.len())
            .rposition(|w| w == terminal)
            .map(|pos| body_start + pos + terminal.len());
    }

    let status_line = head.split(|b| *b == b'\r').next()?;
    match parse_status_code(status_line) {
        Some(204) | Some(304) => Some(body_start),
        _ => None,
    }
}
