//! Raw HTTP (de)serialization at the relay edge.
//!
//! Inbound requests are flattened to canonical HTTP/1.1 bytes before they
//! enter the tunnel. Tunnel clients answer with complete HTTP response
//! bytes; those are picked apart here and rebuilt as a response. Body
//! bytes pass through untouched, only the framing headers
//! (`Content-Length`, `Transfer-Encoding`) are recomputed by hyper.

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::Response;

use reqbouncer_shared::error::{Error, Result};
use reqbouncer_shared::http::{find_header_end, parse_status_code, split_header_kv};

/// Flatten request line, headers, and body into wire form.
pub fn serialize_request(parts: &Parts, body: &[u8]) -> Vec<u8> {
    let path = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    let mut buf = Vec::with_capacity(256 + body.len());
    buf.extend_from_slice(format!("{} {} HTTP/1.1\r\n", parts.method, path).as_bytes());
    for (name, value) in parts.headers.iter() {
        buf.extend_from_slice(name.as_str().as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);
    buf
}

/// Rebuild a response from the raw bytes a tunnel client produced.
pub fn parse_response(raw: &[u8]) -> Result<Response<Body>> {
    let header_end = find_header_end(raw)
        .ok_or_else(|| Error::MalformedFrame("response has no header terminator".to_string()))?;

    let head = &raw[..header_end];
    let mut lines = head
        .split(|b| *b == b'\r' || *b == b'\n')
        .filter(|line| !line.is_empty());

    let status_line = lines
        .next()
        .ok_or_else(|| Error::MalformedFrame("empty response head".to_string()))?;
    let status = parse_status_code(status_line)
        .ok_or_else(|| Error::MalformedFrame("unparseable status line".to_string()))?;

    let mut builder = Response::builder().status(status);
    let mut chunked = false;
    for line in lines {
        let Some((name, value)) = split_header_kv(line) else {
            continue;
        };
        // hyper re-frames the body; forwarding these would conflict
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
            continue;
        }
        builder = builder.header(name, value);
    }

    let mut body = raw[header_end + 4..].to_vec();
    if chunked {
        body = decode_chunked(&body)?;
    }

    builder
        .body(Body::from(body))
        .map_err(|err| Error::Transport(err.to_string()))
}

/// Undo `Transfer-Encoding: chunked` framing.
fn decode_chunked(raw: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(raw.len());
    let mut rest = raw;
    loop {
        let line_end = rest
            .windows(2)
            .position(|w| w == b"\r\n")
            .ok_or_else(|| Error::MalformedFrame("missing chunk-size line".to_string()))?;
        let size_line = std::str::from_utf8(&rest[..line_end])
            .map_err(|_| Error::MalformedFrame("chunk size is not UTF-8".to_string()))?;
        let size_str = size_line.split(';').next().unwrap_or(size_line).trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| Error::MalformedFrame(format!("bad chunk size '{size_str}'")))?;
        rest = &rest[line_end + 2..];
        if size == 0 {
            break;
        }
        if rest.len() < size + 2 {
            return Err(Error::MalformedFrame("truncated chunk".to_string()));
        }
        out.extend_from_slice(&rest[..size]);
        rest = &rest[size + 2..];
    }
    Ok(out)
}
