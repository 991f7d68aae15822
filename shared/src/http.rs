//! Byte-level helpers for delimiting raw HTTP messages.
//!
//! Both sides of the tunnel shuttle complete HTTP messages as opaque byte
//! buffers; these helpers find the header/body boundary and pick apart
//! status lines and header lines without pulling in a full parser.

/// Offset of the `\r\n\r\n` separator, if the headers are complete.
pub fn find_header_end(buf: &[u8]) -> Option<usize> {
    let pat = b"\r\n\r\n";
    buf.windows(4).position(|w| w == pat)
}

/// Status code from a `HTTP/1.1 200 OK` style line.
pub fn parse_status_code(line: &[u8]) -> Option<u16> {
    let s = std::str::from_utf8(line).ok()?;
    let mut parts = s.split_whitespace();
    parts.next()?;
    parts.next()?.parse::<u16>().ok()
}

/// Split a `Name: value` header line, trimming whitespace.
pub fn split_header_kv(line: &[u8]) -> Option<(&str, &str)> {
    let s = std::str::from_utf8(line).ok()?;
    let mut iter = s.splitn(2, ':');
    let k = iter.next()?.trim();
    let v = iter.next()?.trim();
    Some((k, v))
}

/// Scan the header block for `Content-Length`.
pub fn content_length(head: &[u8]) -> Option<usize> {
    for line in head.split(|b| *b == b'\n') {
        if let Some((k, v)) = split_header_kv(line.strip_suffix(b"\r").unwrap_or(line)) {
            if k.eq_ignore_ascii_case("content-length") {
                return v.parse::<usize>().ok();
            }
        }
    }
    None
}

/// True if the header block declares `Transfer-Encoding: chunked`.
pub fn is_chunked(head: &[u8]) -> bool {
    for line in head.split(|b| *b == b'\n') {
        if let Some((k, v)) = split_header_kv(line.strip_suffix(b"\r").unwrap_or(line)) {
            if k.eq_ignore_ascii_case("transfer-encoding")
                && v.to_ascii_lowercase().contains("chunked")
            {
                return true;
            }
        }
    }
    false
}
