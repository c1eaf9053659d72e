//! Minimal HTTP/1.1 message framing.
//!
//! Reads message heads and bodies while keeping the exact bytes received:
//! `Head::raw` and the body buffers are what goes into the archive and what
//! gets relayed, so nothing is re-serialized. Chunked bodies are returned
//! with their chunk framing intact.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error_handling::types::ProxyError;

/// Upper bound on any single body, chunk, or chunked-body total the proxy
/// will buffer. Wire-supplied sizes are untrusted: anything above this is
/// rejected before a byte is allocated.
pub const MAX_FRAMED_LEN: u64 = 1 << 30;

/// A parsed request or status head plus its verbatim wire bytes.
#[derive(Debug, Clone)]
pub struct Head {
    /// The head exactly as received, up to and including the blank line.
    pub raw: Vec<u8>,
    /// Request line or status line, without the trailing CRLF.
    pub start_line: String,
    pub headers: Vec<(String, String)>,
}

impl Head {
    /// First value of a header, matched case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_chunked(&self) -> bool {
        self.header("transfer-encoding")
            .map(|v| v.to_ascii_lowercase().contains("chunked"))
            .unwrap_or(false)
    }

    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    pub fn connection_close(&self) -> bool {
        self.header("connection")
            .map(|v| v.eq_ignore_ascii_case("close"))
            .unwrap_or(false)
    }
}

/// Reads a message head up to the blank line.
///
/// Returns `Ok(None)` on a clean EOF before any bytes (connection closed
/// between requests); EOF mid-head is `ProxyError::Truncated`.
pub async fn read_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<Head>, ProxyError> {
    let mut raw = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            if raw.is_empty() {
                return Ok(None);
            }
            return Err(ProxyError::Truncated);
        }
        raw.extend_from_slice(&line);
        if line == b"\r\n" || line == b"\n" {
            break;
        }
    }

    let text = String::from_utf8_lossy(&raw);
    let mut lines = text.lines();
    let start_line = lines
        .next()
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ProxyError::BadRequest("empty start line".to_string()))?
        .to_string();
    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        match line.split_once(':') {
            Some((name, value)) => headers.push((name.trim().to_string(), value.trim().to_string())),
            None => return Err(ProxyError::BadRequest(format!("bad header line {:?}", line))),
        }
    }
    Ok(Some(Head {
        raw,
        start_line,
        headers,
    }))
}

/// Reads a message body according to the head's framing, returning the raw
/// on-wire bytes (chunk framing included for chunked bodies).
///
/// `eof_delimits` applies to responses: with no explicit framing the body
/// runs until the origin closes the connection. Requests without framing
/// have no body.
pub async fn read_body<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    head: &Head,
    eof_delimits: bool,
) -> Result<Vec<u8>, ProxyError> {
    if head.is_chunked() {
        return read_chunked(reader).await;
    }
    if let Some(length) = head.content_length() {
        if length > MAX_FRAMED_LEN {
            return Err(ProxyError::BadRequest(format!(
                "content-length {} over the {} byte limit",
                length, MAX_FRAMED_LEN
            )));
        }
        return read_exact_len(reader, length).await;
    }
    if eof_delimits {
        let mut body = Vec::new();
        reader.read_to_end(&mut body).await?;
        return Ok(body);
    }
    Ok(Vec::new())
}

async fn read_chunked<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProxyError> {
    let mut raw = Vec::new();
    let mut line = Vec::new();
    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            return Err(ProxyError::Truncated);
        }
        raw.extend_from_slice(&line);

        let size_text = String::from_utf8_lossy(&line);
        let size_text = size_text.trim();
        let size_text = size_text.split(';').next().unwrap_or("");
        let size = u64::from_str_radix(size_text, 16)
            .map_err(|_| ProxyError::BadRequest(format!("bad chunk size {:?}", size_text)))?;
        if size > MAX_FRAMED_LEN || raw.len() as u64 + size > MAX_FRAMED_LEN {
            return Err(ProxyError::BadRequest(format!(
                "chunked body over the {} byte limit",
                MAX_FRAMED_LEN
            )));
        }

        if size == 0 {
            // Trailer section, terminated by a blank line.
            loop {
                line.clear();
                let n = reader.read_until(b'\n', &mut line).await?;
                if n == 0 {
                    return Err(ProxyError::Truncated);
                }
                raw.extend_from_slice(&line);
                if line == b"\r\n" || line == b"\n" {
                    return Ok(raw);
                }
            }
        }

        // Chunk data plus its trailing CRLF. The cap above keeps size + 2
        // far from overflow.
        let chunk = read_exact_len(reader, size + 2).await?;
        raw.extend_from_slice(&chunk);
    }
}

/// Reads exactly `len` bytes without pre-allocating `len` up front, so a
/// large declared size costs nothing until the bytes actually arrive.
async fn read_exact_len<R: AsyncBufRead + Unpin>(
    reader: &mut R,
    len: u64,
) -> Result<Vec<u8>, ProxyError> {
    let mut body = Vec::new();
    let n = reader.take(len).read_to_end(&mut body).await?;
    if (n as u64) < len {
        return Err(ProxyError::Truncated);
    }
    Ok(body)
}

/// Where a proxied request should be sent, and how to archive it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// Authority as addressed by the client, e.g. `example.com:8080`.
    pub authority: String,
    pub host: String,
    pub port: u16,
    /// Origin-form target to use on the upstream request line.
    pub origin_form: String,
    /// Absolute URI recorded as `WARC-Target-URI`.
    pub uri: String,
}

/// Resolves a request-line target (absolute-form from a proxy client, or
/// origin-form plus `Host` header) to an upstream address and archive URI.
pub fn parse_target(target: &str, host_header: Option<&str>) -> Result<RequestTarget, ProxyError> {
    let (authority, origin_form, uri) = if let Some(rest) = target.strip_prefix("http://") {
        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        (authority.to_string(), path.to_string(), target.to_string())
    } else if target.starts_with('/') {
        let host = host_header
            .ok_or_else(|| ProxyError::BadRequest("origin-form target without Host".to_string()))?;
        (
            host.to_string(),
            target.to_string(),
            format!("http://{}{}", host, target),
        )
    } else {
        return Err(ProxyError::BadRequest(format!(
            "unsupported request target {:?}",
            target
        )));
    };

    if authority.is_empty() {
        return Err(ProxyError::BadRequest(format!("empty authority in {:?}", target)));
    }
    let (host, port) = split_authority(&authority)?;
    Ok(RequestTarget {
        authority,
        host,
        port,
        origin_form,
        uri,
    })
}

/// Splits an authority into connectable host and port. IPv6 literals arrive
/// bracketed (`[::1]:8080`); the brackets wrap the host only and must not
/// survive into it, and the colons inside them are not port separators.
fn split_authority(authority: &str) -> Result<(String, u16), ProxyError> {
    if let Some(rest) = authority.strip_prefix('[') {
        let end = rest.find(']').ok_or_else(|| {
            ProxyError::BadRequest(format!("unclosed IPv6 literal in {:?}", authority))
        })?;
        let host = rest[..end].to_string();
        let port = match &rest[end + 1..] {
            "" => 80,
            p => p.strip_prefix(':').and_then(|p| p.parse().ok()).ok_or_else(|| {
                ProxyError::BadRequest(format!("bad port in {:?}", authority))
            })?,
        };
        return Ok((host, port));
    }
    match authority.rsplit_once(':') {
        Some((h, p)) => Ok((
            h.to_string(),
            p.parse()
                .map_err(|_| ProxyError::BadRequest(format!("bad port in {:?}", authority)))?,
        )),
        None => Ok((authority.to_string(), 80)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn head_keeps_exact_bytes() {
        let wire = b"GET / HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\nrest";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        assert_eq!(head.start_line, "GET / HTTP/1.1");
        assert_eq!(head.header("host"), Some("example.com"));
        assert_eq!(
            head.raw,
            b"GET / HTTP/1.1\r\nHost: example.com\r\nAccept: */*\r\n\r\n"
        );
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"rest");
    }

    #[tokio::test]
    async fn eof_between_messages_is_clean() {
        let mut reader = BufReader::new(&b""[..]);
        assert!(read_head(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn eof_mid_head_is_truncation() {
        let mut reader = BufReader::new(&b"GET / HTTP/1.1\r\nHost: e"[..]);
        assert!(matches!(
            read_head(&mut reader).await,
            Err(ProxyError::Truncated)
        ));
    }

    #[tokio::test]
    async fn content_length_body_is_read_exactly() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhellotrailing";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        let body = read_body(&mut reader, &head, true).await.unwrap();
        assert_eq!(body, b"hello");
    }

    #[tokio::test]
    async fn chunked_body_keeps_framing() {
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        let body = read_body(&mut reader, &head, true).await.unwrap();
        assert_eq!(body, b"5\r\nhello\r\n0\r\n\r\n");
    }

    #[tokio::test]
    async fn close_delimited_response_reads_to_eof() {
        let wire = b"HTTP/1.1 200 OK\r\nConnection: close\r\n\r\nuntil the end";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        assert!(head.connection_close());
        let body = read_body(&mut reader, &head, true).await.unwrap();
        assert_eq!(body, b"until the end");
    }

    #[tokio::test]
    async fn unframed_request_has_no_body() {
        let wire = b"GET / HTTP/1.1\r\nHost: e\r\n\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        let body = read_body(&mut reader, &head, false).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn huge_chunk_size_is_rejected_not_allocated() {
        // A chunk-size line of u64::MAX used to overflow the size + 2
        // arithmetic; it must come back as a bad request.
        let wire = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nffffffffffffffff\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        assert!(matches!(
            read_body(&mut reader, &head, true).await,
            Err(ProxyError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn oversized_content_length_is_rejected_before_allocation() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 10000000000\r\n\r\n";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        assert!(matches!(
            read_body(&mut reader, &head, true).await,
            Err(ProxyError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn short_content_length_body_is_truncation() {
        let wire = b"HTTP/1.1 200 OK\r\nContent-Length: 50\r\n\r\nonly this";
        let mut reader = BufReader::new(&wire[..]);
        let head = read_head(&mut reader).await.unwrap().unwrap();
        assert!(matches!(
            read_body(&mut reader, &head, true).await,
            Err(ProxyError::Truncated)
        ));
    }

    #[test]
    fn absolute_form_target() {
        let t = parse_target("http://example.com/a/b?q=1", None).unwrap();
        assert_eq!(t.authority, "example.com");
        assert_eq!((t.host.as_str(), t.port), ("example.com", 80));
        assert_eq!(t.origin_form, "/a/b?q=1");
        assert_eq!(t.uri, "http://example.com/a/b?q=1");
    }

    #[test]
    fn absolute_form_with_port_and_bare_authority() {
        let t = parse_target("http://example.com:8081", None).unwrap();
        assert_eq!((t.host.as_str(), t.port), ("example.com", 8081));
        assert_eq!(t.origin_form, "/");
    }

    #[test]
    fn ipv6_literal_authorities_keep_colons_and_lose_brackets() {
        let t = parse_target("http://[::1]:8080/x", None).unwrap();
        assert_eq!(t.authority, "[::1]:8080");
        assert_eq!((t.host.as_str(), t.port), ("::1", 8080));
        assert_eq!(t.uri, "http://[::1]:8080/x");

        let t = parse_target("http://[2001:db8::2]/", None).unwrap();
        assert_eq!((t.host.as_str(), t.port), ("2001:db8::2", 80));

        assert!(parse_target("http://[::1/", None).is_err());
        assert!(parse_target("http://[::1]junk/", None).is_err());
    }

    #[test]
    fn origin_form_needs_host_header() {
        let t = parse_target("/index.html", Some("example.com")).unwrap();
        assert_eq!(t.uri, "http://example.com/index.html");
        assert!(parse_target("/index.html", None).is_err());
    }
}
