// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Minimal HTTP/1.1 framing for the embedded server.
//
// Only what the upload form and the artifact links need is implemented: one
// request per connection, `Content-Length` bodies (no chunked transfer
// encoding), and responses that always close the connection.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use kontrast_core::error::{KontrastError, Result};
use kontrast_core::human_errors::HumanError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Largest accepted request line plus headers.
const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Read granularity while waiting for the end of the headers.
const READ_CHUNK: usize = 8192;

/// Terminates the header block.
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Interim response for clients that wait before sending the body.
const CONTINUE_RESPONSE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A fully read HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    /// Request method, e.g. `GET`.
    pub method: String,
    /// Path component of the request target, without the query string.
    pub path: String,
    /// Header name/value pairs in arrival order.
    pub headers: Vec<(String, String)>,
    /// Request body (empty when there is no `Content-Length`).
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// Request line and headers, before the body has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl RequestHead {
    /// True if the client sent `Expect: 100-continue`.
    pub fn expects_continue(&self) -> bool {
        find_header(&self.headers, "expect")
            .is_some_and(|value| value.trim().eq_ignore_ascii_case("100-continue"))
    }

    /// Declared body length; absent means no body.
    pub fn content_length(&self) -> Result<usize> {
        match find_header(&self.headers, "content-length") {
            None => Ok(0),
            Some(value) => value.trim().parse::<usize>().map_err(|_| {
                KontrastError::MalformedRequest(format!("invalid Content-Length {value:?}"))
            }),
        }
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Find the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

/// Parse the request line and headers (everything before the blank line).
pub fn parse_head(head: &[u8]) -> Result<RequestHead> {
    let text = std::str::from_utf8(head)
        .map_err(|_| KontrastError::MalformedRequest("request head is not UTF-8".into()))?;
    let mut lines = text.split("\r\n");

    let request_line = lines
        .next()
        .filter(|line| !line.is_empty())
        .ok_or_else(|| KontrastError::MalformedRequest("empty request line".into()))?;
    let mut parts = request_line.split_whitespace();
    let (method, target, version) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) => (m, t, v),
        _ => {
            return Err(KontrastError::MalformedRequest(format!(
                "bad request line {request_line:?}"
            )));
        }
    };
    if !version.starts_with("HTTP/1.") {
        return Err(KontrastError::MalformedRequest(format!(
            "unsupported protocol {version}"
        )));
    }

    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut headers = Vec::new();
    for line in lines {
        if line.is_empty() {
            continue;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| {
            KontrastError::MalformedRequest(format!("bad header line {line:?}"))
        })?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(RequestHead {
        method: method.to_string(),
        path,
        headers,
    })
}

/// Read one request from `stream`.
///
/// Returns `Ok(None)` if the peer closed the connection before sending
/// anything. Bodies larger than `max_body` are refused before they are read.
/// A client waiting on `Expect: 100-continue` is sent the interim response
/// once its body has been accepted.
pub async fn read_request<S>(stream: &mut S, max_body: usize) -> Result<Option<HttpRequest>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    let header_end = loop {
        if let Some(pos) = find_subsequence(&buf, HEAD_TERMINATOR) {
            break pos;
        }
        if buf.len() > MAX_HEAD_BYTES {
            return Err(KontrastError::MalformedRequest("request head too large".into()));
        }
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(KontrastError::MalformedRequest(
                "connection closed inside request head".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = parse_head(&buf[..header_end])?;
    if find_header(&head.headers, "transfer-encoding").is_some() {
        return Err(KontrastError::MalformedRequest(
            "chunked request bodies are not supported".into(),
        ));
    }

    let content_length = head.content_length()?;
    if content_length > max_body {
        return Err(KontrastError::PayloadTooLarge { limit: max_body });
    }

    let body_start = header_end + HEAD_TERMINATOR.len();
    let mut body = buf.split_off(body_start);
    body.truncate(content_length);
    if body.len() < content_length {
        if head.expects_continue() {
            debug!(path = %head.path, "sending 100 Continue");
            stream.write_all(CONTINUE_RESPONSE).await?;
            stream.flush().await?;
        }
        let already = body.len();
        body.resize(content_length, 0);
        stream.read_exact(&mut body[already..]).await?;
    }

    debug!(
        method = %head.method,
        path = %head.path,
        body_bytes = body.len(),
        "HTTP request read"
    );

    Ok(Some(HttpRequest {
        method: head.method,
        path: head.path,
        headers: head.headers,
        body,
    }))
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// An HTTP response ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type: content_type.into(),
            body,
        }
    }

    /// `text/html` response.
    pub fn html(status: u16, page: String) -> Self {
        Self::new(status, "text/html; charset=utf-8", page.into_bytes())
    }

    /// JSON `{"error": "..."}` response for a client-facing error.
    pub fn error(human: &HumanError) -> Self {
        let body = serde_json::json!({ "error": human.message }).to_string();
        Self::new(human.status, "application/json", body.into_bytes())
    }

    /// Serialize status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = format!(
            "HTTP/1.1 {} {}\r\n\
             Content-Type: {}\r\n\
             Content-Length: {}\r\n\
             Connection: close\r\n\
             \r\n",
            self.status,
            reason_phrase(self.status),
            self.content_type,
            self.body.len()
        );
        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }
}

/// Standard reason phrase for the status codes this server emits.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        500 => "Internal Server Error",
        _ => "Unknown",
    }
}
