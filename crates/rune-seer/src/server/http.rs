//! Minimal HTTP/1.1 request reader and response writer.
//!
//! Only what the service needs: a request line, headers, an optional
//! `Content-Length` body and `application/x-www-form-urlencoded` decoding.
//! Every response closes the connection.

use std::borrow::Cow;
use std::fmt;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use rune_seer_core::ratelimit::HeaderLookup;

/// Longest accepted request line or header line.
const MAX_LINE_BYTES: u64 = 8 * 1024;

/// Most headers accepted on one request.
const MAX_HEADERS: usize = 64;

/// Why a request could not be read.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The peer closed the connection before sending a request line.
    #[error("connection closed")]
    Closed,
    /// The request violates HTTP/1.1 framing.
    #[error("bad request: {0}")]
    BadRequest(&'static str),
    /// The declared body exceeds the configured limit.
    #[error("request body of {len} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge {
        /// Declared `Content-Length`.
        len: usize,
        /// Configured limit.
        limit: usize,
    },
    /// Socket failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HttpError {
    /// The response to send for this error, if the connection is still usable.
    pub fn response(&self) -> Option<Response> {
        match self {
            Self::Closed | Self::Io(_) => None,
            Self::BadRequest(reason) => Some(Response::text(Status::BadRequest, *reason)),
            Self::PayloadTooLarge { .. } => Some(Response::text(
                Status::PayloadTooLarge,
                "Request body too large",
            )),
        }
    }
}

/// Request line and headers, read before the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Head {
    /// Request method, as sent.
    pub method: String,
    /// Path component of the request target.
    pub path: String,
    /// Raw query string, without the `?`.
    pub query: String,
    /// Header fields in arrival order.
    pub headers: Vec<(String, String)>,
}

impl Head {
    /// Declared body length; zero when absent.
    fn content_length(&self) -> Result<usize, HttpError> {
        if self
            .header("transfer-encoding")
            .is_some_and(|te| !te.trim().eq_ignore_ascii_case("identity"))
        {
            return Err(HttpError::BadRequest("chunked request bodies are not supported"));
        }
        self.header("content-length").map_or(Ok(0), |len| {
            len.trim()
                .parse()
                .map_err(|_| HttpError::BadRequest("invalid Content-Length"))
        })
    }
}

impl HeaderLookup for Head {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_slice().header(name)
    }
}

/// A fully read request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Request line and headers.
    pub head: Head,
    /// Body bytes (empty without `Content-Length`).
    pub body: Vec<u8>,
}

impl Request {
    /// Query string parameters.
    pub fn query(&self) -> Form {
        Form::parse(self.head.query.as_bytes())
    }

    /// Form fields from an urlencoded body.
    pub fn form(&self) -> Form {
        Form::parse(&self.body)
    }
}

/// Read the request line and headers.
pub async fn read_head<R>(reader: &mut R) -> Result<Head, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let request_line = loop {
        match read_line(reader).await? {
            None => return Err(HttpError::Closed),
            // tolerate stray CRLF between requests
            Some(line) if line.is_empty() => {}
            Some(line) => break line,
        }
    };

    let mut parts = request_line.split_ascii_whitespace();
    let (Some(method), Some(target), Some(version), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(HttpError::BadRequest("malformed request line"));
    };
    if !version.starts_with("HTTP/1.") {
        return Err(HttpError::BadRequest("unsupported HTTP version"));
    }

    let (path, query) = split_target(target)?;

    let mut headers = Vec::new();
    loop {
        let line = read_line(reader)
            .await?
            .ok_or(HttpError::BadRequest("headers ended early"))?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            return Err(HttpError::BadRequest("too many headers"));
        }
        let (name, value) = line
            .split_once(':')
            .ok_or(HttpError::BadRequest("malformed header"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(Head {
        method: method.to_string(),
        path,
        query,
        headers,
    })
}

/// Read the body announced by `head`, enforcing `limit`.
pub async fn read_body<R>(
    reader: &mut R,
    head: &Head,
    limit: Option<usize>,
) -> Result<Vec<u8>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let len = head.content_length()?;
    if let Some(limit) = limit
        && len > limit
    {
        return Err(HttpError::PayloadTooLarge { len, limit });
    }
    // grow with the bytes that actually arrive, not the declared length
    let mut body = Vec::new();
    (&mut *reader)
        .take(u64::try_from(len).unwrap_or(u64::MAX))
        .read_to_end(&mut body)
        .await?;
    if body.len() < len {
        return Err(HttpError::BadRequest("unexpected end of request"));
    }
    Ok(body)
}

/// One CRLF- or LF-terminated line, without the terminator.
///
/// `None` on a clean EOF before any byte.
async fn read_line<R>(reader: &mut R) -> Result<Option<String>, HttpError>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }
    if buf.last() != Some(&b'\n') {
        return Err(if buf.len() as u64 > MAX_LINE_BYTES {
            HttpError::BadRequest("line too long")
        } else {
            HttpError::BadRequest("unexpected end of request")
        });
    }
    buf.pop();
    if buf.last() == Some(&b'\r') {
        buf.pop();
    }
    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| HttpError::BadRequest("request head is not valid UTF-8"))
}

fn split_target(target: &str) -> Result<(String, String), HttpError> {
    // absolute-form: http://host/path?query
    let target = match target.split_once("://") {
        Some((_, rest)) => rest.find('/').map_or("/", |i| &rest[i..]),
        None => target,
    };
    if !target.starts_with('/') {
        return Err(HttpError::BadRequest("request target must be a path"));
    }
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    let path = String::from_utf8(percent_decode(path.as_bytes(), false))
        .map_err(|_| HttpError::BadRequest("path is not valid UTF-8"))?;
    Ok((path, query.to_string()))
}

/// Decode `%XX` escapes; with `plus_as_space`, also `+`.
///
/// Malformed escapes are kept literally.
pub fn percent_decode(input: &[u8], plus_as_space: bool) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        match input[i] {
            b'%' if i + 2 < input.len() => {
                match (hex_value(input[i + 1]), hex_value(input[i + 2])) {
                    (Some(hi), Some(lo)) => {
                        out.push(hi << 4 | lo);
                        i += 3;
                        continue;
                    }
                    _ => out.push(b'%'),
                }
            }
            b'+' if plus_as_space => out.push(b' '),
            b => out.push(b),
        }
        i += 1;
    }
    out
}

const fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decoded `application/x-www-form-urlencoded` pairs.
///
/// Values stay as raw bytes; a field may carry malformed UTF-8.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Form {
    fields: Vec<(String, Vec<u8>)>,
}

impl Form {
    /// Parse an urlencoded byte string.
    pub fn parse(input: &[u8]) -> Self {
        let fields = input
            .split(|&b| b == b'&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (name, value) = match pair.iter().position(|&b| b == b'=') {
                    Some(i) => (&pair[..i], &pair[i + 1..]),
                    None => (pair, &[][..]),
                };
                (
                    String::from_utf8_lossy(&percent_decode(name, true)).into_owned(),
                    percent_decode(value, true),
                )
            })
            .collect();
        Self { fields }
    }

    /// Raw bytes of the first field named `name`.
    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_slice())
    }

    /// First field named `name`, decoded lossily.
    pub fn get_str(&self, name: &str) -> Option<Cow<'_, str>> {
        self.get(name).map(String::from_utf8_lossy)
    }
}

/// Response status codes the service emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// 200
    Ok,
    /// 400
    BadRequest,
    /// 404
    NotFound,
    /// 405
    MethodNotAllowed,
    /// 413
    PayloadTooLarge,
    /// 429
    TooManyRequests,
}

impl Status {
    /// Numeric status code.
    pub const fn code(self) -> u16 {
        match self {
            Self::Ok => 200,
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::MethodNotAllowed => 405,
            Self::PayloadTooLarge => 413,
            Self::TooManyRequests => 429,
        }
    }

    /// Canonical reason phrase.
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::BadRequest => "Bad Request",
            Self::NotFound => "Not Found",
            Self::MethodNotAllowed => "Method Not Allowed",
            Self::PayloadTooLarge => "Payload Too Large",
            Self::TooManyRequests => "Too Many Requests",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code(), self.reason())
    }
}

/// A complete response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status line code.
    pub status: Status,
    /// `Content-Type` header value.
    pub content_type: &'static str,
    /// `Allow` header, sent with 405.
    pub allow: Option<&'static str>,
    /// Body text.
    pub body: String,
    /// Send headers only; `Content-Length` still describes `body`.
    pub omit_body: bool,
}

impl Response {
    /// `200 OK` with an HTML body.
    pub fn html(body: String) -> Self {
        Self {
            status: Status::Ok,
            content_type: "text/html; charset=utf-8",
            allow: None,
            body,
            omit_body: false,
        }
    }

    /// Plain-text response.
    pub fn text(status: Status, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: "text/plain; charset=utf-8",
            allow: None,
            body: body.into(),
            omit_body: false,
        }
    }

    /// `405` listing the permitted methods.
    pub fn method_not_allowed(allow: &'static str) -> Self {
        Self {
            allow: Some(allow),
            ..Self::text(Status::MethodNotAllowed, "Method not allowed")
        }
    }

    /// The reply to a `HEAD` request: same headers, no body.
    #[must_use]
    pub fn for_head(self) -> Self {
        Self {
            omit_body: true,
            ..self
        }
    }

    /// Serialized status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status,
            self.content_type,
            self.body.len()
        );
        if let Some(allow) = self.allow {
            head.push_str("Allow: ");
            head.push_str(allow);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");
        let mut bytes = head.into_bytes();
        if !self.omit_body {
            bytes.extend_from_slice(self.body.as_bytes());
        }
        bytes
    }

    /// Write the response and flush.
    pub async fn write_to<W>(&self, writer: &mut W) -> std::io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}
