//! HTTP/1.x framing on top of a raw `TcpStream`
//!
//! Only what the echo server and the probe client need: request heads are
//! parsed with `httparse`, responses are written from `http` types, and the
//! client side can frame a response body by `Content-Length`, chunked
//! encoding, or connection close.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use http::header::{CONNECTION, CONTENT_LENGTH, HOST, TRANSFER_ENCODING};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Request, Response, StatusCode, Version};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const MAX_HEADERS: usize = 64;
const READ_CHUNK: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum HttpProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("HTTP parsing error: {0}")]
    HttpParse(String),
    #[error("Request head exceeds {0} bytes")]
    HeadTooLarge(usize),
    #[error("Incomplete message")]
    IncompleteMessage,
}

/// The parsed request line and headers of an inbound request
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Raw request target, query string included
    pub target: String,
    pub version: Version,
    pub headers: HeaderMap,
}

impl RequestHead {
    /// Value of the `Host` header, if present
    pub fn host(&self) -> Option<String> {
        self.headers
            .get(HOST)
            .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
    }

    /// Whether the connection may carry another request after this one
    pub fn keep_alive(&self) -> bool {
        let connection = self
            .headers
            .get(CONNECTION)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_ascii_lowercase());

        match self.version {
            Version::HTTP_11 => !matches!(connection.as_deref(), Some(v) if v.contains("close")),
            _ => matches!(connection.as_deref(), Some(v) if v.contains("keep-alive")),
        }
    }

    /// Whether the client announced a request body
    pub fn has_body(&self) -> bool {
        if self.headers.contains_key(TRANSFER_ENCODING) {
            return true;
        }
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .is_some_and(|len| len > 0)
    }
}

/// Parsed status line and headers of a response
#[derive(Debug, Clone)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

/// How the body following a response head is delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFraming {
    ContentLength(usize),
    Chunked,
    UntilClose,
}

impl ResponseHead {
    pub fn framing(&self) -> BodyFraming {
        let chunked = self
            .headers
            .get(TRANSFER_ENCODING)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.to_ascii_lowercase().contains("chunked"));
        if chunked {
            return BodyFraming::Chunked;
        }
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<usize>().ok())
            .map(BodyFraming::ContentLength)
            .unwrap_or(BodyFraming::UntilClose)
    }
}

fn collect_headers(parsed: &[httparse::Header<'_>]) -> Result<HeaderMap, HttpProtocolError> {
    let mut headers = HeaderMap::with_capacity(parsed.len());
    for header in parsed {
        let name = HeaderName::from_bytes(header.name.as_bytes())
            .map_err(|e| HttpProtocolError::HttpParse(format!("Invalid header name: {e}")))?;
        let value = HeaderValue::from_bytes(header.value)
            .map_err(|e| HttpProtocolError::HttpParse(format!("Invalid header value: {e}")))?;
        headers.append(name, value);
    }
    Ok(headers)
}

fn version_from(minor: Option<u8>) -> Version {
    match minor {
        Some(0) => Version::HTTP_10,
        _ => Version::HTTP_11,
    }
}

/// Attempts to parse a request head from the start of `buf`
///
/// Returns `Ok(None)` while the head is still incomplete, or the head
/// together with the number of bytes it occupied.
pub fn parse_request_head(
    buf: &[u8],
    max_header_bytes: usize,
) -> Result<Option<(RequestHead, usize)>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);

    match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            if len > max_header_bytes {
                return Err(HttpProtocolError::HeadTooLarge(max_header_bytes));
            }
            let method = Method::from_bytes(req.method.unwrap_or_default().as_bytes())
                .map_err(|e| HttpProtocolError::HttpParse(format!("Invalid method: {e}")))?;
            let head = RequestHead {
                method,
                target: req.path.unwrap_or("/").to_string(),
                version: version_from(req.version),
                headers: collect_headers(req.headers)?,
            };
            Ok(Some((head, len)))
        }
        Ok(httparse::Status::Partial) if buf.len() > max_header_bytes => {
            Err(HttpProtocolError::HeadTooLarge(max_header_bytes))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(httparse::Error::TooManyHeaders) => {
            Err(HttpProtocolError::HeadTooLarge(max_header_bytes))
        }
        Err(e) => Err(HttpProtocolError::HttpParse(format!(
            "Failed to parse request head: {e}"
        ))),
    }
}

/// Attempts to parse a response head from the start of `buf`
pub fn parse_response_head(
    buf: &[u8],
) -> Result<Option<(ResponseHead, usize)>, HttpProtocolError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut res = httparse::Response::new(&mut headers);

    match res.parse(buf) {
        Ok(httparse::Status::Complete(len)) => {
            let status = StatusCode::from_u16(res.code.unwrap_or_default())
                .map_err(|e| HttpProtocolError::HttpParse(format!("Invalid status code: {e}")))?;
            let head = ResponseHead {
                status,
                headers: collect_headers(res.headers)?,
            };
            Ok(Some((head, len)))
        }
        Ok(httparse::Status::Partial) => Ok(None),
        Err(e) => Err(HttpProtocolError::HttpParse(format!(
            "Failed to parse response head: {e}"
        ))),
    }
}

/// Decodes a chunked body
///
/// Returns `Ok(None)` until the terminating zero-size chunk has arrived.
/// Chunk extensions and trailers are ignored.
pub fn decode_chunked(buf: &[u8]) -> Result<Option<Vec<u8>>, HttpProtocolError> {
    let mut body = Vec::new();
    let mut pos = 0;

    loop {
        let Some(line_end) = find_crlf(&buf[pos..]) else {
            return Ok(None);
        };
        let line = std::str::from_utf8(&buf[pos..pos + line_end])
            .map_err(|_| HttpProtocolError::HttpParse("Non-ASCII chunk size".to_string()))?;
        let size_str = line.split(';').next().unwrap_or_default().trim();
        let size = usize::from_str_radix(size_str, 16)
            .map_err(|_| HttpProtocolError::HttpParse(format!("Invalid chunk size: {size_str:?}")))?;
        pos += line_end + 2;

        if size == 0 {
            return Ok(Some(body));
        }
        if buf.len() < pos + size + 2 {
            return Ok(None);
        }
        body.extend_from_slice(&buf[pos..pos + size]);
        pos += size + 2;
    }
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn put_headers(out: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers {
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"\r\n");
}

/// Serializes a response; `head_only` drops the body (HEAD requests)
pub fn encode_response(response: &Response<Bytes>, head_only: bool) -> BytesMut {
    let body = response.body();
    let mut out = BytesMut::with_capacity(256 + body.len());
    let status = response.status();
    out.put_slice(
        format!(
            "HTTP/1.1 {} {}\r\n",
            status.as_u16(),
            status.canonical_reason().unwrap_or("")
        )
        .as_bytes(),
    );
    put_headers(&mut out, response.headers());
    if !head_only {
        out.put_slice(body);
    }
    out
}

/// Serializes a body-less request in origin form
pub fn encode_request(request: &Request<()>) -> BytesMut {
    let mut out = BytesMut::with_capacity(256);
    let target = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    out.put_slice(format!("{} {} HTTP/1.1\r\n", request.method(), target).as_bytes());
    put_headers(&mut out, request.headers());
    out
}

/// TCP stream wrapper that buffers bytes between HTTP messages
pub struct HttpStream {
    inner: TcpStream,
    buffer: BytesMut,
}

impl HttpStream {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            inner: stream,
            buffer: BytesMut::with_capacity(READ_CHUNK),
        }
    }

    /// Whether bytes of a not yet parsed message are buffered
    pub fn has_buffered(&self) -> bool {
        !self.buffer.is_empty()
    }

    async fn fill(&mut self) -> Result<usize, HttpProtocolError> {
        self.buffer.reserve(READ_CHUNK);
        Ok(self.inner.read_buf(&mut self.buffer).await?)
    }

    /// Reads the next request head
    ///
    /// Returns `Ok(None)` when the peer closes the connection cleanly between
    /// requests. Any body bytes stay buffered and are never interpreted.
    pub async fn read_request(
        &mut self,
        max_header_bytes: usize,
    ) -> Result<Option<RequestHead>, HttpProtocolError> {
        loop {
            if !self.buffer.is_empty() {
                if let Some((head, len)) = parse_request_head(&self.buffer, max_header_bytes)? {
                    self.buffer.advance(len);
                    return Ok(Some(head));
                }
            }
            if self.fill().await? == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(HttpProtocolError::IncompleteMessage)
                };
            }
        }
    }

    /// Reads a complete response: head plus body framed per its headers
    pub async fn read_response(&mut self) -> Result<(ResponseHead, Bytes), HttpProtocolError> {
        let head = loop {
            if let Some((head, len)) = parse_response_head(&self.buffer)? {
                self.buffer.advance(len);
                break head;
            }
            if self.fill().await? == 0 {
                return Err(HttpProtocolError::IncompleteMessage);
            }
        };

        let body = match head.framing() {
            BodyFraming::ContentLength(len) => {
                while self.buffer.len() < len {
                    if self.fill().await? == 0 {
                        return Err(HttpProtocolError::IncompleteMessage);
                    }
                }
                self.buffer.split_to(len).freeze()
            }
            BodyFraming::Chunked => loop {
                if let Some(body) = decode_chunked(&self.buffer)? {
                    self.buffer.clear();
                    break Bytes::from(body);
                }
                if self.fill().await? == 0 {
                    return Err(HttpProtocolError::IncompleteMessage);
                }
            },
            BodyFraming::UntilClose => {
                while self.fill().await? != 0 {}
                self.buffer.split().freeze()
            }
        };

        Ok((head, body))
    }

    pub async fn write_all(&mut self, data: &[u8]) -> Result<(), HttpProtocolError> {
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), HttpProtocolError> {
        Ok(self.inner.shutdown().await?)
    }

    /// Discards inbound bytes until the peer closes or `limit` elapses
    ///
    /// Used after a final response when unread request bytes may remain, so
    /// closing the socket does not reset the connection before the peer has
    /// read the response.
    pub async fn linger(&mut self, limit: Duration) {
        let discard = async {
            loop {
                self.buffer.clear();
                match self.fill().await {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        };
        let _ = tokio::time::timeout(limit, discard).await;
    }
}
