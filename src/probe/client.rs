use super::report::ProbeError;
use crate::http::protocol::{HttpProtocolError, HttpStream, ResponseHead, encode_request};
use bytes::Bytes;
use http::header::{ACCEPT, CONNECTION, HOST, USER_AGENT};
use http::{HeaderValue, Request};
use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

const PROBE_USER_AGENT: &str = concat!("hostecho-probe/", env!("CARGO_PKG_VERSION"));

/// The part of the echo document the probe validates
#[derive(Debug, Deserialize)]
struct EchoReply {
    extracted_subdomain: Option<String>,
}

/// One-shot HTTP client that connects to an address but claims an arbitrary `Host`
///
/// Each call opens a fresh connection, sends a single `GET` and reads the
/// response to completion. The whole exchange (connect, write, read) shares
/// one deadline.
#[derive(Debug, Clone)]
pub struct EchoClient {
    request_timeout: Duration,
}

impl EchoClient {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }

    /// Sends `GET path` with `Host: host` to `addr`
    pub async fn get(
        &self,
        addr: SocketAddr,
        host: &str,
        path: &str,
    ) -> Result<(ResponseHead, Bytes), ProbeError> {
        let request = Request::get(path)
            .header(HOST, host)
            .header(USER_AGENT, PROBE_USER_AGENT)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(CONNECTION, HeaderValue::from_static("close"))
            .body(())
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let exchange = async {
            let stream = TcpStream::connect(addr).await?;
            let mut stream = HttpStream::new(stream);
            stream.write_all(&encode_request(&request)).await?;
            stream.read_response().await
        };

        match timeout(self.request_timeout, exchange).await {
            Ok(Ok((head, body))) => {
                debug!(%addr, host, status = %head.status, size = body.len(), "Received response");
                Ok((head, body))
            }
            Ok(Err(HttpProtocolError::Io(e))) => Err(ProbeError::Request(e.to_string())),
            Ok(Err(e)) => Err(ProbeError::Request(e.to_string())),
            Err(_) => Err(ProbeError::Timeout),
        }
    }

    /// Requests `path` as `host` and checks the echoed subdomain
    ///
    /// Returns the echoed subdomain when it equals `expected`. The response
    /// status is not inspected; only the body decides.
    pub async fn verify_subdomain(
        &self,
        addr: SocketAddr,
        host: &str,
        path: &str,
        expected: &str,
    ) -> Result<String, ProbeError> {
        let (_, body) = self.get(addr, host, path).await?;
        check_echo_body(&body, expected)
    }
}

/// Validates an echo document against the subdomain that was requested
pub fn check_echo_body(body: &[u8], expected: &str) -> Result<String, ProbeError> {
    let reply: EchoReply =
        serde_json::from_slice(body).map_err(|e| ProbeError::InvalidResponse(e.to_string()))?;

    match reply.extracted_subdomain {
        Some(actual) if actual == expected => Ok(actual),
        Some(actual) => Err(ProbeError::SubdomainMismatch {
            expected: expected.to_string(),
            actual,
        }),
        None => Err(ProbeError::SubdomainMismatch {
            expected: expected.to_string(),
            actual: "<missing>".to_string(),
        }),
    }
}
