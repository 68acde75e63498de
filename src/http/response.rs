use super::protocol::RequestHead;
use crate::Result;
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};

/// Host value reported when the request carried no usable `Host` header
pub const UNKNOWN_HOST: &str = "unknown";

/// JSON document returned for every request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoResponse {
    pub received_host: String,
    pub extracted_subdomain: String,
    pub service_name: String,
    pub timestamp: String,
    pub path: String,
}

/// Returns everything before the first `.` of `host`
///
/// No validation against DNS label rules happens here; a host without any
/// dot (including `host:port` forms) is returned whole.
pub fn extract_subdomain(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

impl EchoResponse {
    /// Describes what the server observed for one request
    pub fn observe(host: Option<&str>, path: &str, service_name: &str) -> Self {
        let host = host.filter(|h| !h.is_empty()).unwrap_or(UNKNOWN_HOST);
        Self {
            received_host: host.to_string(),
            extracted_subdomain: extract_subdomain(host).to_string(),
            service_name: service_name.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            path: path.to_string(),
        }
    }

    /// Pretty-printed JSON body, two-space indented
    pub fn to_body(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec_pretty(self)?))
    }
}

/// Builds the response for one request
///
/// Stateless: the result depends only on the request head, the service name
/// and the wall clock.
pub fn handle_request(head: &RequestHead, service_name: &str) -> Result<Response<Bytes>> {
    let host = head.host();
    let echo = EchoResponse::observe(host.as_deref(), &head.target, service_name);
    Ok(json_response(StatusCode::OK, echo.to_body()?))
}

/// Response for requests the server could not parse
pub fn error_response(status: StatusCode) -> Response<Bytes> {
    let body = Bytes::from(status.canonical_reason().unwrap_or("Error").to_string());
    let len = body.len();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
    response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    response
}

fn json_response(status: StatusCode, body: Bytes) -> Response<Bytes> {
    let len = body.len();
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(len));
    response
}

/// Whether the body of a response to `method` must be omitted
pub fn is_head_only(method: &Method) -> bool {
    *method == Method::HEAD
}
