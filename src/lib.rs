use crate::http::protocol::HttpProtocolError;
use thiserror::Error;

/// Error types for the hostecho library
#[derive(Error, Debug)]
pub enum EchoError {
    /// Socket errors (bind, accept, connect, read, write)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Timeout errors
    #[error("Timeout error: {0}")]
    Timeout(String),

    /// HTTP framing errors
    #[error("HTTP protocol error: {0}")]
    Protocol(String),

    /// JSON encoding/decoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<HttpProtocolError> for EchoError {
    fn from(err: HttpProtocolError) -> Self {
        match err {
            HttpProtocolError::Io(e) => EchoError::Io(e),
            other => EchoError::Protocol(other.to_string()),
        }
    }
}

/// Result type for the hostecho library
pub type Result<T> = std::result::Result<T, EchoError>;

pub mod common;
pub mod http;
pub mod probe;

// Re-export main types for convenience
pub use crate::common::EchoServerTrait;
pub use crate::http::{EchoResponse, HostEchoServer, ServerConfig, extract_subdomain};
pub use crate::probe::{ProbeConfig, ProbeRunner, Resolver, RunReport, StaticResolver, SystemResolver};
