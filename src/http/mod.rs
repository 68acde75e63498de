//! Host-echoing HTTP server
//!
//! Every request, whatever its method or path, is answered with a JSON
//! document describing the `Host` header it arrived with and the subdomain
//! label extracted from it.

pub mod config;
pub mod protocol;
pub mod response;
pub mod server;


pub use config::{ServerArgs, ServerConfig};
pub use protocol::{HttpProtocolError, HttpStream, RequestHead};
pub use response::{EchoResponse, UNKNOWN_HOST, extract_subdomain, handle_request};
pub use server::HostEchoServer;
