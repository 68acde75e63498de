use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen port for the echo server
pub const DEFAULT_PORT: u16 = 3000;
/// Default service name echoed back in every response
pub const DEFAULT_SERVICE_NAME: &str = "test-server";

/// Configuration for the Host-echoing HTTP server
///
/// # Examples
///
/// ```rust
/// use hostecho::http::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig {
///     bind_addr: "127.0.0.1:3000".parse().unwrap(),
///     service_name: "tenants".to_string(),
///     read_timeout: Duration::from_secs(10),
///     ..ServerConfig::default()
/// };
/// assert_eq!(config.max_connections, 1000);
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Network address to bind to
    pub bind_addr: SocketAddr,
    /// Value reported as `service_name` in every response
    pub service_name: String,
    /// Maximum number of concurrent connections
    pub max_connections: usize,
    /// How long a connection may sit idle waiting for the next request
    pub read_timeout: Duration,
    /// Write timeout for responses
    pub write_timeout: Duration,
    /// Upper bound on the size of a request head (request line + headers)
    pub max_header_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            max_connections: 1000,
            read_timeout: Duration::from_secs(30),
            write_timeout: Duration::from_secs(30),
            max_header_bytes: 16 * 1024,
        }
    }
}

/// Command line / environment options of `hostecho-server`
#[derive(Parser, Debug, Clone)]
#[command(name = "hostecho-server")]
#[command(about = "HTTP server that reports which subdomain it was reached through")]
pub struct ServerArgs {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Service name echoed in responses
    #[arg(short, long, env = "SERVICE_NAME", default_value = DEFAULT_SERVICE_NAME)]
    pub service_name: String,

    /// Interface address to bind
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind: IpAddr,

    /// Maximum number of concurrent connections
    #[arg(long, default_value_t = 1000)]
    pub max_connections: usize,

    /// Idle keep-alive timeout in seconds
    #[arg(long, default_value_t = 30)]
    pub read_timeout_secs: u64,
}

impl From<ServerArgs> for ServerConfig {
    fn from(args: ServerArgs) -> Self {
        Self {
            bind_addr: SocketAddr::new(args.bind, args.port),
            service_name: args.service_name,
            max_connections: args.max_connections,
            read_timeout: Duration::from_secs(args.read_timeout_secs),
            ..ServerConfig::default()
        }
    }
}
