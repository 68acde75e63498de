use crate::common::EchoServerTrait;
use crate::http::{HostEchoServer, ServerConfig};
use crate::{EchoError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// A running echo server bound to an ephemeral loopback port
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: JoinHandle<Result<()>>,
    pub shutdown: broadcast::Sender<()>,
}

impl TestServer {
    /// Sends the internal shutdown signal and waits for the drain to finish
    pub async fn stop(self) -> Result<()> {
        let _ = self.shutdown.send(());
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .map_err(|_| EchoError::Timeout("Server did not drain in time".to_string()))?
            .map_err(|e| EchoError::Config(format!("Server task failed: {e}")))?
    }
}

/// Starts a `HostEchoServer` on `127.0.0.1:0` with the given service name
///
/// The listener is bound before the task is spawned, so the returned address
/// accepts connections immediately.
pub async fn spawn_test_server(service_name: &str) -> Result<TestServer> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let config = ServerConfig {
        bind_addr: addr,
        service_name: service_name.to_string(),
        read_timeout: Duration::from_secs(5),
        ..ServerConfig::default()
    };

    let server = HostEchoServer::new(config);
    let shutdown = server.shutdown_signal();
    let handle = tokio::spawn(async move { server.serve(listener).await });

    Ok(TestServer {
        addr,
        handle,
        shutdown,
    })
}
