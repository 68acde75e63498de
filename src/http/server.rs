use super::config::ServerConfig;
use super::protocol::{HttpProtocolError, HttpStream, encode_response};
use super::response::{error_response, handle_request, is_head_only};
use crate::common::EchoServerTrait;
use crate::{EchoError, Result};
use async_trait::async_trait;
use http::header::CONNECTION;
use http::{HeaderValue, StatusCode};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::{signal, time::timeout};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, error, info, warn};

/// How long unread request bytes are drained after a final response
const LINGER_TIMEOUT: Duration = Duration::from_millis(500);

/// HTTP server that answers every request with what it saw in the `Host` header
///
/// Lifecycle: construct with [`HostEchoServer::new`], bind and serve with
/// `run` (or `listen` + `serve`), stop with SIGTERM, Ctrl-C or the sender
/// returned by `shutdown_signal`. On shutdown the listener is closed first,
/// idle keep-alive connections are dropped, and `serve` returns once every
/// in-flight response has been written.
///
/// # Examples
///
/// ```no_run
/// use hostecho::http::{HostEchoServer, ServerConfig};
/// use hostecho::common::EchoServerTrait;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let server = HostEchoServer::new(ServerConfig::default());
///     server.run().await?;
///     Ok(())
/// }
/// ```
pub struct HostEchoServer {
    config: ServerConfig,
    shutdown_signal: Arc<broadcast::Sender<()>>,
    // Subscribed at construction so a shutdown sent before `serve` starts is not lost.
    shutdown_rx: Mutex<Option<broadcast::Receiver<()>>>,
}

impl HostEchoServer {
    /// Creates a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_signal, shutdown_rx) = broadcast::channel(1);
        Self {
            config,
            shutdown_signal: Arc::new(shutdown_signal),
            shutdown_rx: Mutex::new(Some(shutdown_rx)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    fn shutdown_receiver(&self) -> broadcast::Receiver<()> {
        self.shutdown_rx
            .lock()
            .ok()
            .and_then(|mut rx| rx.take())
            .unwrap_or_else(|| self.shutdown_signal.subscribe())
    }

    /// Serves requests on one connection until it closes, idles out, or shutdown starts
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        config: Arc<ServerConfig>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut stream = HttpStream::new(stream);
        let mut linger = false;

        loop {
            let idle = !stream.has_buffered();
            let next = tokio::select! {
                biased;
                _ = shutdown.cancelled(), if idle => {
                    debug!(%addr, "Closing idle connection for shutdown");
                    break;
                }
                read = timeout(config.read_timeout, stream.read_request(config.max_header_bytes)) => read,
            };

            let head = match next {
                Ok(Ok(Some(head))) => head,
                Ok(Ok(None)) => {
                    debug!(%addr, "Client closed connection");
                    break;
                }
                Ok(Err(HttpProtocolError::HeadTooLarge(limit))) => {
                    warn!(%addr, limit, "Request head too large");
                    Self::reject(&mut stream, StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE).await;
                    linger = true;
                    break;
                }
                Ok(Err(HttpProtocolError::HttpParse(reason))) => {
                    warn!(%addr, %reason, "Malformed request");
                    Self::reject(&mut stream, StatusCode::BAD_REQUEST).await;
                    linger = true;
                    break;
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    debug!(%addr, "Read timeout");
                    break;
                }
            };

            let mut response = handle_request(&head, &config.service_name)?;
            let close = !head.keep_alive() || head.has_body() || shutdown.is_cancelled();
            if close {
                response
                    .headers_mut()
                    .insert(CONNECTION, HeaderValue::from_static("close"));
            }

            let host = head.host();
            info!(
                %addr,
                method = %head.method,
                path = %head.target,
                host = host.as_deref().unwrap_or("-"),
                "Echoed request"
            );

            let bytes = encode_response(&response, is_head_only(&head.method));
            timeout(config.write_timeout, stream.write_all(&bytes))
                .await
                .map_err(|_| EchoError::Timeout("Write timeout".to_string()))??;

            if close {
                linger = head.has_body();
                break;
            }
        }

        let _ = stream.shutdown().await;
        if linger {
            stream.linger(LINGER_TIMEOUT).await;
        }
        Ok(())
    }

    async fn reject(stream: &mut HttpStream, status: StatusCode) {
        let mut response = error_response(status);
        response
            .headers_mut()
            .insert(CONNECTION, HeaderValue::from_static("close"));
        if let Err(e) = stream.write_all(&encode_response(&response, false)).await {
            debug!(error = %e, "Failed to send error response");
        }
    }
}

/// Resolves once the process is asked to terminate (SIGTERM or Ctrl-C)
async fn termination_signal() -> io::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            _ = terminate.recv() => Ok("SIGTERM"),
            result = signal::ctrl_c() => result.map(|_| "SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        Ok("Ctrl-C")
    }
}

#[async_trait]
impl EchoServerTrait for HostEchoServer {
    async fn listen(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(EchoError::Io)
    }

    async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Test server listening on port {}", local_addr.port());
        info!(
            service = %self.config.service_name,
            "Will respond to wildcard subdomains of {}", self.config.service_name
        );

        let config = Arc::new(self.config.clone());
        let connection_count = Arc::new(AtomicUsize::new(0));
        let tracker = TaskTracker::new();
        let drain = CancellationToken::new();
        let mut shutdown_rx = self.shutdown_receiver();
        let terminate = termination_signal();
        tokio::pin!(terminate);

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            let current_count = connection_count.load(Ordering::SeqCst);
                            if current_count >= config.max_connections {
                                warn!(%addr, current = current_count, limit = config.max_connections, "Connection rejected: limit reached");
                                continue;
                            }

                            let new_count = connection_count.fetch_add(1, Ordering::SeqCst) + 1;
                            debug!(%addr, current = new_count, "Accepted connection");

                            let config = config.clone();
                            let connection_count = connection_count.clone();
                            let drain = drain.clone();
                            let span = tracing::info_span!("connection", %addr);

                            tracker.spawn(async move {
                                let result = Self::handle_connection(stream, addr, config, drain).instrument(span).await;
                                if let Err(e) = result {
                                    error!(%addr, error = %e, "Error handling connection");
                                }
                                let final_count = connection_count.fetch_sub(1, Ordering::SeqCst) - 1;
                                debug!(%addr, current = final_count, "Connection closed");
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
                signal = &mut terminate => {
                    let name = signal?;
                    info!("{name} received, closing server...");
                    break;
                }
                _ = shutdown_rx.recv() => {
                    info!("Received internal shutdown signal, closing server...");
                    break;
                }
            }
        }

        drop(listener);
        tracker.close();
        drain.cancel();
        info!(in_flight = tracker.len(), "Draining connections");
        tracker.wait().await;

        info!("Server closed");
        Ok(())
    }

    fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown_signal.as_ref().clone()
    }
}
