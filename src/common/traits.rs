use crate::Result;
use async_trait::async_trait;
use tokio::net::TcpListener;

/// Lifecycle shared by the long-running servers in this crate
///
/// A server is constructed from its configuration, then either `run`
/// (bind + serve) or handed an already bound listener through `serve`.
/// Both return once the server has been told to stop and every in-flight
/// response has been written.
#[async_trait]
pub trait EchoServerTrait {
    /// Binds the configured address and serves until shutdown
    async fn run(&self) -> Result<()> {
        let listener = self.listen().await?;
        self.serve(listener).await
    }

    /// Binds the listening socket without accepting anything yet
    async fn listen(&self) -> Result<TcpListener>;

    /// Accepts connections on `listener` until shutdown, then drains
    async fn serve(&self, listener: TcpListener) -> Result<()>;

    /// Returns a shutdown signal sender that can be used to gracefully shutdown the server
    fn shutdown_signal(&self) -> tokio::sync::broadcast::Sender<()>;
}
