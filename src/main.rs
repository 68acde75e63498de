use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use hostecho::EchoServerTrait;
use hostecho::http::{HostEchoServer, ServerArgs, ServerConfig};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hostecho=info")),
        )
        .init();

    let args = match ServerArgs::try_parse() {
        Ok(args) => args,
        Err(e) if !e.use_stderr() => e.exit(),
        Err(e) => {
            eprintln!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };
    let config: ServerConfig = args.into();

    let server = HostEchoServer::new(config);
    let config = server.config();
    info!(
        address = %config.bind_addr,
        service = %config.service_name,
        max_connections = config.max_connections,
        "Starting Host echo server"
    );

    server.run().await.wrap_err("Failed to run Host echo server")?;

    Ok(ExitCode::SUCCESS)
}
