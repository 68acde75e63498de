use color_eyre::eyre::Result;
use hostecho::common::spawn_test_server;
use hostecho::probe::{
    EchoClient, Phase, ProbeConfig, ProbeError, ProbeRunner, StaticResolver, run_exit_code,
};
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

fn probe_config(port: u16, subdomains: &[&str]) -> ProbeConfig {
    ProbeConfig {
        target_service: "test-server".to_string(),
        target_port: port,
        startup_delay: Duration::ZERO,
        request_timeout: Duration::from_millis(500),
        subdomains: subdomains.iter().map(|s| s.to_string()).collect(),
        ..ProbeConfig::default()
    }
}

fn resolver_for(config: &ProbeConfig) -> StaticResolver {
    config
        .subdomains
        .iter()
        .fold(StaticResolver::new(), |resolver, subdomain| {
            resolver.with_entry(config.hostname(subdomain), LOCALHOST)
        })
}

/// A server that answers every connection with the same canned HTTP response
async fn canned_server(response: &'static str) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                let _ = socket.read(&mut buffer).await;
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    Ok((addr, handle))
}

#[tokio::test]
async fn test_all_checks_pass_against_echo_server() -> Result<()> {
    let server = spawn_test_server("test-server").await?;
    let config = probe_config(server.addr.port(), &["test", "admin", "user-123", "random-abc123"]);
    let runner = ProbeRunner::new(config.clone(), resolver_for(&config));

    let mut out = Vec::new();
    let report = runner.run(&mut out).await?;

    assert!(report.passed(), "{report:#?}");
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.dns.results.len(), 4);
    assert_eq!(report.http.results.len(), 4);
    for result in &report.http.results {
        assert_eq!(result.outcome.as_deref(), Ok(result.subdomain.as_str()));
    }

    let text = String::from_utf8(out)?;
    assert!(text.contains("Target: test-server"));
    assert!(text.contains("admin.test-server → 127.0.0.1"));
    assert!(text.contains("admin.test-server → Subdomain verified: admin"));
    assert!(text.contains("All tests passed!"));

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_one_dns_failure_fails_the_run() -> Result<()> {
    let server = spawn_test_server("test-server").await?;
    let config = probe_config(server.addr.port(), &["admin", "tenant-abc"]);
    let resolver = StaticResolver::new().with_entry("admin.test-server", LOCALHOST);
    let runner = ProbeRunner::new(config, resolver);

    let mut out = Vec::new();
    let report = runner.run(&mut out).await?;

    assert!(!report.passed());
    assert_eq!(report.exit_code(), 1);

    // Both phases still visited every hostname
    assert_eq!(report.dns.results.len(), 2);
    assert_eq!(report.http.results.len(), 2);
    assert!(report.dns.results[0].passed());
    assert!(report.http.results[0].passed());

    let failed = &report.dns.results[1];
    assert_eq!(failed.phase, Phase::Dns);
    assert!(matches!(&failed.outcome, Err(ProbeError::Dns(msg)) if msg.contains("ENOTFOUND")));
    assert!(matches!(report.http.results[1].outcome, Err(ProbeError::Request(_))));

    let text = String::from_utf8(out)?;
    assert!(text.contains("tenant-abc.test-server → getaddrinfo ENOTFOUND tenant-abc.test-server"));
    assert!(text.contains("Some tests failed"));

    server.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_subdomain_mismatch_is_a_failure() -> Result<()> {
    let (addr, handle) = canned_server(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 29\r\n\r\n{\"extracted_subdomain\":\"www\"}",
    )
    .await?;

    let client = EchoClient::new(Duration::from_secs(2));
    let outcome = client
        .verify_subdomain(addr, "app.test-server", "/test", "app")
        .await;
    assert_eq!(
        outcome,
        Err(ProbeError::SubdomainMismatch {
            expected: "app".to_string(),
            actual: "www".to_string(),
        })
    );

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_non_json_body_is_invalid_response() -> Result<()> {
    let (addr, handle) =
        canned_server("HTTP/1.1 502 Bad Gateway\r\nConnection: close\r\n\r\n<html>bad gateway</html>")
            .await?;

    let client = EchoClient::new(Duration::from_secs(2));
    let outcome = client
        .verify_subdomain(addr, "app.test-server", "/test", "app")
        .await;
    assert!(matches!(outcome, Err(ProbeError::InvalidResponse(_))));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_chunked_response_is_decoded() -> Result<()> {
    let (addr, handle) = canned_server(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n10\r\n{\"extracted_subd\r\nd\r\nomain\":\"api\"}\r\n0\r\n\r\n",
    )
    .await?;

    let client = EchoClient::new(Duration::from_secs(2));
    let outcome = client
        .verify_subdomain(addr, "api.test-server", "/test", "api")
        .await;
    assert_eq!(outcome, Ok("api".to_string()));

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn test_unresponsive_server_times_out() -> Result<()> {
    // Accepts connections but never answers
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = probe_config(addr.port(), &["admin"]);
    let runner = ProbeRunner::new(config.clone(), resolver_for(&config));

    let started = Instant::now();
    let mut out = Vec::new();
    let report = runner.run(&mut out).await?;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(report.dns.passed());
    assert_eq!(report.http.results[0].outcome, Err(ProbeError::Timeout));
    assert_eq!(report.exit_code(), 1);
    assert!(String::from_utf8(out)?.contains("admin.test-server → Request timeout"));

    handle.abort();
    Ok(())
}

/// Console whose reader has gone away
struct BrokenPipeWriter;

impl Write for BrokenPipeWriter {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

#[tokio::test]
async fn test_console_write_failure_aborts_the_run() -> Result<()> {
    let config = probe_config(9, &["app"]);
    let runner = ProbeRunner::new(config.clone(), resolver_for(&config));

    let outcome = runner.run(&mut BrokenPipeWriter).await;

    assert!(outcome.is_err());
    assert_eq!(run_exit_code(&outcome), 1);
    Ok(())
}

#[tokio::test]
async fn test_exit_code_follows_the_verdict() -> Result<()> {
    let server = spawn_test_server("test-server").await?;
    let config = probe_config(server.addr.port(), &["app"]);
    let runner = ProbeRunner::new(config.clone(), resolver_for(&config));
    let outcome = runner.run(&mut Vec::new()).await;
    assert_eq!(run_exit_code(&outcome), 0);

    let runner = ProbeRunner::new(config.clone(), StaticResolver::new());
    let outcome = runner.run(&mut Vec::new()).await;
    assert_eq!(run_exit_code(&outcome), 1);

    server.stop().await?;
    Ok(())
}
