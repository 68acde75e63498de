use super::client::EchoClient;
use super::config::ProbeConfig;
use super::dns::Resolver;
use super::report::{Phase, PhaseReport, ProbeError, ProbeResult, RunReport, banner};
use crate::Result;
use colored::Colorize;
use std::io::Write;
use std::net::SocketAddr;
use tracing::{debug, info};

/// Process exit status for the outcome of [`ProbeRunner::run`]
///
/// 0 when every check passed, 1 for any failed check or an aborted run.
pub fn run_exit_code(outcome: &Result<RunReport>) -> u8 {
    match outcome {
        Ok(report) => report.exit_code(),
        Err(_) => 1,
    }
}

/// Drives one probe run: delay, DNS phase, HTTP phase, report
///
/// Hostnames are probed one after another. A failing check is recorded and
/// the run moves on; only failures writing the console output abort it.
pub struct ProbeRunner<R: Resolver> {
    config: ProbeConfig,
    resolver: R,
    client: EchoClient,
}

impl<R: Resolver> ProbeRunner<R> {
    pub fn new(config: ProbeConfig, resolver: R) -> Self {
        let client = EchoClient::new(config.request_timeout);
        Self {
            config,
            resolver,
            client,
        }
    }

    /// Runs every phase, writing progress to `out`
    pub async fn run<W: Write>(&self, out: &mut W) -> Result<RunReport> {
        writeln!(out, "{}", banner("🧪 Docker Compose Wildcard DNS Test Suite"))?;
        writeln!(out, "Target: {}", self.config.target_service)?;
        writeln!(out, "Port: {}", self.config.target_port)?;
        writeln!(out, "Test delay: {}ms", self.config.startup_delay.as_millis())?;

        self.wait_for_services(out).await?;
        let dns = self.dns_phase(out).await?;
        let http = self.http_phase(out).await?;
        let report = RunReport { dns, http };

        writeln!(out, "\n{}", banner("📊 Test Results"))?;
        writeln!(out, "{}", report.verdict_line())?;
        out.flush()?;

        info!(
            passed = report.passed(),
            dns_failures = report.dns.failures().count(),
            http_failures = report.http.failures().count(),
            "Probe run finished"
        );
        Ok(report)
    }

    async fn wait_for_services<W: Write>(&self, out: &mut W) -> Result<()> {
        let delay = self.config.startup_delay;
        writeln!(
            out,
            "\n{}",
            format!("⏳ Waiting {}ms for services to start...", delay.as_millis()).yellow()
        )?;
        out.flush()?;
        tokio::time::sleep(delay).await;
        Ok(())
    }

    /// Resolves every hostname; failures are recorded, not returned
    pub async fn dns_phase<W: Write>(&self, out: &mut W) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(Phase::Dns);
        writeln!(out, "\n{}", banner(Phase::Dns.title()))?;

        for subdomain in &self.config.subdomains {
            let hostname = self.config.hostname(subdomain);
            let outcome = self
                .resolver
                .lookup(&hostname)
                .await
                .map(|addr| addr.to_string())
                .map_err(|e| ProbeError::Dns(e.to_string()));
            debug!(%hostname, ?outcome, "DNS lookup");

            let result = ProbeResult {
                phase: Phase::Dns,
                subdomain: subdomain.clone(),
                hostname,
                outcome,
            };
            writeln!(out, "{result}")?;
            report.results.push(result);
        }

        Ok(report)
    }

    /// Requests the configured path once per hostname and checks the echo
    pub async fn http_phase<W: Write>(&self, out: &mut W) -> Result<PhaseReport> {
        let mut report = PhaseReport::new(Phase::Http);
        writeln!(out, "\n{}", banner(Phase::Http.title()))?;

        for subdomain in &self.config.subdomains {
            let hostname = self.config.hostname(subdomain);
            let outcome = self.check_http(&hostname, subdomain).await;
            debug!(%hostname, ?outcome, "HTTP check");

            let result = ProbeResult {
                phase: Phase::Http,
                subdomain: subdomain.clone(),
                hostname,
                outcome,
            };
            writeln!(out, "{result}")?;
            report.results.push(result);
        }

        Ok(report)
    }

    async fn check_http(
        &self,
        hostname: &str,
        subdomain: &str,
    ) -> std::result::Result<String, ProbeError> {
        let ip = self
            .resolver
            .lookup(hostname)
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let addr = SocketAddr::new(ip, self.config.target_port);

        self.client
            .verify_subdomain(addr, hostname, &self.config.path, subdomain)
            .await
    }
}
