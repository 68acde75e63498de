use colored::Colorize;
use std::fmt;

const RULE_WIDTH: usize = 50;

/// Why a single check failed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    /// Name resolution failed; carries the resolver's message
    #[error("{0}")]
    Dns(String),
    /// Connecting, writing, or reading failed
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Request timeout")]
    Timeout,
    /// The body was not the expected JSON document
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Subdomain mismatch: expected {expected}, got {actual}")]
    SubdomainMismatch { expected: String, actual: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Dns,
    Http,
}

impl Phase {
    pub fn title(self) -> &'static str {
        match self {
            Phase::Dns => "📡 Testing DNS Resolution",
            Phase::Http => "🌐 Testing HTTP Requests",
        }
    }
}

/// Outcome of one check for one subdomain
///
/// On success `outcome` holds what was observed: the resolved address in
/// the DNS phase, the echoed subdomain in the HTTP phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub phase: Phase,
    pub subdomain: String,
    pub hostname: String,
    pub outcome: Result<String, ProbeError>,
}

impl ProbeResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn message(&self) -> String {
        match (&self.outcome, self.phase) {
            (Err(e), _) => e.to_string(),
            (Ok(addr), Phase::Dns) => addr.clone(),
            (Ok(subdomain), Phase::Http) => format!("Subdomain verified: {subdomain}"),
        }
    }
}

impl fmt::Display for ProbeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.passed() { "✓".green() } else { "✗".red() };
        write!(f, "{marker} {} → {}", self.hostname, self.message())
    }
}

/// All results of one phase, in probe order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseReport {
    pub phase: Phase,
    pub results: Vec<ProbeResult>,
}

impl PhaseReport {
    pub fn new(phase: Phase) -> Self {
        Self {
            phase,
            results: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(ProbeResult::passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ProbeResult> {
        self.results.iter().filter(|r| !r.passed())
    }
}

/// Aggregate of a whole run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub dns: PhaseReport,
    pub http: PhaseReport,
}

impl RunReport {
    /// True only when every lookup and every HTTP check succeeded
    pub fn passed(&self) -> bool {
        self.dns.passed() && self.http.passed()
    }

    pub fn exit_code(&self) -> u8 {
        if self.passed() { 0 } else { 1 }
    }

    pub fn verdict_line(&self) -> String {
        if self.passed() {
            "✓ All tests passed!".green().to_string()
        } else {
            "✗ Some tests failed".red().to_string()
        }
    }
}

/// Section heading followed by a rule line
pub fn banner(title: &str) -> String {
    format!("{title}\n{}", "=".repeat(RULE_WIDTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(phase: Phase, subdomain: &str, outcome: Result<String, ProbeError>) -> ProbeResult {
        ProbeResult {
            phase,
            subdomain: subdomain.to_string(),
            hostname: format!("{subdomain}.test-server"),
            outcome,
        }
    }

    #[test]
    fn test_messages() {
        let dns_ok = result(Phase::Dns, "app", Ok("10.0.0.7".to_string()));
        assert_eq!(dns_ok.message(), "10.0.0.7");

        let http_ok = result(Phase::Http, "app", Ok("app".to_string()));
        assert_eq!(http_ok.message(), "Subdomain verified: app");

        let mismatch = result(
            Phase::Http,
            "app",
            Err(ProbeError::SubdomainMismatch {
                expected: "app".to_string(),
                actual: "www".to_string(),
            }),
        );
        assert_eq!(mismatch.message(), "Subdomain mismatch: expected app, got www");
        assert_eq!(result(Phase::Http, "x", Err(ProbeError::Timeout)).message(), "Request timeout");
    }

    #[test]
    fn test_display_line() {
        colored::control::set_override(false);
        let line = result(Phase::Dns, "api", Ok("127.0.0.1".to_string())).to_string();
        assert_eq!(line, "✓ api.test-server → 127.0.0.1");

        let line = result(
            Phase::Http,
            "api",
            Err(ProbeError::Request("Connection refused".to_string())),
        )
        .to_string();
        assert_eq!(line, "✗ api.test-server → Request failed: Connection refused");
    }

    #[test]
    fn test_verdict_requires_every_check() {
        let mut dns = PhaseReport::new(Phase::Dns);
        dns.results.push(result(Phase::Dns, "test", Ok("10.0.0.1".to_string())));
        let mut http = PhaseReport::new(Phase::Http);
        http.results.push(result(Phase::Http, "test", Ok("test".to_string())));

        let mut report = RunReport { dns, http };
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);

        report.dns.results.push(result(
            Phase::Dns,
            "tenant-abc",
            Err(ProbeError::Dns("getaddrinfo ENOTFOUND tenant-abc.test-server".to_string())),
        ));
        assert!(!report.passed());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(report.dns.failures().count(), 1);
    }

    #[test]
    fn test_empty_report_passes() {
        let report = RunReport {
            dns: PhaseReport::new(Phase::Dns),
            http: PhaseReport::new(Phase::Http),
        };
        assert!(report.passed());
    }

    #[test]
    fn test_banner() {
        assert_eq!(banner("📊 Test Results"), format!("📊 Test Results\n{}", "=".repeat(50)));
    }
}
