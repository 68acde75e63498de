use clap::Parser;
use rand::Rng;
use rand::distr::Alphanumeric;
use std::time::Duration;

/// Subdomains probed on every run, before the randomized one
pub const DEFAULT_SUBDOMAINS: [&str; 6] = ["test", "app", "api", "admin", "user-123", "tenant-abc"];

/// Length of the random suffix in the per-run `random-…` label
const RANDOM_LABEL_LEN: usize = 6;

/// Configuration for a probe run
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Base service name appended to every subdomain
    pub target_service: String,
    /// Port the echo server is reached on
    pub target_port: u16,
    /// Pause before the first lookup
    pub startup_delay: Duration,
    /// Per-request timeout in the HTTP phase
    pub request_timeout: Duration,
    /// Path requested from the echo server
    pub path: String,
    /// Subdomain labels under test, randomized label included
    pub subdomains: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            target_service: "test-server".to_string(),
            target_port: 3000,
            startup_delay: Duration::from_millis(5000),
            request_timeout: Duration::from_millis(5000),
            path: "/test".to_string(),
            subdomains: test_subdomains(&DEFAULT_SUBDOMAINS),
        }
    }
}

impl ProbeConfig {
    /// Fully qualified name for one subdomain label
    pub fn hostname(&self, subdomain: &str) -> String {
        format!("{subdomain}.{}", self.target_service)
    }
}

/// Returns `base` followed by one freshly generated `random-xxxxxx` label
///
/// The random label keeps resolver and proxy caches from masking a broken
/// wildcard record.
pub fn test_subdomains<S: AsRef<str>>(base: &[S]) -> Vec<String> {
    let mut subdomains: Vec<String> = base.iter().map(|s| s.as_ref().to_string()).collect();
    subdomains.push(random_label());
    subdomains
}

pub fn random_label() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_LABEL_LEN)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("random-{suffix}")
}

/// Command line / environment options of `hostecho-probe`
#[derive(Parser, Debug, Clone)]
#[command(name = "hostecho-probe")]
#[command(about = "Checks that wildcard subdomains resolve and reach the echo server with the right Host")]
pub struct ProbeArgs {
    /// Base hostname suffix
    #[arg(short = 's', long, env = "TARGET_SERVICE", default_value = "test-server")]
    pub target_service: String,

    /// Target HTTP port
    #[arg(short = 'p', long, env = "TARGET_PORT", default_value_t = 3000)]
    pub target_port: u16,

    /// Startup delay in milliseconds
    #[arg(short = 'd', long, env = "TEST_DELAY", default_value_t = 5000)]
    pub test_delay: u64,

    /// Per-request timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    pub request_timeout_ms: u64,

    /// Path requested from the echo server
    #[arg(long, default_value = "/test")]
    pub path: String,

    /// Subdomain labels to probe (a random label is always added)
    #[arg(
        long = "subdomain",
        env = "TEST_SUBDOMAINS",
        value_delimiter = ',',
        default_values_t = DEFAULT_SUBDOMAINS.map(String::from)
    )]
    pub subdomains: Vec<String>,
}

impl From<ProbeArgs> for ProbeConfig {
    fn from(args: ProbeArgs) -> Self {
        Self {
            target_service: args.target_service,
            target_port: args.target_port,
            startup_delay: Duration::from_millis(args.test_delay),
            request_timeout: Duration::from_millis(args.request_timeout_ms),
            path: args.path,
            subdomains: test_subdomains(&args.subdomains),
        }
    }
}
