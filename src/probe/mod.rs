//! Wildcard-DNS probe client
//!
//! Resolves `<subdomain>.<service>` for a list of labels, then asks the echo
//! server, through each of those names, which subdomain it saw.

pub mod client;
pub mod config;
pub mod dns;
pub mod report;
pub mod runner;

pub use client::{EchoClient, check_echo_body};
pub use config::{DEFAULT_SUBDOMAINS, ProbeArgs, ProbeConfig};
pub use dns::{Resolver, StaticResolver, SystemResolver};
pub use report::{Phase, PhaseReport, ProbeError, ProbeResult, RunReport};
pub use runner::{ProbeRunner, run_exit_code};
