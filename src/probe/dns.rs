//! Hostname resolution behind a small trait
//!
//! The probe only needs "hostname → first address". `SystemResolver` goes
//! through the platform resolver (the same path `getaddrinfo` takes, so
//! `/etc/hosts` and container DNS both apply); `StaticResolver` answers from
//! a fixed table.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::net::IpAddr;

/// Resolves a hostname to a single address
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn lookup(&self, hostname: &str) -> io::Result<IpAddr>;
}

/// Resolver backed by the operating system
///
/// No timeout is applied beyond whatever the platform resolver enforces.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolver for SystemResolver {
    async fn lookup(&self, hostname: &str) -> io::Result<IpAddr> {
        let mut addrs = tokio::net::lookup_host((hostname, 0)).await?;
        addrs.next().map(|addr| addr.ip()).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("getaddrinfo ENOTFOUND {hostname}"),
            )
        })
    }
}

/// Resolver answering from a fixed hostname table
///
/// Unknown names fail with `ErrorKind::NotFound`, the way a missing DNS
/// record would.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, IpAddr>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, hostname: impl Into<String>, addr: IpAddr) -> Self {
        self.insert(hostname, addr);
        self
    }

    pub fn insert(&mut self, hostname: impl Into<String>, addr: IpAddr) {
        self.entries.insert(hostname.into().to_ascii_lowercase(), addr);
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn lookup(&self, hostname: &str) -> io::Result<IpAddr> {
        self.entries
            .get(&hostname.to_ascii_lowercase())
            .copied()
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("getaddrinfo ENOTFOUND {hostname}"),
                )
            })
    }
}
