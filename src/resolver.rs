//! Hostname resolution behind a trait, so the gate can be tested without
//! live DNS.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::config::ResolverOpts;
use hickory_resolver::TokioResolver;

use crate::error::Error;

/// Resolve a hostname to every address it currently points at.
///
/// Implementations must return the full A/AAAA set; the gate rejects the
/// host if any one of them is unsafe.
#[async_trait]
pub trait Resolve: Send + Sync {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, Error>;
}

/// System DNS via hickory, configured from the host's resolv.conf.
///
/// A fresh resolver is built per lookup with caching disabled and a single
/// attempt, so an answer is never reused between a check and a later fetch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

#[async_trait]
impl Resolve for SystemResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let mut opts = ResolverOpts::default();
        opts.cache_size = 0;
        opts.attempts = 1;

        let resolver = TokioResolver::builder_tokio()
            .map_err(|e| Error::unresolvable(host, e.to_string()))?
            .with_options(opts)
            .build();

        let response = resolver
            .lookup_ip(host)
            .await
            .map_err(|e| Error::unresolvable(host, e.to_string()))?;

        Ok(response.iter().collect())
    }
}

/// Fixed hostname → addresses table. Unknown names fail to resolve.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    entries: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `host` (case-insensitive) to `addrs`.
    pub fn with(mut self, host: &str, addrs: impl IntoIterator<Item = IpAddr>) -> Self {
        self.entries
            .insert(host.to_ascii_lowercase(), addrs.into_iter().collect());
        self
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn lookup(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        self.entries
            .get(&host.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| Error::unresolvable(host, "no such host"))
    }
}
