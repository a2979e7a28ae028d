//! Gate policy: the base classification rule plus operator overrides.
//!
//! The default [`Policy`] admits only addresses classified as
//! [`HostClassification::Public`] and rejects the built-in hostname
//! blocklist. [`PolicyBuilder`] layers CIDR and hostname rules on top.
//!
//! Allow rules take precedence over block rules, which take precedence over
//! the base classification:
//! 1. If the IP matches an `allow_cidr` rule, it is allowed
//! 2. If the IP matches a `block_cidr` rule, it is blocked
//! 3. Otherwise it must classify as public
//!
//! **Be careful with `allow_cidr`.** It overrides every block, including
//! loopback and link-local. It exists for test servers bound to loopback and
//! for audited internal deployments.

use std::net::IpAddr;

use ipnet::IpNet;

use crate::classify::{classify_ip_with_reason, is_hostname_blocked, HostClassification};

/// Why an address or hostname was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub class: HostClassification,
    pub reason: String,
}

/// An immutable gate policy. Build one with [`PolicyBuilder`] or use
/// [`Policy::default`] for public-only.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    blocked_cidrs: Vec<IpNet>,
    allowed_cidrs: Vec<IpNet>,
    blocked_hosts: Vec<String>,
}

impl Policy {
    /// Public-only policy with no overrides.
    pub fn public_only() -> Self {
        Self::default()
    }

    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::default()
    }

    /// Check a resolved or literal address.
    pub fn check_ip(&self, ip: IpAddr) -> Result<(), Refusal> {
        if self.allowed_cidrs.iter().any(|cidr| cidr.contains(&ip)) {
            return Ok(());
        }

        if let Some(cidr) = self.blocked_cidrs.iter().find(|cidr| cidr.contains(&ip)) {
            let (class, _) = classify_ip_with_reason(ip);
            return Err(Refusal {
                class,
                reason: format!("blocked by policy CIDR rule: {}", cidr),
            });
        }

        match classify_ip_with_reason(ip) {
            (HostClassification::Public, _) => Ok(()),
            (class, range) => Err(Refusal {
                class,
                reason: range.to_string(),
            }),
        }
    }

    /// Check a normalized hostname before resolution. Hostname matching is
    /// case-insensitive.
    pub fn check_hostname(&self, host: &str) -> Result<(), String> {
        if let Some(blocked) = is_hostname_blocked(host) {
            return Err(format!("hostname {} is blocked", blocked));
        }

        let host_lower = host.to_lowercase();
        if let Some(pattern) = self
            .blocked_hosts
            .iter()
            .find(|pattern| matches_hostname_pattern(&host_lower, pattern))
        {
            return Err(format!("blocked by policy hostname rule: {}", pattern));
        }

        Ok(())
    }
}

/// Builder for [`Policy`]. Each method consumes `self`.
#[derive(Debug, Clone, Default)]
pub struct PolicyBuilder {
    blocked_cidrs: Vec<IpNet>,
    allowed_cidrs: Vec<IpNet>,
    blocked_hosts: Vec<String>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block an IP range (CIDR notation). Invalid CIDRs are ignored.
    pub fn block_cidr(mut self, cidr: &str) -> Self {
        match cidr.parse() {
            Ok(net) => self.blocked_cidrs.push(net),
            Err(_) => tracing::warn!("ignoring invalid block CIDR {:?}", cidr),
        }
        self
    }

    /// Allow an IP range (CIDR notation), overriding every other rule.
    pub fn allow_cidr(mut self, cidr: &str) -> Self {
        match cidr.parse() {
            Ok(net) => self.allowed_cidrs.push(net),
            Err(_) => tracing::warn!("ignoring invalid allow CIDR {:?}", cidr),
        }
        self
    }

    /// Block a hostname or `*.suffix` pattern.
    pub fn block_host(mut self, pattern: &str) -> Self {
        self.blocked_hosts.push(pattern.to_lowercase());
        self
    }

    pub fn build(self) -> Policy {
        Policy {
            blocked_cidrs: self.blocked_cidrs,
            allowed_cidrs: self.allowed_cidrs,
            blocked_hosts: self.blocked_hosts,
        }
    }
}

/// Match a lowercase hostname against a pattern (supports a leading `*.`).
/// `*.example.com` matches `example.com` itself too.
fn matches_hostname_pattern(host: &str, pattern: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => host == base || host.ends_with(&pattern[1..]),
        None => host == pattern,
    }
}
