//! The URL safety gate: parse, resolve, classify every address.

use std::future::Future;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, warn};

use crate::classify::HostClassification;
use crate::error::Error;
use crate::policy::Policy;
use crate::resolver::{Resolve, SystemResolver};
use crate::safe_url::{looks_like_url, SafeUrl};

/// Default budget for a single DNS resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of successful URL validation.
#[derive(Debug, Clone)]
pub struct Validated {
    /// Every address the host resolved to, all of which passed the policy.
    pub addrs: Vec<IpAddr>,

    /// Normalized hostname (use for Host header / SNI).
    pub host: String,

    /// Port number.
    pub port: u16,

    /// Full URL (normalized).
    pub url: String,

    /// Whether HTTPS.
    pub https: bool,

    /// Whether the host was an IP literal rather than a name.
    pub literal: bool,
}

impl Validated {
    /// Socket addresses to pin the connection to.
    pub fn socket_addrs(&self) -> Vec<SocketAddr> {
        self.addrs
            .iter()
            .map(|&ip| SocketAddr::new(ip, self.port))
            .collect()
    }
}

/// Decides whether a candidate URL may be fetched.
///
/// The gate is stateless: every call re-parses, re-resolves and
/// re-classifies. Cloning is cheap.
#[derive(Clone)]
pub struct Gate {
    policy: Arc<Policy>,
    resolver: Arc<dyn Resolve>,
    resolve_timeout: Duration,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("policy", &self.policy)
            .field("resolve_timeout", &self.resolve_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::system()
    }
}

impl Gate {
    pub fn new(policy: Policy, resolver: impl Resolve + 'static) -> Self {
        Self {
            policy: Arc::new(policy),
            resolver: Arc::new(resolver),
            resolve_timeout: DEFAULT_RESOLVE_TIMEOUT,
        }
    }

    /// Public-only policy over system DNS.
    pub fn system() -> Self {
        Self::new(Policy::public_only(), SystemResolver)
    }

    pub fn with_resolve_timeout(mut self, timeout: Duration) -> Self {
        self.resolve_timeout = timeout;
        self
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Validate a URL, resolve DNS, and check every address against the
    /// policy.
    ///
    /// 1. Parses and normalizes the URL (http/https only)
    /// 2. Checks the hostname against the blocklist
    /// 3. Classifies an IP literal directly, or resolves the name
    /// 4. Rejects if any resolved address is not allowed
    ///
    /// # Errors
    ///
    /// Returns the first reason the URL was refused. See
    /// [`Error::gate_rejection`] for the coarse taxonomy.
    pub async fn validate(&self, url: &str) -> Result<Validated, Error> {
        let safe_url = SafeUrl::parse(url)?;

        if let Err(reason) = self.policy.check_hostname(safe_url.host()) {
            return Err(Error::hostname_blocked(url, safe_url.host(), reason));
        }

        let (addrs, literal) = match safe_url.ip() {
            Some(ip) => (vec![ip], true),
            None => (self.resolve(safe_url.lookup_host()).await?, false),
        };

        for &ip in &addrs {
            if let Err(refusal) = self.policy.check_ip(ip) {
                return Err(Error::unsafe_address(url, ip, refusal.class, refusal.reason));
            }
        }

        Ok(Validated {
            addrs,
            host: safe_url.host().to_string(),
            port: safe_url.port(),
            url: safe_url.as_str().to_string(),
            https: safe_url.is_https(),
            literal,
        })
    }

    /// Classify a candidate URL. [`HostClassification::Public`] means the
    /// gate would admit it.
    pub async fn classify_url(&self, candidate: &str) -> HostClassification {
        match self.validate(candidate).await {
            Ok(_) => HostClassification::Public,
            Err(e) => e
                .host_classification()
                .unwrap_or(HostClassification::UnresolvableOrMalformed),
        }
    }

    /// Boolean form of [`validate`](Self::validate). Every failure folds
    /// into `false`; the reason is logged at debug level only.
    pub async fn is_safe_url(&self, candidate: &str) -> bool {
        if !looks_like_url(candidate) {
            debug!("gate: input is not an http(s) URL");
            return false;
        }

        match self.validate(candidate).await {
            Ok(_) => true,
            Err(e) => {
                debug!(rejection = ?e.gate_rejection(), "gate: rejected URL: {}", e);
                false
            }
        }
    }

    /// Synchronous version of [`is_safe_url`](Self::is_safe_url).
    ///
    /// Blocks the current thread while resolving. Works inside and outside
    /// a Tokio runtime.
    pub fn is_safe_url_blocking(&self, candidate: &str) -> bool {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(self.is_safe_url(candidate)))
            }
            // a current-thread runtime cannot be blocked from inside itself
            Ok(_) => std::thread::scope(|s| {
                s.spawn(|| block_on_fresh_runtime(self.is_safe_url(candidate)))
                    .join()
                    .unwrap_or(false)
            }),
            Err(_) => block_on_fresh_runtime(self.is_safe_url(candidate)),
        }
    }

    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, Error> {
        let addrs = tokio::time::timeout(self.resolve_timeout, self.resolver.lookup(host))
            .await
            .map_err(|_| Error::unresolvable(host, "resolution timed out"))??;

        if addrs.is_empty() {
            return Err(Error::unresolvable(host, "no IP addresses found"));
        }

        Ok(addrs)
    }
}

fn block_on_fresh_runtime(fut: impl Future<Output = bool>) -> bool {
    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt.block_on(fut),
        Err(e) => {
            warn!("gate: could not start runtime for DNS resolution: {}", e);
            false
        }
    }
}

/// Returns true iff `candidate` is an http(s) URL whose host resolves, via
/// system DNS, only to public addresses.
///
/// Never panics and never errors: malformed input, unsupported schemes, DNS
/// failures and unsafe addresses all return `false`.
///
/// ```no_run
/// use product_critique::is_safe_url;
///
/// assert!(!is_safe_url("http://169.254.169.254/latest/meta-data/"));
/// assert!(!is_safe_url("not a url"));
/// ```
pub fn is_safe_url(candidate: &str) -> bool {
    Gate::system().is_safe_url_blocking(candidate)
}
