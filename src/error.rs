//! Error types for product-critique.

use std::net::IpAddr;
use thiserror::Error;

use crate::classify::HostClassification;

/// Errors produced by the URL gate, the fetcher and the analysis pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The candidate could not be parsed as an absolute URL with a host.
    #[error("Malformed URL: {reason}")]
    MalformedInput { url: String, reason: String },

    /// Parsed, but the scheme is not http or https.
    #[error("Unsupported scheme '{scheme}', only http/https")]
    UnsupportedScheme { url: String, scheme: String },

    /// DNS resolution failed, timed out, or returned nothing.
    #[error("DNS error for {host}: {message}")]
    UnresolvableHost { host: String, message: String },

    /// A resolved (or literal) address is not public.
    #[error("SSRF blocked: {ip} is {class} - {reason}")]
    UnsafeAddress {
        url: String,
        ip: IpAddr,
        class: HostClassification,
        reason: String,
    },

    /// Hostname is blocked before any resolution happens.
    #[error("SSRF blocked: {host} - {reason}")]
    HostnameBlocked {
        url: String,
        host: String,
        reason: String,
    },

    /// Product input was empty after trimming.
    #[error("Product name or URL is empty")]
    EmptyInput,

    /// Config file could not be read or parsed.
    #[error("Config error: {message}")]
    Config { message: String },

    /// The server answered with a redirect and redirects are refused.
    #[cfg(feature = "fetch")]
    #[error("Redirect refused: {url} -> {location}")]
    RedirectRefused { url: String, location: String },

    /// A redirect pointed to a URL the gate rejects.
    #[cfg(feature = "fetch")]
    #[error("Redirect blocked: {redirect_url} - {reason}")]
    RedirectBlocked {
        original_url: String,
        redirect_url: String,
        reason: String,
    },

    /// Too many redirects while re-validating hops.
    #[cfg(feature = "fetch")]
    #[error("Too many redirects (max {max})")]
    TooManyRedirects { url: String, max: u8 },

    /// Non-success HTTP status.
    #[cfg(feature = "fetch")]
    #[error("HTTP status {status} from {url}")]
    HttpStatus { url: String, status: u16 },

    /// Request exceeded its time budget.
    #[cfg(feature = "fetch")]
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    /// Transport-level HTTP failure.
    #[cfg(feature = "fetch")]
    #[error("HTTP error: {message}")]
    HttpError { url: String, message: String },

    /// No API key configured.
    #[cfg(feature = "fetch")]
    #[error("No Google AI API key configured (set GOOGLE_API_KEY)")]
    MissingApiKey,

    /// The API rejected the key.
    #[cfg(feature = "fetch")]
    #[error("Invalid API key")]
    InvalidApiKey,

    /// Rate limit or quota exhausted.
    #[cfg(feature = "fetch")]
    #[error("Rate limit or quota hit: {message}")]
    RateLimited { message: String },

    /// The model refused to produce text.
    #[cfg(feature = "fetch")]
    #[error("Response blocked: {reason}")]
    ResponseBlocked { reason: String },

    /// The model returned no text and no block reason.
    #[cfg(feature = "fetch")]
    #[error("The model didn't return text")]
    EmptyResponse,

    /// Any other model API failure.
    #[cfg(feature = "fetch")]
    #[error("LLM error: {message}")]
    Llm { message: String },
}

/// Coarse reason a URL failed the gate.
///
/// The boolean `is_safe_url` contract hides this from callers; it exists for
/// in-process logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MalformedInput,
    UnsupportedScheme,
    UnresolvableHost,
    UnsafeAddressClass,
}

impl Error {
    /// Map a gate error onto the four-way rejection taxonomy.
    pub fn gate_rejection(&self) -> Option<GateRejection> {
        match self {
            Self::MalformedInput { .. } => Some(GateRejection::MalformedInput),
            Self::UnsupportedScheme { .. } => Some(GateRejection::UnsupportedScheme),
            Self::UnresolvableHost { .. } => Some(GateRejection::UnresolvableHost),
            Self::UnsafeAddress { .. } | Self::HostnameBlocked { .. } => {
                Some(GateRejection::UnsafeAddressClass)
            }
            _ => None,
        }
    }

    /// The destination class behind a gate error.
    ///
    /// Parse, scheme and DNS failures are
    /// [`HostClassification::UnresolvableOrMalformed`]. Hostnames refused
    /// before resolution count as reserved.
    pub fn host_classification(&self) -> Option<HostClassification> {
        match self {
            Self::MalformedInput { .. }
            | Self::UnsupportedScheme { .. }
            | Self::UnresolvableHost { .. } => Some(HostClassification::UnresolvableOrMalformed),
            Self::UnsafeAddress { class, .. } => Some(*class),
            Self::HostnameBlocked { .. } => Some(HostClassification::ReservedOrUnspecified),
            _ => None,
        }
    }

    pub(crate) fn malformed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported_scheme(url: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            url: url.into(),
            scheme: scheme.into(),
        }
    }

    pub(crate) fn unresolvable(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnresolvableHost {
            host: host.into(),
            message: message.into(),
        }
    }

    pub(crate) fn unsafe_address(
        url: impl Into<String>,
        ip: IpAddr,
        class: HostClassification,
        reason: impl Into<String>,
    ) -> Self {
        Self::UnsafeAddress {
            url: url.into(),
            ip,
            class,
            reason: reason.into(),
        }
    }

    pub(crate) fn hostname_blocked(
        url: impl Into<String>,
        host: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::HostnameBlocked {
            url: url.into(),
            host: host.into(),
            reason: reason.into(),
        }
    }

    #[cfg(feature = "fetch")]
    pub(crate) fn http(url: impl Into<String>, err: &reqwest::Error) -> Self {
        let url = url.into();
        if err.is_timeout() {
            Self::Timeout { url }
        } else {
            Self::HttpError {
                url,
                message: err.to_string(),
            }
        }
    }
}
