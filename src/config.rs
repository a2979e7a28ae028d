//! Configuration loaded from an optional TOML file plus environment.
//!
//! ```toml
//! [llm]
//! model = "gemini-2.5-flash"
//!
//! [fetch]
//! timeout_secs = 10
//! redirects = "refuse"
//!
//! [gate]
//! blocked_hosts = ["*.corp.example.com"]
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::policy::{Policy, PolicyBuilder};
use crate::resolver::SystemResolver;
use crate::validate::Gate;

/// Environment variable holding the Google AI API key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (compatible; ProductCritique/1.0)";

/// What the fetcher does with a 3xx response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectMode {
    /// Treat any redirect as a failed fetch.
    #[default]
    Refuse,
    /// Validate the target from scratch and issue a new request.
    Revalidate,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub llm: LlmConfig,
    pub fetch: FetchConfig,
    pub gate: GateConfig,
}

/// Model API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmConfig {
    /// Overridden by `GOOGLE_API_KEY` when that is set and non-blank.
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub base_url: String,
    pub timeout_secs: u64,
    /// Product input longer than this many characters is truncated.
    pub max_input_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            temperature: 0.7,
            max_output_tokens: 4096,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            timeout_secs: 120,
            max_input_chars: 2000,
        }
    }
}

/// Outbound page fetch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_body_bytes: usize,
    /// Scraped text longer than this many characters is truncated.
    pub max_context_chars: usize,
    pub redirects: RedirectMode,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_body_bytes: 2 * 1024 * 1024,
            max_context_chars: 4000,
            redirects: RedirectMode::Refuse,
        }
    }
}

/// URL gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GateConfig {
    pub resolve_timeout_secs: u64,
    /// Extra hostnames or `*.suffix` patterns to refuse.
    pub blocked_hosts: Vec<String>,
    /// Extra CIDR ranges to refuse even when public.
    pub blocked_cidrs: Vec<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            resolve_timeout_secs: 5,
            blocked_hosts: Vec::new(),
            blocked_cidrs: Vec::new(),
        }
    }
}

impl GateConfig {
    pub fn policy(&self) -> Policy {
        let builder = self
            .blocked_hosts
            .iter()
            .fold(PolicyBuilder::new(), |b, host| b.block_host(host));
        self.blocked_cidrs
            .iter()
            .fold(builder, |b, cidr| b.block_cidr(cidr))
            .build()
    }

    /// A system-DNS gate with this policy and timeout.
    pub fn gate(&self) -> Gate {
        Gate::new(self.policy(), SystemResolver)
            .with_resolve_timeout(Duration::from_secs(self.resolve_timeout_secs))
    }
}

impl Config {
    /// Load from `path` if given (defaults otherwise), then apply the
    /// `GOOGLE_API_KEY` override.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env_key(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("reading {}: {}", path.display(), e),
        })?;
        Self::from_toml(&raw).map_err(|e| Error::Config {
            message: format!("{}: {}", path.display(), e),
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Blank keys (from either source) count as missing.
    fn apply_env_key(&mut self, env_key: Option<String>) {
        let env_key = env_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
        let file_key = self
            .llm
            .api_key
            .take()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        self.llm.api_key = env_key.or(file_key);
    }
}
