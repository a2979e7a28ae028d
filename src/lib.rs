//! # product-critique
//!
//! Structured product breakdowns from a product name or URL, with an
//! SSRF-safe gate in front of every outbound fetch.
//!
//! The gate answers one question: may this server fetch this URL? It only
//! admits http(s) URLs whose host resolves, entirely, to public addresses.
//! Loopback, private, link-local, cloud metadata and reserved ranges are
//! refused, as are DNS failures and anything that does not parse.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use product_critique::{is_safe_url, Gate};
//!
//! # async fn example() -> Result<(), product_critique::Error> {
//! assert!(!is_safe_url("http://169.254.169.254/latest/meta-data/"));
//!
//! let validated = Gate::system().validate("https://example.com/").await?;
//! println!("{} resolves to {:?}", validated.host, validated.addrs);
//! # Ok(())
//! # }
//! ```
//!
//! With the default `fetch` feature, [`Fetcher`] performs gate-checked GETs
//! pinned to the validated addresses, and [`Analyzer`] runs the full
//! scrape, prompt and model pipeline.

mod classify;
mod config;
mod error;
mod favicon;
mod policy;
mod prompt;
mod resolver;
mod safe_url;
mod sections;
mod validate;

#[cfg(feature = "fetch")]
mod analyze;
#[cfg(feature = "fetch")]
mod fetch;
#[cfg(feature = "fetch")]
mod gemini;
#[cfg(feature = "fetch")]
mod scrape;

pub use classify::{classify_ip, is_hostname_blocked, HostClassification};
pub use config::{Config, FetchConfig, GateConfig, LlmConfig, RedirectMode, API_KEY_ENV};
pub use error::{Error, GateRejection};
pub use favicon::{favicon_url, known_domain, EXAMPLE_PRODUCTS, KNOWN_PRODUCT_DOMAINS};
pub use policy::{Policy, PolicyBuilder, Refusal};
pub use prompt::{build_prompt, truncate_with_marker, SYSTEM_PROMPT, TRUNCATION_MARKER};
pub use resolver::{Resolve, StaticResolver, SystemResolver};
pub use safe_url::{looks_like_url, SafeUrl};
pub use sections::{markdown_to_safe_html, parse_analysis_sections, render_report_html, Section};
pub use validate::{is_safe_url, Gate, Validated, DEFAULT_RESOLVE_TIMEOUT};

#[cfg(feature = "fetch")]
pub use analyze::{Analysis, Analyzer, ContextSource};
#[cfg(feature = "fetch")]
pub use fetch::{FetchResult, Fetcher, MAX_REDIRECTS};
#[cfg(feature = "fetch")]
pub use gemini::GeminiClient;
#[cfg(feature = "fetch")]
pub use scrape::{extract_page_text, scrape_url};
