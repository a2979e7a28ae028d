//! The analysis pipeline: optional page context, prompt, model call.

use tracing::{info, warn};

use crate::config::{Config, FetchConfig, LlmConfig};
use crate::error::Error;
use crate::fetch::Fetcher;
use crate::gemini::GeminiClient;
use crate::prompt::{build_prompt, truncate_with_marker, SYSTEM_PROMPT};
use crate::safe_url::looks_like_url;
use crate::scrape::scrape_url;

/// Where the page context in a prompt came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    /// The input was a product name; nothing was fetched.
    NotAUrl,
    /// Visible text from the product page, `chars` characters long.
    Scraped { chars: usize },
    /// The input was a URL but the page was refused or could not be read.
    Unavailable,
}

/// A finished analysis.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The product input after trimming and truncation.
    pub product: String,
    /// Model output, expected to hold the `##` sections of the template.
    pub markdown: String,
    pub context: ContextSource,
}

#[derive(Debug)]
pub struct Analyzer {
    gemini: GeminiClient,
    fetcher: Fetcher,
    max_input_chars: usize,
    max_context_chars: usize,
}

impl Analyzer {
    pub fn new(gemini: GeminiClient, fetcher: Fetcher) -> Self {
        Self {
            gemini,
            fetcher,
            max_input_chars: LlmConfig::default().max_input_chars,
            max_context_chars: FetchConfig::default().max_context_chars,
        }
    }

    /// Wire up the model client, gate and fetcher from one config.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let gemini = GeminiClient::from_config(&config.llm)?;
        let fetcher = Fetcher::from_config(config.gate.gate(), &config.fetch);
        Ok(Self {
            gemini,
            fetcher,
            max_input_chars: config.llm.max_input_chars,
            max_context_chars: config.fetch.max_context_chars,
        })
    }

    /// Analyze a product name or URL.
    ///
    /// A URL is scraped for context first. Scraping never fails the
    /// analysis; without it the model works from the input alone.
    pub async fn analyze(&self, product_input: &str) -> Result<Analysis, Error> {
        let trimmed = product_input.trim();
        if trimmed.is_empty() {
            return Err(Error::EmptyInput);
        }
        let product = truncate_with_marker(trimmed, self.max_input_chars);

        let (page_text, context) = if looks_like_url(trimmed) {
            match scrape_url(&self.fetcher, trimmed, self.max_context_chars).await {
                Some(text) => {
                    let chars = text.chars().count();
                    (Some(text), ContextSource::Scraped { chars })
                }
                None => {
                    warn!("analyze: no page context for {}, continuing without it", trimmed);
                    (None, ContextSource::Unavailable)
                }
            }
        } else {
            (None, ContextSource::NotAUrl)
        };

        let prompt = build_prompt(&product, page_text.as_deref());
        let markdown = self.gemini.generate(SYSTEM_PROMPT, &prompt).await?;
        info!(
            "analyze: {} analysis ready ({} chars, context {:?})",
            self.gemini.model(),
            markdown.len(),
            context
        );

        Ok(Analysis {
            product,
            markdown,
            context,
        })
    }
}
