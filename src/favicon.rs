//! Favicon lookup for the report header.
//!
//! Product names map through a fixed table and are never guessed. URLs only
//! contribute their hostname, and only after passing the gate.

use tracing::debug;
use url::Url;

use crate::safe_url::looks_like_url;
use crate::validate::Gate;

const FAVICON_BASE_URL: &str = "https://www.google.com/s2/favicons";

/// Product names with a known canonical domain.
pub const KNOWN_PRODUCT_DOMAINS: &[(&str, &str)] = &[
    ("Figma", "figma.com"),
    ("Notion", "notion.so"),
    ("Duolingo", "duolingo.com"),
    ("Spotify", "spotify.com"),
    ("ChatGPT", "openai.com"),
    ("Linear", "linear.app"),
];

/// Products offered as one-click examples.
pub const EXAMPLE_PRODUCTS: &[&str] = &["Figma", "Notion", "Duolingo", "Spotify", "ChatGPT", "Linear"];

/// Domain for a known product name, matched case-insensitively.
pub fn known_domain(product: &str) -> Option<&'static str> {
    let product = product.trim();
    KNOWN_PRODUCT_DOMAINS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(product))
        .map(|&(_, domain)| domain)
}

fn favicon_for(domain: &str) -> Option<String> {
    Url::parse_with_params(FAVICON_BASE_URL, &[("domain", domain), ("sz", "128")])
        .ok()
        .map(String::from)
}

/// Favicon URL for a product name or product URL, or `None` when the name is
/// unknown or the URL fails the gate.
pub async fn favicon_url(gate: &Gate, input: &str) -> Option<String> {
    let input = input.trim();
    if !looks_like_url(input) {
        return known_domain(input).and_then(favicon_for);
    }

    match gate.validate(input).await {
        Ok(validated) => favicon_for(&validated.host),
        Err(e) => {
            debug!("favicon: no icon for rejected URL: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;
    use crate::resolver::StaticResolver;
    use std::net::IpAddr;

    fn gate() -> Gate {
        let resolver = StaticResolver::new()
            .with("www.figma.com", ["93.184.216.34".parse::<IpAddr>().unwrap()])
            .with("intranet.example", ["10.0.0.8".parse::<IpAddr>().unwrap()]);
        Gate::new(Policy::public_only(), resolver)
    }

    #[test]
    fn test_known_domain() {
        assert_eq!(known_domain("Figma"), Some("figma.com"));
        assert_eq!(known_domain("  chatgpt "), Some("openai.com"));
        assert_eq!(known_domain("Acme"), None);
    }

    #[test]
    fn test_examples_all_have_domains() {
        for product in EXAMPLE_PRODUCTS {
            assert!(known_domain(product).is_some(), "{}", product);
        }
    }

    #[tokio::test]
    async fn test_known_name() {
        assert_eq!(
            favicon_url(&gate(), "notion").await.as_deref(),
            Some("https://www.google.com/s2/favicons?domain=notion.so&sz=128")
        );
    }

    #[tokio::test]
    async fn test_unknown_name_is_not_guessed() {
        assert_eq!(favicon_url(&gate(), "Acme Widgets").await, None);
    }

    #[tokio::test]
    async fn test_safe_url_uses_host() {
        assert_eq!(
            favicon_url(&gate(), "https://WWW.Figma.com/pricing").await.as_deref(),
            Some("https://www.google.com/s2/favicons?domain=www.figma.com&sz=128")
        );
    }

    #[tokio::test]
    async fn test_unsafe_url_has_no_icon() {
        assert_eq!(favicon_url(&gate(), "http://intranet.example/").await, None);
        assert_eq!(favicon_url(&gate(), "http://127.0.0.1/").await, None);
        assert_eq!(favicon_url(&gate(), "ftp://www.figma.com/").await, None);
    }
}
