//! Visible-text extraction from product landing pages.

use scraper::node::Node;
use scraper::{ElementRef, Html};
use tracing::debug;

use crate::fetch::Fetcher;
use crate::prompt::truncate_with_marker;

/// Elements whose whole subtree is boilerplate or non-visible.
const SKIPPED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "noscript"];

/// Extract readable text from an HTML document, one trimmed text node per
/// line.
pub fn extract_page_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut lines = Vec::new();
    collect_text(document.root_element(), &mut lines);
    lines.join("\n")
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    lines.push(text.to_string());
                }
            }
            Node::Element(el) if SKIPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, lines);
                }
            }
            _ => {}
        }
    }
}

/// Fetch `url` through the gate and return its visible text, cut to
/// `max_chars` characters.
///
/// Any failure yields `None`; the analysis proceeds without page context.
pub async fn scrape_url(fetcher: &Fetcher, url: &str, max_chars: usize) -> Option<String> {
    let page = match fetcher.fetch(url).await {
        Ok(page) => page,
        Err(e) => {
            debug!("scrape: skipping {}: {}", url, e);
            return None;
        }
    };

    let text = extract_page_text(&page.body);
    if text.is_empty() {
        debug!("scrape: no visible text at {}", page.final_url);
        return None;
    }

    Some(truncate_with_marker(&text, max_chars))
}
