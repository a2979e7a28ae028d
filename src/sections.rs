//! Splitting an analysis into `##` sections and rendering it as sanitized
//! HTML.

use std::collections::{HashMap, HashSet};

use pulldown_cmark::{html, Event, Options, Parser};

/// Tags that survive sanitization. Everything else is stripped, keeping its
/// text.
const ALLOWED_TAGS: &[&str] = &[
    "p", "br", "strong", "em", "b", "i", "u", "code", "pre", "h1", "h2", "h3", "h4", "ul", "ol",
    "li", "a", "hr", "table", "thead", "tbody", "tr", "td", "th", "blockquote",
];

const ALLOWED_LINK_ATTRS: &[&str] = &["href", "title"];

/// One `## ` section of an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Position in the analysis, starting at 0.
    pub index: usize,
    pub title: String,
    pub slug: String,
    /// Section markdown, always starting with `## `.
    pub markdown: String,
}

impl Section {
    fn new(index: usize, markdown: String) -> Self {
        let first_line = markdown.lines().next().unwrap_or("");
        let title = match first_line.strip_prefix("## ") {
            Some(title) => title.trim().to_string(),
            None => format!("Section {}", index + 1),
        };
        let slug = slugify(&title).unwrap_or_else(|| format!("section-{}", index));
        Self {
            index,
            title,
            slug,
            markdown,
        }
    }

    /// Element id for in-page links. Unique even when two titles share a slug.
    pub fn anchor(&self) -> String {
        format!("section-{}-{}", self.slug, self.index)
    }

    pub fn to_html(&self) -> String {
        markdown_to_safe_html(&self.markdown)
    }
}

/// Lowercase ASCII alphanumerics with every other run collapsed to `-`.
fn slugify(title: &str) -> Option<String> {
    let mut slug = String::with_capacity(title.len());
    for c in title.to_lowercase().chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            slug.push(c);
        } else if !slug.ends_with('-') {
            slug.push('-');
        }
    }
    let slug = slug.trim_matches('-');
    (!slug.is_empty()).then(|| slug.to_string())
}

/// Split model output on `\n## ` into sections.
///
/// Text before the first heading becomes its own section with `## `
/// prepended, so every section renders with a heading. Blank input yields
/// no sections.
pub fn parse_analysis_sections(markdown: &str) -> Vec<Section> {
    let text = markdown.trim();
    if text.is_empty() {
        return Vec::new();
    }

    text.split("\n## ")
        .enumerate()
        .filter_map(|(i, part)| {
            let part = part.trim();
            if part.is_empty() {
                None
            } else if i == 0 && part.starts_with("## ") {
                Some(part.to_string())
            } else {
                Some(format!("## {}", part))
            }
        })
        .enumerate()
        .map(|(index, markdown)| Section::new(index, markdown))
        .collect()
}

/// Render untrusted markdown to HTML restricted to a small structural
/// allowlist. Links keep only `href` and `title`, and unsafe URL schemes are
/// dropped.
pub fn markdown_to_safe_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);

    // single newlines inside a paragraph become <br>
    let parser = Parser::new_ext(markdown, options).map(|event| match event {
        Event::SoftBreak => Event::HardBreak,
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    let tags: HashSet<&str> = ALLOWED_TAGS.iter().copied().collect();
    let link_attrs: HashSet<&str> = ALLOWED_LINK_ATTRS.iter().copied().collect();
    let tag_attributes = HashMap::from([("a", link_attrs)]);

    ammonia::Builder::default()
        .tags(tags)
        .tag_attributes(tag_attributes)
        .generic_attributes(HashSet::new())
        .clean(&html_output)
        .to_string()
}

const REPORT_STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem;color:#1f2933}\
.analysis-index{margin:1rem 0 2rem;line-height:1.8}\
.analysis-index a{margin-right:.75rem}\
.analysis-section-card{border:1px solid #d9e2ec;border-radius:8px;padding:1rem 1.5rem;margin-bottom:1.5rem}\
table{border-collapse:collapse}td,th{border:1px solid #d9e2ec;padding:.35rem .6rem}\
img.favicon{width:40px;height:40px;vertical-align:middle;margin-right:.5rem}";

/// Render a standalone HTML report with a "Jump to" index and one card per
/// section. Text outside the sections is escaped; `favicon` should come from
/// [`favicon_url`](crate::favicon_url).
pub fn render_report_html(product: &str, markdown: &str, favicon: Option<&str>) -> String {
    let sections = parse_analysis_sections(markdown);
    let product = ammonia::clean_text(product.trim());

    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>Product analysis: {}</title>\n", product));
    out.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", REPORT_STYLE));

    out.push_str("<h1>");
    if let Some(favicon) = favicon {
        out.push_str(&format!(
            "<img class=\"favicon\" src=\"{}\" alt=\"\">",
            ammonia::clean_text(favicon)
        ));
    }
    out.push_str(&format!("Product analysis: {}</h1>\n", product));

    if !sections.is_empty() {
        let links: Vec<String> = sections
            .iter()
            .map(|s| {
                format!(
                    "<a href=\"#{}\">{}</a>",
                    s.anchor(),
                    ammonia::clean_text(&s.title)
                )
            })
            .collect();
        out.push_str(&format!(
            "<div class=\"analysis-index\"><strong>Jump to:</strong> {}</div>\n",
            links.join(" ")
        ));
    }

    for section in &sections {
        out.push_str(&format!(
            "<div id=\"{}\" class=\"analysis-section-card\">{}</div>\n",
            section.anchor(),
            section.to_html()
        ));
    }

    out.push_str("</body>\n</html>\n");
    out
}
