//! Content extraction from fetched HTML
//!
//! Turns a raw response body into a title, a bounded plain-text body and the outbound
//! links of the page. The DOM pass (scraper/html5ever) is tried first; when it yields
//! nothing usable, a lenient tag stripper runs over the raw text instead.

use crate::url::canonicalize_parsed;
use scraper::node::Node;
use scraper::{Html, Selector};
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Subtrees that never contribute text or links
const SKIPPED_ELEMENTS: &[&str] = &[
    "head", "script", "style", "nav", "footer", "header", "aside", "form", "noscript",
    "template", "svg", "iframe",
];

/// Elements rendered inside a line; every other element breaks words apart
const INLINE_ELEMENTS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "big", "cite", "code", "data", "del", "dfn", "em",
    "font", "i", "ins", "kbd", "label", "mark", "q", "s", "samp", "small", "span", "strong",
    "sub", "sup", "time", "tt", "u", "var",
];

/// Errors that drop a page during extraction
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("response body is empty")]
    EmptyBody,

    #[error("no title, text or links could be extracted")]
    NoContent,
}

/// Caps applied to an extracted page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractLimits {
    /// Content is truncated to this many characters
    pub max_content_chars: usize,

    /// At most this many distinct links are returned
    pub max_links: usize,
}

/// Result of extracting one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedPage {
    /// `<title>` text, or the page URL when there is none
    pub title: String,

    /// Visible text, whitespace-normalized and truncated
    pub content: String,

    /// Distinct absolute http(s) links without fragments, in document order
    pub links: Vec<Url>,
}

/// Extracts title, text and links from a response body
///
/// Invalid UTF-8 sequences are skipped. Truncation is silent and always keeps the
/// prefix of the normalized text.
///
/// # Example
///
/// ```
/// use newt::crawler::{extract, ExtractLimits};
/// use url::Url;
///
/// let html = br#"<html><head><title>A</title></head>
///     <body><p>hello world</p><a href="/b"></a></body></html>"#;
/// let page_url = Url::parse("https://example.test/a").unwrap();
/// let limits = ExtractLimits { max_content_chars: 100, max_links: 10 };
///
/// let page = extract(html, &page_url, &limits).unwrap();
/// assert_eq!(page.title, "A");
/// assert_eq!(page.content, "hello world");
/// assert_eq!(page.links[0].as_str(), "https://example.test/b");
/// ```
pub fn extract(
    body: &[u8],
    page_url: &Url,
    limits: &ExtractLimits,
) -> Result<ExtractedPage, ExtractError> {
    let text = decode_lossy(body);
    if text.trim().is_empty() {
        return Err(ExtractError::EmptyBody);
    }

    let raw = extract_dom(&text, limits.max_content_chars)
        .or_else(|| extract_lenient(&text, limits.max_content_chars))
        .ok_or(ExtractError::NoContent)?;

    Ok(ExtractedPage {
        title: raw.title.unwrap_or_else(|| page_url.to_string()),
        content: truncate_chars(&raw.content, limits.max_content_chars),
        links: resolve_links(&raw.hrefs, page_url, limits.max_links),
    })
}

/// Output of one parsing strategy, before limits and link resolution
#[derive(Debug, Default)]
struct RawPage {
    title: Option<String>,
    content: String,
    hrefs: Vec<String>,
}

impl RawPage {
    fn is_useful(&self) -> bool {
        self.title.is_some() || !self.content.is_empty() || !self.hrefs.is_empty()
    }
}

/// Collects whitespace-normalized text until the buffer passes `limit` characters
///
/// Text nodes are joined as written; a single space is emitted only where the source
/// has whitespace or a block boundary.
#[derive(Debug)]
struct TextBuffer {
    text: String,
    chars: usize,
    limit: usize,
    pending_space: bool,
}

impl TextBuffer {
    fn new(limit: usize) -> Self {
        Self {
            text: String::new(),
            chars: 0,
            limit,
            pending_space: false,
        }
    }

    fn push(&mut self, fragment: &str) {
        for c in fragment.chars() {
            if self.chars > self.limit {
                return;
            }
            if c.is_whitespace() {
                self.pending_space = true;
                continue;
            }
            if self.pending_space && !self.text.is_empty() {
                self.text.push(' ');
                self.chars += 1;
            }
            self.pending_space = false;
            self.text.push(c);
            self.chars += 1;
        }
    }

    /// Marks a block boundary: the next word starts after a space
    fn break_word(&mut self) {
        self.pending_space = true;
    }
}

fn decode_lossy(body: &[u8]) -> String {
    String::from_utf8_lossy(body)
        .chars()
        .filter(|&c| c != char::REPLACEMENT_CHARACTER)
        .collect()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

fn extract_dom(html: &str, max_chars: usize) -> Option<RawPage> {
    let document = Html::parse_document(html);

    let title = Selector::parse("title").ok().and_then(|selector| {
        document
            .select(&selector)
            .next()
            .map(|element| normalize_whitespace(&element.text().collect::<String>()))
            .filter(|s| !s.is_empty())
    });

    let mut buffer = TextBuffer::new(max_chars);
    let mut hrefs = Vec::new();

    // Explicit stack instead of recursion: nesting depth is attacker-controlled.
    // `None` marks the end of a block element.
    let mut stack = vec![Some(document.tree.root())];
    while let Some(step) = stack.pop() {
        let Some(node) = step else {
            buffer.break_word();
            continue;
        };
        match node.value() {
            Node::Text(text) => buffer.push(text),
            Node::Element(element) => {
                if SKIPPED_ELEMENTS.contains(&element.name()) {
                    continue;
                }
                if element.name() == "a" && element.attr("download").is_none() {
                    if let Some(href) = element.attr("href") {
                        hrefs.push(href.to_string());
                    }
                }
                if !INLINE_ELEMENTS.contains(&element.name()) {
                    buffer.break_word();
                    stack.push(None);
                }
                stack.extend(node.children().rev().map(Some));
            }
            Node::Document | Node::Fragment => stack.extend(node.children().rev().map(Some)),
            _ => {}
        }
    }

    let page = RawPage {
        title,
        content: buffer.text,
        hrefs,
    };
    page.is_useful().then_some(page)
}

/// Tag stripper for markup the DOM pass cannot make sense of
fn extract_lenient(html: &str, max_chars: usize) -> Option<RawPage> {
    let lower = html.to_ascii_lowercase();
    let title = find_between(html, &lower, "<title", "</title>")
        .map(|inner| normalize_whitespace(&decode_entities(inner)))
        .filter(|s| !s.is_empty());

    let mut buffer = TextBuffer::new(max_chars);
    let mut hrefs = Vec::new();
    let mut pos = 0;

    while pos < html.len() {
        let Some(offset) = html[pos..].find('<') else {
            buffer.push(&decode_entities(&html[pos..]));
            break;
        };
        let tag_start = pos + offset;
        buffer.push(&decode_entities(&html[pos..tag_start]));

        let Some(tag_len) = html[tag_start..].find('>') else {
            break;
        };
        let tag_end = tag_start + tag_len + 1;
        let tag = &lower[tag_start..tag_end];

        let name = tag_name(tag);
        if !name.is_empty() && !INLINE_ELEMENTS.contains(&name) {
            buffer.break_word();
        }

        pos = if let Some(block_end) = skipped_block_end(&lower, tag, tag_end) {
            block_end
        } else {
            if tag.starts_with("<a ") {
                if let Some(href) = attribute_value(&html[tag_start..tag_end], "href") {
                    hrefs.push(href);
                }
            }
            tag_end
        };
    }

    let page = RawPage {
        title,
        content: buffer.text,
        hrefs,
    };
    page.is_useful().then_some(page)
}

/// For an opening tag of a skipped element, returns the index just past its closing tag
fn skipped_block_end(lower: &str, tag: &str, tag_end: usize) -> Option<usize> {
    let name: String = tag[1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    if !SKIPPED_ELEMENTS.contains(&name.as_str()) {
        return None;
    }
    let closing = format!("</{}", name);
    Some(match lower[tag_end..].find(&closing) {
        Some(i) => {
            let close_start = tag_end + i;
            lower[close_start..]
                .find('>')
                .map(|j| close_start + j + 1)
                .unwrap_or(lower.len())
        }
        None => lower.len(),
    })
}

/// Element name of an opening or closing tag, empty for comments and doctypes
fn tag_name(tag: &str) -> &str {
    let name = tag
        .trim_start_matches('<')
        .trim_start_matches('/');
    let end = name
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(name.len());
    &name[..end]
}

/// Returns the text between an opening tag (attributes allowed) and its closing tag
fn find_between<'a>(html: &'a str, lower: &str, open: &str, close: &str) -> Option<&'a str> {
    let start = lower.find(open)?;
    let content_start = start + lower[start..].find('>')? + 1;
    let content_end = content_start + lower[content_start..].find(close)?;
    html.get(content_start..content_end)
}

fn attribute_value(tag: &str, name: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let mut search_from = 0;
    while let Some(i) = lower[search_from..].find(name) {
        let at = search_from + i;
        search_from = at + name.len();
        let preceded_by_space = lower[..at]
            .chars()
            .last()
            .map_or(false, |c| c.is_ascii_whitespace());
        let rest = lower[search_from..].trim_start();
        if !preceded_by_space || !rest.starts_with('=') {
            continue;
        }
        let value_start = tag.len() - rest.len() + 1;
        let value = tag[value_start..].trim_start();
        return match value.chars().next() {
            Some(quote @ ('"' | '\'')) => value[1..].split(quote).next().map(str::to_string),
            Some(_) => value
                .split(|c: char| c.is_ascii_whitespace() || c == '>')
                .next()
                .map(str::to_string),
            None => None,
        };
    }
    None
}

fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// Resolves hrefs against the page URL, keeping distinct http(s) links up to `max`
fn resolve_links(hrefs: &[String], page_url: &Url, max: usize) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for href in hrefs {
        if links.len() >= max {
            break;
        }
        let href = href.trim();
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(joined) = page_url.join(href) else {
            continue;
        };
        let Ok(link) = canonicalize_parsed(joined) else {
            continue;
        };
        if seen.insert(link.as_str().to_string()) {
            links.push(link);
        }
    }

    links
}
