//! Raw HTML → queryable [`Document`].
//!
//! html5ever (via `scraper`) never rejects input, so malformed markup degrades to
//! whatever tree the tokenizer recovers. The only page-level failures are the
//! ones that leave nothing to parse.

use std::collections::BTreeMap;

use scraper::{ElementRef, Html, Node, Selector};

use crate::error::ExtractError;
use crate::types::{ImageElement, RawPage};

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "head", "iframe", "object", "canvas",
];

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "details", "dialog", "div",
    "dl", "dt", "fieldset", "figcaption", "figure", "footer", "form", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul", "option", "label", "button", "caption",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    Heading { level: u8, text: String },
    /// A text run; `<br>` inside it becomes a line break.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HreflangLink {
    pub lang: String,
    pub href: String,
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub url: String,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub lang: Option<String>,
    pub canonical: Option<String>,
    /// Keys are lower-cased `name` / `property` / `http-equiv` values; first tag wins.
    pub meta: BTreeMap<String, String>,
    /// Headings and text runs in document order.
    pub blocks: Vec<Block>,
    pub images: Vec<ImageElement>,
    pub jsonld: Vec<String>,
    pub hreflang: Vec<HreflangLink>,
    pub iframes: Vec<String>,
}

impl Document {
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta
            .get(key)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }

    pub fn headings(&self) -> impl Iterator<Item = (u8, &str)> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Heading { level, text } => Some((*level, text.as_str())),
            Block::Text(_) => None,
        })
    }

    /// Visible text, one block per line.
    pub fn text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Heading { text, .. } | Block::Text(text) => text.as_str(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Parse one crawled page. Fails only for pages that carry nothing to parse.
pub fn normalize(page: &RawPage) -> Result<Document, ExtractError> {
    if page.url.trim().is_empty() {
        return Err(ExtractError::Validation("page has an empty url".into()));
    }
    if let Some(err) = &page.fetch_error {
        return Err(ExtractError::fetch(&page.url, err.clone()));
    }
    if page.html.trim().is_empty() {
        return Err(ExtractError::parse(&page.url, "empty document"));
    }

    let html = Html::parse_document(&page.html);
    let mut doc = Document {
        url: page.url.clone(),
        ..Default::default()
    };

    extract_head(&html, &mut doc);
    extract_meta(&html, &mut doc);
    extract_links(&html, &mut doc);
    extract_jsonld(&html, &mut doc);
    extract_iframes(&html, &mut doc);
    extract_images(&html, &mut doc);

    let mut writer = BlockWriter::default();
    writer.walk(html.root_element());
    writer.flush();
    doc.blocks = writer.blocks;

    // Crawler-supplied values win when present; the document fills the gaps.
    if let Some(title) = non_empty(&page.title) {
        doc.title = Some(title);
    }
    if let Some(desc) = non_empty(&page.meta_description) {
        doc.meta_description = Some(desc);
    }
    if doc.images.is_empty() {
        doc.images = page.image_elements.clone();
    }

    Ok(doc)
}

// ── Head ──

fn extract_head(html: &Html, doc: &mut Document) {
    let title_sel = Selector::parse("title").unwrap();
    doc.title = html
        .select(&title_sel)
        .next()
        .map(|el| collapse_ws(&el.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    doc.lang = html
        .root_element()
        .value()
        .attr("lang")
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
}

fn extract_meta(html: &Html, doc: &mut Document) {
    let sel = Selector::parse("meta[content]").unwrap();
    for el in html.select(&sel) {
        let attrs = el.value();
        let key = attrs
            .attr("name")
            .or_else(|| attrs.attr("property"))
            .or_else(|| attrs.attr("http-equiv"));
        let (Some(key), Some(content)) = (key, attrs.attr("content")) else {
            continue;
        };
        let key = key.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        doc.meta
            .entry(key)
            .or_insert_with(|| collapse_ws(content));
    }
    doc.meta_description = doc.meta("description").map(str::to_string);
}

fn extract_links(html: &Html, doc: &mut Document) {
    let sel = Selector::parse("link[href]").unwrap();
    for el in html.select(&sel) {
        let attrs = el.value();
        let href = attrs.attr("href").unwrap_or("").trim();
        if href.is_empty() {
            continue;
        }
        let rel = attrs.attr("rel").unwrap_or("").to_lowercase();
        let rels: Vec<&str> = rel.split_whitespace().collect();

        if rels.contains(&"canonical") && doc.canonical.is_none() {
            doc.canonical = Some(href.to_string());
        }
        if let Some(lang) = attrs.attr("hreflang").map(str::trim).filter(|l| !l.is_empty()) {
            if rels.is_empty() || rels.contains(&"alternate") {
                doc.hreflang.push(HreflangLink {
                    lang: lang.to_string(),
                    href: href.to_string(),
                });
            }
        }
    }
}

fn extract_jsonld(html: &Html, doc: &mut Document) {
    let sel = Selector::parse("script[type]").unwrap();
    for el in html.select(&sel) {
        let ty = el.value().attr("type").unwrap_or("");
        let mime = ty.split(';').next().unwrap_or("").trim();
        if !mime.eq_ignore_ascii_case("application/ld+json") {
            continue;
        }
        let body: String = el.text().collect();
        if !body.trim().is_empty() {
            doc.jsonld.push(body);
        }
    }
}

fn extract_iframes(html: &Html, doc: &mut Document) {
    let sel = Selector::parse("iframe[src]").unwrap();
    doc.iframes = html
        .select(&sel)
        .filter_map(|el| el.value().attr("src"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
}

fn extract_images(html: &Html, doc: &mut Document) {
    let sel = Selector::parse("img").unwrap();
    doc.images = html
        .select(&sel)
        .map(|el| {
            let attrs = el.value();
            let src = attrs
                .attr("src")
                .or_else(|| attrs.attr("data-src"))
                .unwrap_or("")
                .trim()
                .to_string();
            ImageElement {
                src,
                alt: attrs.attr("alt").map(str::to_string),
            }
        })
        .collect();
}

// ── Body text ──

#[derive(Default)]
struct BlockWriter {
    blocks: Vec<Block>,
    buf: String,
}

impl BlockWriter {
    fn walk(&mut self, element: ElementRef<'_>) {
        for child in element.children() {
            match child.value() {
                // source newlines are plain whitespace; only <br> breaks a line
                Node::Text(text) => self
                    .buf
                    .extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c })),
                Node::Element(el) => {
                    let name = el.name();
                    if SKIPPED_TAGS.contains(&name) {
                        continue;
                    }
                    if name == "br" {
                        self.buf.push('\n');
                        continue;
                    }
                    let Some(child_el) = ElementRef::wrap(child) else {
                        continue;
                    };
                    if let Some(level) = heading_level(name) {
                        self.flush();
                        let text = collapse_ws(&child_el.text().collect::<String>());
                        if !text.is_empty() {
                            self.blocks.push(Block::Heading { level, text });
                        }
                        continue;
                    }
                    let is_block = BLOCK_TAGS.contains(&name);
                    if is_block {
                        self.flush();
                    }
                    self.walk(child_el);
                    if is_block {
                        self.flush();
                    }
                }
                _ => {}
            }
        }
    }

    fn flush(&mut self) {
        let text = self
            .buf
            .split('\n')
            .map(collapse_ws)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        self.buf.clear();
        if !text.is_empty() {
            self.blocks.push(Block::Text(text));
        }
    }
}

fn heading_level(tag: &str) -> Option<u8> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    let t = collapse_ws(s);
    (!t.is_empty()).then_some(t)
}

// ── Tests ──
