use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Input ──

/// One page as delivered by the crawler. Never mutated after it is received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPage {
    pub url: String,
    pub html: String,
    pub title: String,
    pub meta_description: String,
    #[serde(alias = "images")]
    pub image_elements: Vec<ImageElement>,
    pub status: Option<u16>,
    pub fetch_error: Option<String>,
}

impl RawPage {
    pub fn new(url: impl Into<String>, html: impl Into<String>) -> Self {
        RawPage {
            url: url.into(),
            html: html.into(),
            ..Default::default()
        }
    }

    /// Build a page from undecoded bytes; invalid UTF-8 sequences become U+FFFD.
    pub fn from_bytes(url: impl Into<String>, bytes: &[u8]) -> Self {
        RawPage::new(url, String::from_utf8_lossy(bytes).into_owned())
    }

    /// A placeholder for a URL the crawler could not retrieve.
    pub fn failed(url: impl Into<String>, error: impl Into<String>) -> Self {
        RawPage {
            url: url.into(),
            fetch_error: Some(error.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageElement {
    #[serde(default)]
    pub src: String,
    /// `None` when the element has no alt attribute at all.
    #[serde(default)]
    pub alt: Option<String>,
}

// ── Structured data ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaType {
    Organization,
    LocalBusiness,
    #[serde(rename = "FAQPage")]
    FaqPage,
    Product,
    Article,
    Unknown,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Organization => "Organization",
            SchemaType::LocalBusiness => "LocalBusiness",
            SchemaType::FaqPage => "FAQPage",
            SchemaType::Product => "Product",
            SchemaType::Article => "Article",
            SchemaType::Unknown => "Unknown",
        }
    }

    pub fn is_business(&self) -> bool {
        matches!(self, SchemaType::Organization | SchemaType::LocalBusiness)
    }
}

/// One JSON-LD object, classified by its `@type`. Raw fields are kept for every variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredBlock {
    pub schema_type: SchemaType,
    /// Raw `@type` values in declaration order.
    pub types: Vec<String>,
    pub fields: Map<String, Value>,
}

impl StructuredBlock {
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Trimmed, non-empty string value of `key`.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn name(&self) -> Option<&str> {
        self.text("name")
    }

    pub fn has_type(&self, ty: &str) -> bool {
        self.types.iter().any(|t| t == ty)
    }
}

// ── Per-page signals ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaqConfidence {
    Structured,
    Heuristic,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
    pub confidence: FaqConfidence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AltTextClass {
    Missing,
    Empty,
    Weak,
    Ok,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageIssue {
    pub src: String,
    pub class: AltTextClass,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AltTextCounts {
    pub missing: usize,
    pub empty: usize,
    pub weak: usize,
    pub ok: usize,
}

impl AltTextCounts {
    pub fn issue_count(&self) -> usize {
        self.missing + self.empty + self.weak
    }

    pub fn add(&mut self, other: &AltTextCounts) {
        self.missing += other.missing;
        self.empty += other.empty;
        self.weak += other.weak;
        self.ok += other.ok;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAudit {
    pub counts: AltTextCounts,
    /// Offending images, capped at the configured maximum.
    pub issues: Vec<ImageIssue>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    StructuredAddress,
    GeoMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoSignals {
    pub location: Option<String>,
    pub location_source: Option<LocationSource>,
    pub hreflang: Vec<String>,
    pub has_geo_meta: bool,
    pub has_map_embed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermCount {
    pub term: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageSignals {
    pub url: String,
    pub brand_candidate: Option<String>,
    pub description: Option<String>,
    pub lang: Option<String>,
    pub faqs: Vec<Faq>,
    pub image_audit: ImageAudit,
    pub geo: GeoSignals,
    pub topics: Vec<TermCount>,
    pub products: Vec<String>,
    pub structured_blocks: Vec<StructuredBlock>,
}

// ── Site-level output ──

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoReadiness {
    pub hreflang: Vec<String>,
    pub has_hreflang: bool,
    pub has_geo_meta: bool,
    pub has_map_embed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalBundle {
    pub brand_name: Option<String>,
    pub description: Option<String>,
    pub products: Vec<String>,
    pub location: Option<String>,
    pub faqs: Vec<Faq>,
    pub topics: Vec<String>,
    pub competitors: Vec<String>,
    pub image_issue_count: usize,
    pub alt_text: AltTextCounts,
    pub image_issues: Vec<ImageIssue>,
    pub schema_types: Vec<String>,
    pub geo: GeoReadiness,
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub site_id: String,
    pub url: String,
    pub pages_crawled: usize,
    pub pages_failed: usize,
    pub signal_bundle: SignalBundle,
    pub success: bool,
    pub partial: bool,
    pub issues: Vec<String>,
    pub created_at: DateTime<Utc>,
}
