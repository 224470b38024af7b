//! Engine settings and the heuristic tables every deriver reads.
//!
//! Tables are plain data in [`HeuristicConfig`] so they can be overridden from a
//! settings file; [`HeuristicConfig::compile`] turns them into the lookup-ready
//! [`Heuristics`] shared (read-only) by all page workers.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const HEURISTICS_VERSION: &str = "2024.1";

const TITLE_SEPARATORS: &[&str] = &["|", "-", "–", "—", "·", "•", ":", "»", "~"];

const TITLE_SUFFIXES: &[&str] = &[
    "home",
    "homepage",
    "home page",
    "welcome",
    "official site",
    "official website",
    "official",
    "main page",
    "index",
];

const GENERIC_ALT_PHRASES: &[&str] = &[
    "image", "img", "photo", "picture", "pic", "icon", "logo", "graphic", "banner",
    "thumbnail", "placeholder", "untitled", "spacer",
];

const MAP_PROVIDERS: &[&str] = &[
    "maps.google.",
    "google.com/maps",
    "maps.googleapis.com",
    "openstreetmap.org",
    "bing.com/maps",
    "maps.apple.com",
    "api.mapbox.com",
    "here.com",
    "waze.com",
];

const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "him", "his", "how", "its", "may", "new", "now", "old", "see",
    "two", "way", "who", "did", "get", "let", "say", "she", "too", "use", "yes", "yet", "via",
    "this", "that", "with", "from", "they", "have", "been", "were", "said", "each", "which",
    "their", "time", "will", "about", "there", "could", "other", "after", "first", "well",
    "also", "where", "much", "some", "these", "would", "into", "more", "very", "what", "know",
    "just", "over", "think", "back", "work", "only", "still", "should", "because", "through",
    "before", "here", "when", "take", "than", "them", "then", "your", "yours", "ours", "like",
    "make", "many", "such", "come", "long", "down", "find", "most", "does", "done", "being",
    "while", "every", "within", "without", "those", "both", "same", "own", "off", "why", "per",
    "out", "upon", "onto", "across", "again", "further", "once", "above", "below", "between",
    "under", "until", "during", "against", "among", "whether", "ever", "even", "need", "needs",
    "get", "gets", "got", "read", "more", "learn", "click", "contact", "home", "page", "menu",
    "copyright", "rights", "reserved", "privacy", "policy", "terms", "cookies", "cookie",
];

/// Capitalised words that never begin or end a competitor candidate.
const CONNECTOR_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "our", "your", "my", "we", "i", "you", "why", "how", "what",
    "when", "where", "who", "with", "for", "at", "in", "on", "of", "to", "by", "from", "this",
    "that", "is", "are", "it", "if", "all", "new", "get", "see", "vs", "about",
];

const COMPETITOR_EXCLUSIONS: &[&str] = &[
    "privacy policy",
    "cookie policy",
    "terms of service",
    "terms and conditions",
    "terms conditions",
    "all rights reserved",
    "rights reserved",
    "contact us",
    "about us",
    "read more",
    "learn more",
    "sign up",
    "sign in",
    "log in",
    "get started",
    "shop now",
    "buy now",
    "frequently asked questions",
    "customer service",
    "customer support",
    "follow us",
    "subscribe now",
    "united states",
    "united kingdom",
    "new york",
    "los angeles",
    "san francisco",
    "monday friday",
    "saturday sunday",
];

const PRODUCT_PATTERNS: &[&str] = &[
    r"(?i)\b(?:product|service|solution|package|plan|kit|collection|suite|platform|app|subscription|bundle)s?\b",
];

// ── Settings ──

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub heuristics: HeuristicConfig,
    pub db_path: Option<String>,
}

impl Settings {
    /// Defaults, then an optional settings file, then `AEO_*` environment
    /// variables (`AEO_ENGINE__MAX_PAGES=20`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(p) = path {
            builder = builder.add_source(config::File::from(p));
        }
        let settings: Settings = builder
            .add_source(
                config::Environment::with_prefix("AEO")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;
        settings.engine.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on page workers (and on pages requested from the crawler).
    pub max_pages: usize,
    /// Wall-clock budget for the per-page phase of one audit.
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_pages: 15,
            timeout_secs: 30,
        }
    }
}

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_pages == 0 {
            return Err(ConfigError::Invalid {
                key: "engine.max_pages",
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicConfig {
    pub version: String,
    pub title_separators: Vec<String>,
    pub title_suffixes: Vec<String>,
    pub brand_domain_fallback: bool,
    pub generic_alt_phrases: Vec<String>,
    pub min_alt_len: usize,
    pub max_image_issues: usize,
    pub map_providers: Vec<String>,
    pub stopwords: Vec<String>,
    pub min_token_len: usize,
    pub heading_weight: usize,
    pub top_k: usize,
    pub connector_words: Vec<String>,
    pub competitor_exclusions: Vec<String>,
    pub min_occurrences: usize,
    pub max_competitors: usize,
    pub product_patterns: Vec<String>,
    pub max_product_len: usize,
    pub max_products: usize,
}

fn owned(table: &[&str]) -> Vec<String> {
    table.iter().map(|s| s.to_string()).collect()
}

impl Default for HeuristicConfig {
    fn default() -> Self {
        HeuristicConfig {
            version: HEURISTICS_VERSION.to_string(),
            title_separators: owned(TITLE_SEPARATORS),
            title_suffixes: owned(TITLE_SUFFIXES),
            brand_domain_fallback: false,
            generic_alt_phrases: owned(GENERIC_ALT_PHRASES),
            min_alt_len: 3,
            max_image_issues: 50,
            map_providers: owned(MAP_PROVIDERS),
            stopwords: owned(STOPWORDS),
            min_token_len: 3,
            heading_weight: 2,
            top_k: 10,
            connector_words: owned(CONNECTOR_WORDS),
            competitor_exclusions: owned(COMPETITOR_EXCLUSIONS),
            min_occurrences: 2,
            max_competitors: 20,
            product_patterns: owned(PRODUCT_PATTERNS),
            max_product_len: 80,
            max_products: 25,
        }
    }
}

impl HeuristicConfig {
    pub fn compile(&self) -> Result<Heuristics, ConfigError> {
        let product_patterns = self
            .product_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| ConfigError::Pattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Heuristics {
            version: self.version.clone(),
            title_separators: self.title_separators.clone(),
            title_suffixes: lowered(&self.title_suffixes),
            brand_domain_fallback: self.brand_domain_fallback,
            generic_alt_phrases: lowered(&self.generic_alt_phrases),
            min_alt_len: self.min_alt_len,
            max_image_issues: self.max_image_issues,
            map_providers: self.map_providers.iter().map(|s| s.to_lowercase()).collect(),
            stopwords: lowered(&self.stopwords),
            min_token_len: self.min_token_len,
            heading_weight: self.heading_weight.max(1),
            top_k: self.top_k,
            connector_words: lowered(&self.connector_words),
            competitor_exclusions: lowered(&self.competitor_exclusions),
            min_occurrences: self.min_occurrences.max(1),
            max_competitors: self.max_competitors,
            product_patterns,
            max_product_len: self.max_product_len,
            max_products: self.max_products,
        })
    }
}

fn lowered(table: &[String]) -> HashSet<String> {
    table.iter().map(|s| s.trim().to_lowercase()).collect()
}

/// Compiled, read-only view of [`HeuristicConfig`].
#[derive(Debug, Clone)]
pub struct Heuristics {
    pub version: String,
    pub title_separators: Vec<String>,
    pub title_suffixes: HashSet<String>,
    pub brand_domain_fallback: bool,
    pub generic_alt_phrases: HashSet<String>,
    pub min_alt_len: usize,
    pub max_image_issues: usize,
    pub map_providers: Vec<String>,
    pub stopwords: HashSet<String>,
    pub min_token_len: usize,
    pub heading_weight: usize,
    pub top_k: usize,
    pub connector_words: HashSet<String>,
    pub competitor_exclusions: HashSet<String>,
    pub min_occurrences: usize,
    pub max_competitors: usize,
    pub product_patterns: Vec<Regex>,
    pub max_product_len: usize,
    pub max_products: usize,
}

impl Default for Heuristics {
    fn default() -> Self {
        HeuristicConfig::default()
            .compile()
            .expect("built-in heuristic tables compile")
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_compile() {
        let h = Heuristics::default();
        assert_eq!(h.top_k, 10);
        assert_eq!(h.min_occurrences, 2);
        assert_eq!(h.max_image_issues, 50);
        assert!(h.stopwords.contains("the"));
        assert!(h.title_suffixes.contains("official site"));
    }

    #[test]
    fn bad_product_pattern_is_rejected() {
        let cfg = HeuristicConfig {
            product_patterns: vec!["(unclosed".into()],
            ..Default::default()
        };
        assert!(matches!(cfg.compile(), Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeo.toml");
        std::fs::write(
            &path,
            "[engine]\nmax_pages = 5\n\n[heuristics]\ntop_k = 3\nstopwords = [\"acme\"]\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.engine.max_pages, 5);
        assert_eq!(settings.engine.timeout_secs, 30);
        assert_eq!(settings.heuristics.top_k, 3);
        assert_eq!(settings.heuristics.stopwords, vec!["acme".to_string()]);
        assert_eq!(settings.heuristics.min_occurrences, 2);
    }

    #[test]
    fn zero_max_pages_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aeo.toml");
        std::fs::write(&path, "[engine]\nmax_pages = 0\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
