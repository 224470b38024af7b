use thiserror::Error;

/// Soft and terminal failures raised while turning crawled pages into an audit.
///
/// Only `Validation` ever fails a whole run; the rest exclude a page, a JSON-LD
/// block, or a persistence attempt and are reported alongside the record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// Malformed JSON-LD block or a page with no usable HTML.
    #[error("parse error on {url}: {message}")]
    Parse { url: String, message: String },

    /// The crawler could not deliver the page (or the whole crawl).
    #[error("fetch failed for {url}: {message}")]
    Fetch { url: String, message: String },

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failed: {0}")]
    Storage(String),
}

impl ExtractError {
    pub fn parse(url: &str, message: impl Into<String>) -> Self {
        ExtractError::Parse {
            url: url.to_string(),
            message: message.into(),
        }
    }

    pub fn fetch(url: &str, message: impl Into<String>) -> Self {
        ExtractError::Fetch {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

impl From<rusqlite::Error> for ExtractError {
    fn from(e: rusqlite::Error) -> Self {
        ExtractError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(e: serde_json::Error) -> Self {
        ExtractError::Storage(e.to_string())
    }
}

/// Problems loading or compiling the heuristic configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid product pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
