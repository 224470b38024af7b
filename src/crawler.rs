//! Crawler port and the file-backed / in-memory adapters.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::error::ExtractError;
use crate::types::RawPage;

/// Source of crawled pages for one site.
#[async_trait]
pub trait Crawler: Send + Sync {
    /// Fetch up to `max_pages` pages for the site at `url`, in crawl order.
    async fn fetch(&self, url: &str, max_pages: usize) -> Result<Vec<RawPage>, ExtractError>;
}

// ── Page files ──

#[derive(Deserialize)]
#[serde(untagged)]
enum PageFileRepr {
    List(Vec<RawPage>),
    Site {
        #[serde(default)]
        url: Option<String>,
        pages: Vec<RawPage>,
    },
}

/// A crawl stored on disk: either a bare JSON array of pages or
/// `{ "url": "...", "pages": [...] }`.
#[derive(Debug, Clone, Default)]
pub struct PageFile {
    pub url: Option<String>,
    pub pages: Vec<RawPage>,
}

impl PageFile {
    pub fn parse(raw: &str, origin: &str) -> Result<Self, ExtractError> {
        let repr: PageFileRepr = serde_json::from_str(raw)
            .map_err(|e| ExtractError::fetch(origin, format!("invalid page file: {}", e)))?;
        Ok(match repr {
            PageFileRepr::List(pages) => PageFile { url: None, pages },
            PageFileRepr::Site { url, pages } => PageFile { url, pages },
        })
    }

    pub fn load(path: &Path) -> Result<Self, ExtractError> {
        let origin = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|e| ExtractError::fetch(&origin, e.to_string()))?;
        Self::parse(&raw, &origin)
    }

    /// Declared site URL, else the first page's URL.
    pub fn site_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .or_else(|| self.pages.first().map(|p| p.url.as_str()))
            .filter(|u| !u.trim().is_empty())
    }
}

/// Serves pages from a JSON page file; the requested URL is only used in errors.
#[derive(Debug, Clone)]
pub struct JsonFileCrawler {
    path: PathBuf,
}

impl JsonFileCrawler {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileCrawler { path: path.into() }
    }
}

#[async_trait]
impl Crawler for JsonFileCrawler {
    async fn fetch(&self, url: &str, max_pages: usize) -> Result<Vec<RawPage>, ExtractError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ExtractError::fetch(url, format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let mut pages = PageFile::parse(&raw, url)?.pages;
        pages.truncate(max_pages);
        info!("Loaded {} pages for {} from {}", pages.len(), url, self.path.display());
        Ok(pages)
    }
}

/// Pre-loaded pages, for tests and callers that already hold the crawl.
#[derive(Debug, Clone, Default)]
pub struct StaticCrawler {
    pages: Vec<RawPage>,
}

impl StaticCrawler {
    pub fn new(pages: Vec<RawPage>) -> Self {
        StaticCrawler { pages }
    }
}

#[async_trait]
impl Crawler for StaticCrawler {
    async fn fetch(&self, _url: &str, max_pages: usize) -> Result<Vec<RawPage>, ExtractError> {
        Ok(self.pages.iter().take(max_pages).cloned().collect())
    }
}

// ── Tests ──
