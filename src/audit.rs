use chrono::Utc;
use tracing::{info, warn};
use url::Url;

use crate::crawler::Crawler;
use crate::db::AuditStore;
use crate::engine::Engine;
use crate::error::ExtractError;
use crate::types::{AuditRecord, SignalBundle};

/// The site an audit is about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditTarget {
    pub site_id: String,
    pub url: String,
}

impl AuditTarget {
    pub fn from_url(url: &str) -> Self {
        AuditTarget {
            site_id: site_id(url),
            url: url.trim().to_string(),
        }
    }
}

/// Lower-cased host with any leading `www.` removed. Scheme-less input is
/// treated as https; anything unparseable falls back to the trimmed input.
pub fn site_id(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = Url::parse(trimmed)
        .ok()
        .filter(|u| u.host_str().is_some())
        .or_else(|| Url::parse(&format!("https://{}", trimmed)).ok());

    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .map(str::to_lowercase)
        .unwrap_or_else(|| trimmed.to_lowercase());

    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// A run with zero usable pages is a failure: empty bundle plus a validation issue.
pub fn build_record(
    target: &AuditTarget,
    bundle: SignalBundle,
    pages_crawled: usize,
    pages_failed: usize,
    mut issues: Vec<String>,
) -> AuditRecord {
    let success = pages_crawled > 0;
    let signal_bundle = if success {
        bundle
    } else {
        issues.push(ExtractError::Validation("no pages could be processed".into()).to_string());
        SignalBundle::default()
    };

    AuditRecord {
        site_id: target.site_id.clone(),
        url: target.url.clone(),
        pages_crawled,
        pages_failed,
        signal_bundle,
        success,
        partial: success && pages_failed > 0,
        issues,
        created_at: Utc::now(),
    }
}

/// Outcome of [`run_audit`]. A storage failure is reported here and never
/// changes the record itself.
#[derive(Debug, Clone)]
pub struct AuditReport {
    pub record: AuditRecord,
    pub storage_error: Option<ExtractError>,
}

/// Crawl `url`, extract, and persist. Failed runs are persisted too.
pub async fn run_audit(
    engine: &Engine,
    crawler: &dyn Crawler,
    store: &dyn AuditStore,
    url: &str,
) -> AuditReport {
    let target = AuditTarget::from_url(url);
    info!("Auditing {} (site {})", target.url, target.site_id);

    let record = match crawler.fetch(&target.url, engine.config().max_pages).await {
        Ok(pages) => engine.extract_for(&target, pages).await,
        Err(e) => {
            warn!("Crawl failed for {}: {}", target.url, e);
            build_record(&target, SignalBundle::default(), 0, 0, vec![e.to_string()])
        }
    };

    let storage_error = match store.persist(&record) {
        Ok(()) => None,
        Err(e) => {
            warn!("Could not persist audit for {}: {}", record.site_id, e);
            Some(e)
        }
    };

    AuditReport {
        record,
        storage_error,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn site_id_is_host_without_www() {
        assert_eq!(site_id("https://WWW.Acme-Widgets.test/about?x=1"), "acme-widgets.test");
        assert_eq!(site_id("http://shop.acme.test:8080/"), "shop.acme.test");
        assert_eq!(site_id("acme.test/products"), "acme.test");
        assert_eq!(site_id("  https://acme.test  "), "acme.test");
    }

    #[test]
    fn zero_pages_is_a_failed_run() {
        let target = AuditTarget::from_url("https://acme.test");
        let mut bundle = SignalBundle::default();
        bundle.brand_name = Some("ignored".into());

        let r = build_record(&target, bundle, 0, 2, vec!["fetch failed".into()]);
        assert!(!r.success);
        assert!(!r.partial);
        assert_eq!(r.signal_bundle, SignalBundle::default());
        assert_eq!(r.issues.len(), 2);
        assert!(r.issues[1].starts_with("validation failed"));
    }

    #[test]
    fn partial_when_some_pages_failed() {
        let target = AuditTarget::from_url("https://acme.test");
        let r = build_record(&target, SignalBundle::default(), 3, 1, vec![]);
        assert!(r.success);
        assert!(r.partial);
        assert_eq!(r.site_id, "acme.test");

        let r = build_record(&target, SignalBundle::default(), 3, 0, vec![]);
        assert!(!r.partial);
    }
}
