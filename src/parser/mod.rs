pub mod document;
pub mod extract;
pub mod structured;

use tracing::debug;

use crate::config::Heuristics;
use crate::error::ExtractError;
use crate::types::{PageSignals, RawPage};

/// Everything the reduce phase needs from one page.
#[derive(Debug, Clone)]
pub struct ProcessedPage {
    pub signals: PageSignals,
    /// Visible text, one block per line (competitor detection runs over it).
    pub text: String,
    /// Soft errors that did not exclude the page (malformed JSON-LD blocks).
    pub issues: Vec<ExtractError>,
}

/// Three-pass pipeline: raw HTML → document → structured blocks → page signals.
///
/// An `Err` excludes the page from aggregation; everything else degrades to
/// missing fields plus entries in `issues`.
pub fn process_page(page: &RawPage, h: &Heuristics) -> Result<ProcessedPage, ExtractError> {
    let doc = document::normalize(page)?;
    let (blocks, issues) = structured::extract_blocks(&doc.url, &doc.jsonld);
    let signals = extract::extract_all(&doc, blocks, h);

    debug!(
        "Processed {} ({} blocks, {} faqs, {} topics, {} soft errors)",
        doc.url,
        signals.structured_blocks.len(),
        signals.faqs.len(),
        signals.topics.len(),
        issues.len()
    );

    Ok(ProcessedPage {
        signals,
        text: doc.text(),
        issues,
    })
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_failure_excludes_page() {
        let h = Heuristics::default();
        let err = process_page(&RawPage::failed("https://acme.test/x", "timed out"), &h).unwrap_err();
        assert!(matches!(err, ExtractError::Fetch { .. }));
    }

    #[test]
    fn broken_jsonld_is_a_soft_issue() {
        let h = Heuristics::default();
        let html = std::fs::read_to_string("tests/fixtures/products.html").unwrap();
        let page = process_page(&RawPage::new("https://www.acme-widgets.test/products", html), &h)
            .unwrap();
        assert_eq!(page.issues.len(), 1);
        assert!(matches!(page.issues[0], ExtractError::Parse { .. }));
        assert!(page.text.lines().any(|l| l.contains("Globex Corporation")));
    }
}
