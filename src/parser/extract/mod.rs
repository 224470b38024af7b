pub mod brand;
pub mod faq;
pub mod geo;
pub mod images;
pub mod products;
pub mod topics;

use crate::config::Heuristics;
use crate::parser::document::Document;
use crate::types::{PageSignals, StructuredBlock};

/// Run every per-page deriver. They are independent of one another.
pub fn extract_all(doc: &Document, blocks: Vec<StructuredBlock>, h: &Heuristics) -> PageSignals {
    PageSignals {
        url: doc.url.clone(),
        brand_candidate: brand::resolve(doc, &blocks, h),
        description: doc.meta_description.clone(),
        lang: doc.lang.clone(),
        faqs: faq::extract(doc, &blocks),
        image_audit: images::audit(&doc.images, h),
        geo: geo::extract(doc, &blocks, h),
        topics: topics::extract(doc, h),
        products: products::extract(doc, &blocks, h),
        structured_blocks: blocks,
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::document::normalize;
    use crate::parser::structured::extract_blocks;
    use crate::types::{FaqConfidence, LocationSource, RawPage};

    fn fixture(name: &str) -> RawPage {
        let html = std::fs::read_to_string(format!("tests/fixtures/{}.html", name)).unwrap();
        RawPage::new(format!("https://www.acme-widgets.test/{}", name), html)
    }

    fn signals(name: &str) -> PageSignals {
        let h = Heuristics::default();
        let page = fixture(name);
        let doc = normalize(&page).unwrap();
        let (blocks, _) = extract_blocks(&doc.url, &doc.jsonld);
        extract_all(&doc, blocks, &h)
    }

    #[test]
    fn home_fixture() {
        let s = signals("home");
        assert_eq!(s.brand_candidate.as_deref(), Some("Acme"));
        assert!(s.description.is_some());
        assert_eq!(s.lang.as_deref(), Some("en"));
        assert_eq!(s.geo.location.as_deref(), Some("Vilnius, LT"));
        assert_eq!(s.geo.location_source, Some(LocationSource::StructuredAddress));
        assert!(s.geo.has_map_embed);
        assert!(s.image_audit.counts.issue_count() >= 2);
        assert!(s.topics.iter().any(|t| t.term == "widgets"));
    }

    #[test]
    fn faq_fixture() {
        let s = signals("faq");
        assert_eq!(s.faqs.len(), 3);
        assert!(s.faqs.iter().all(|f| f.confidence == FaqConfidence::Structured));
    }

    #[test]
    fn products_fixture_survives_broken_jsonld() {
        let h = Heuristics::default();
        let page = fixture("products");
        let doc = normalize(&page).unwrap();
        let (blocks, errors) = extract_blocks(&doc.url, &doc.jsonld);
        assert_eq!(errors.len(), 1);
        let s = extract_all(&doc, blocks, &h);
        assert!(s.products.iter().any(|p| p == "Widget Pro"));
        assert!(s.products.iter().any(|p| p == "Widget Mini"));
        assert!(!s.faqs.is_empty());
        assert!(!s.topics.is_empty());
    }
}
