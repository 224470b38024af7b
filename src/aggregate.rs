//! Reduce phase: merge per-page signals (in crawl order) into one site-level bundle.

use std::collections::{HashMap, HashSet};

use crate::competitors;
use crate::config::Heuristics;
use crate::parser::document::collapse_ws;
use crate::parser::extract::faq::question_key;
use crate::parser::extract::topics::TermCounter;
use crate::types::{
    AltTextCounts, Faq, GeoReadiness, ImageIssue, PageSignals, SchemaType, SignalBundle,
};

/// `pages` and `texts` must both be in crawl order.
pub fn aggregate<'a>(
    pages: &[PageSignals],
    texts: impl IntoIterator<Item = &'a str>,
    h: &Heuristics,
) -> SignalBundle {
    let brand_name = resolve_brand(pages);
    let products = merge_products(pages, h);
    let competitors = competitors::detect(texts, brand_name.as_deref(), &products, h);

    let mut alt_text = AltTextCounts::default();
    for p in pages {
        alt_text.add(&p.image_audit.counts);
    }

    SignalBundle {
        description: pages
            .iter()
            .filter_map(|p| p.description.as_deref())
            .map(str::trim)
            .find(|d| !d.is_empty())
            .map(str::to_string),
        location: majority(pages.iter().filter_map(|p| p.geo.location.as_deref())),
        faqs: merge_faqs(pages),
        topics: merge_topics(pages, h),
        image_issue_count: alt_text.issue_count(),
        alt_text,
        image_issues: merge_image_issues(pages, h),
        schema_types: schema_types(pages),
        geo: geo_readiness(pages),
        language: majority(pages.iter().filter_map(|p| p.lang.as_deref()))
            .map(|l| l.to_lowercase()),
        brand_name,
        products,
        competitors,
    }
}

/// Majority vote over non-empty page candidates; ties go to the first seen.
pub fn resolve_brand(pages: &[PageSignals]) -> Option<String> {
    majority(pages.iter().filter_map(|p| p.brand_candidate.as_deref()))
}

/// Case-insensitive vote. The winner keeps the spelling it was first seen with.
fn majority<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut tally: Vec<(String, usize)> = Vec::new();

    for v in values {
        let display = collapse_ws(v);
        if display.is_empty() {
            continue;
        }
        let key = display.to_lowercase();
        match index.get(&key) {
            Some(&i) => tally[i].1 += 1,
            None => {
                index.insert(key, tally.len());
                tally.push((display, 1));
            }
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (display, n) in tally {
        if best.as_ref().map_or(true, |(_, b)| n > *b) {
            best = Some((display, n));
        }
    }
    best.map(|(display, _)| display)
}

fn merge_faqs(pages: &[PageSignals]) -> Vec<Faq> {
    let mut seen = HashSet::new();
    pages
        .iter()
        .flat_map(|p| p.faqs.iter())
        .filter(|f| seen.insert(question_key(&f.question)))
        .cloned()
        .collect()
}

fn merge_topics(pages: &[PageSignals], h: &Heuristics) -> Vec<String> {
    let mut counter = TermCounter::default();
    for t in pages.iter().flat_map(|p| p.topics.iter()) {
        counter.add(&t.term, t.count);
    }
    counter.top(h.top_k).into_iter().map(|t| t.term).collect()
}

fn merge_products(pages: &[PageSignals], h: &Heuristics) -> Vec<String> {
    let mut seen = HashSet::new();
    pages
        .iter()
        .flat_map(|p| p.products.iter())
        .filter(|p| seen.insert(collapse_ws(p).to_lowercase()))
        .take(h.max_products)
        .cloned()
        .collect()
}

fn merge_image_issues(pages: &[PageSignals], h: &Heuristics) -> Vec<ImageIssue> {
    pages
        .iter()
        .flat_map(|p| p.image_audit.issues.iter())
        .take(h.max_image_issues)
        .cloned()
        .collect()
}

/// Distinct schema.org types in first-seen order; unrecognised types keep their raw name.
fn schema_types(pages: &[PageSignals]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for block in pages.iter().flat_map(|p| p.structured_blocks.iter()) {
        let name = match block.schema_type {
            SchemaType::Unknown => match block.types.first() {
                Some(raw) => raw.clone(),
                None => continue,
            },
            known => known.as_str().to_string(),
        };
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn geo_readiness(pages: &[PageSignals]) -> GeoReadiness {
    let mut hreflang: Vec<String> = Vec::new();
    for lang in pages.iter().flat_map(|p| p.geo.hreflang.iter()) {
        if !hreflang.contains(lang) {
            hreflang.push(lang.clone());
        }
    }
    GeoReadiness {
        has_hreflang: !hreflang.is_empty(),
        hreflang,
        has_geo_meta: pages.iter().any(|p| p.geo.has_geo_meta),
        has_map_embed: pages.iter().any(|p| p.geo.has_map_embed),
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AltTextClass, FaqConfidence, GeoSignals, ImageAudit, TermCount};

    fn page(url: &str) -> PageSignals {
        PageSignals {
            url: url.to_string(),
            ..Default::default()
        }
    }

    fn with_brand(url: &str, brand: &str) -> PageSignals {
        PageSignals {
            brand_candidate: Some(brand.to_string()),
            ..page(url)
        }
    }

    fn faq(q: &str) -> Faq {
        Faq {
            question: q.to_string(),
            answer: "a".to_string(),
            confidence: FaqConfidence::Heuristic,
        }
    }

    fn topics(terms: &[(&str, usize)]) -> Vec<TermCount> {
        terms
            .iter()
            .map(|(t, c)| TermCount {
                term: t.to_string(),
                count: *c,
            })
            .collect()
    }

    #[test]
    fn brand_majority_beats_variants() {
        let pages = vec![
            with_brand("/a", "Acme"),
            with_brand("/b", "Acme Inc"),
            with_brand("/c", "Acme"),
        ];
        assert_eq!(resolve_brand(&pages).as_deref(), Some("Acme"));
    }

    #[test]
    fn brand_tie_goes_to_first_seen() {
        let pages = vec![with_brand("/a", "Globex"), with_brand("/b", "Acme"), page("/c")];
        assert_eq!(resolve_brand(&pages).as_deref(), Some("Globex"));
        assert_eq!(resolve_brand(&[page("/x")]), None);
    }

    #[test]
    fn majority_ignores_case_but_keeps_first_spelling() {
        let pages = vec![
            with_brand("/a", "ACME"),
            with_brand("/b", "Globex"),
            with_brand("/c", "acme"),
        ];
        assert_eq!(resolve_brand(&pages).as_deref(), Some("ACME"));
    }

    #[test]
    fn faqs_union_dedups_on_normalised_question() {
        let mut a = page("/a");
        a.faqs = vec![faq("Do you ship?"), faq("Where are you?")];
        let mut b = page("/b");
        b.faqs = vec![faq("do  you SHIP?"), faq("Do you install?")];
        let bundle = aggregate(&[a, b], std::iter::empty(), &Heuristics::default());
        let qs: Vec<_> = bundle.faqs.iter().map(|f| f.question.as_str()).collect();
        assert_eq!(qs, vec!["Do you ship?", "Where are you?", "Do you install?"]);
    }

    #[test]
    fn topics_are_summed_across_pages() {
        let mut a = page("/a");
        a.topics = topics(&[("plumbing", 3), ("heating", 2)]);
        let mut b = page("/b");
        b.topics = topics(&[("heating", 2), ("boilers", 1)]);
        let mut h = Heuristics::default();
        h.top_k = 2;
        let bundle = aggregate(&[a, b], std::iter::empty(), &h);
        assert_eq!(bundle.topics, vec!["heating", "plumbing"]);
    }

    #[test]
    fn description_and_location() {
        let mut a = page("/a");
        a.description = Some("  ".into());
        a.geo = GeoSignals {
            location: Some("54.6872,25.2797".into()),
            ..Default::default()
        };
        let mut b = page("/b");
        b.description = Some("Second page description".into());
        b.geo.location = Some("Vilnius, LT".into());
        let mut c = page("/c");
        c.geo.location = Some("Vilnius, LT".into());

        let bundle = aggregate(&[a, b, c], std::iter::empty(), &Heuristics::default());
        assert_eq!(bundle.description.as_deref(), Some("Second page description"));
        assert_eq!(bundle.location.as_deref(), Some("Vilnius, LT"));
    }

    #[test]
    fn image_totals_and_capped_issue_list() {
        let issue = |src: &str| ImageIssue {
            src: src.into(),
            class: AltTextClass::Missing,
        };
        let mut a = page("/a");
        a.image_audit = ImageAudit {
            counts: AltTextCounts { missing: 2, empty: 1, weak: 0, ok: 4 },
            issues: vec![issue("/1.png"), issue("/2.png"), issue("/3.png")],
        };
        let mut b = page("/b");
        b.image_audit = ImageAudit {
            counts: AltTextCounts { missing: 0, empty: 0, weak: 1, ok: 0 },
            issues: vec![issue("/4.png")],
        };
        let mut h = Heuristics::default();
        h.max_image_issues = 2;

        let bundle = aggregate(&[a, b], std::iter::empty(), &h);
        assert_eq!(bundle.image_issue_count, 4);
        assert_eq!(bundle.alt_text.ok, 4);
        assert_eq!(bundle.image_issues.len(), 2);
    }

    #[test]
    fn competitors_exclude_resolved_brand_and_products() {
        let mut a = with_brand("/a", "Acme");
        a.products = vec!["Widget Pro".into()];
        let texts = [
            "Acme Widgets beat Globex Corp",
            "Widget Pro outlasts Globex Corp",
            "Acme Widgets and Widget Pro",
        ];
        let bundle = aggregate(&[a], texts.iter().copied(), &Heuristics::default());
        assert_eq!(bundle.competitors, vec!["Globex Corp".to_string()]);
    }

    #[test]
    fn empty_input_gives_empty_bundle() {
        let bundle = aggregate(&[], std::iter::empty(), &Heuristics::default());
        assert_eq!(bundle, SignalBundle::default());
    }
}
