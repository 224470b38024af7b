use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;
use serde_json::Value;

use crate::parser::document::{collapse_ws, Block, Document};
use crate::types::{Faq, FaqConfidence, SchemaType, StructuredBlock};

static Q_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:q|question)\s*[:.)]\s*(.+)$").unwrap());
static A_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:a|answer)\s*[:.)]\s*(.+)$").unwrap());

pub fn extract(doc: &Document, blocks: &[StructuredBlock]) -> Vec<Faq> {
    let faq_pages: Vec<&StructuredBlock> = blocks
        .iter()
        .filter(|b| b.schema_type == SchemaType::FaqPage)
        .collect();

    let faqs = if faq_pages.is_empty() {
        from_headings(&doc.blocks)
    } else {
        faq_pages.into_iter().flat_map(from_schema).collect()
    };

    dedup(faqs)
}

/// Case- and whitespace-insensitive identity of a question.
pub fn question_key(question: &str) -> String {
    collapse_ws(question).to_lowercase()
}

fn dedup(faqs: Vec<Faq>) -> Vec<Faq> {
    let mut seen = HashSet::new();
    faqs.into_iter()
        .filter(|f| seen.insert(question_key(&f.question)))
        .collect()
}

// ── FAQPage ──

fn from_schema(block: &StructuredBlock) -> Vec<Faq> {
    let entries: Vec<&Value> = match block.field("mainEntity") {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(v @ Value::Object(_)) => vec![v],
        _ => Vec::new(),
    };

    entries
        .into_iter()
        .filter_map(|entry| {
            let question = entry
                .get("name")
                .or_else(|| entry.get("text"))
                .and_then(|v| v.as_str())
                .map(strip_markup)
                .filter(|q| !q.is_empty())?;

            let answer = accepted_answer(entry)
                .and_then(|a| a.get("text"))
                .and_then(|v| v.as_str())
                .map(strip_markup)
                .unwrap_or_default();

            Some(Faq {
                question,
                answer,
                confidence: FaqConfidence::Structured,
            })
        })
        .collect()
}

fn accepted_answer(entry: &Value) -> Option<&Value> {
    let answer = entry
        .get("acceptedAnswer")
        .or_else(|| entry.get("suggestedAnswer"))?;
    match answer {
        Value::Array(items) => items.first(),
        other => Some(other),
    }
}

/// Answers frequently embed HTML; keep only the text.
fn strip_markup(s: &str) -> String {
    if !s.contains('<') {
        return collapse_ws(s);
    }
    let fragment = Html::parse_fragment(s);
    collapse_ws(&fragment.root_element().text().collect::<Vec<_>>().join(" "))
}

// ── Heuristic fallback ──

fn from_headings(blocks: &[Block]) -> Vec<Faq> {
    let mut faqs = Vec::new();

    for (i, block) in blocks.iter().enumerate() {
        let next_text = match blocks.get(i + 1) {
            Some(Block::Text(t)) => Some(t.as_str()),
            _ => None,
        };

        match block {
            Block::Heading { text, .. } if text.trim_end().ends_with('?') => {
                if let Some(answer) = next_text {
                    faqs.push(heuristic(text, answer));
                }
            }
            Block::Text(text) => {
                // a Q: line pairs with the next line, which may open the next block
                let lines: Vec<&str> = text.lines().collect();
                for (j, line) in lines.iter().enumerate() {
                    let Some(q) = Q_PREFIX_RE.captures(line) else {
                        continue;
                    };
                    let following = lines
                        .get(j + 1)
                        .copied()
                        .or_else(|| next_text.and_then(|t| t.lines().next()));
                    let Some(a) = following.and_then(|t| A_PREFIX_RE.captures(t)) else {
                        continue;
                    };
                    faqs.push(heuristic(&q[1], &a[1]));
                }
            }
            _ => {}
        }
    }

    faqs
}

fn heuristic(question: &str, answer: &str) -> Faq {
    Faq {
        question: collapse_ws(question),
        answer: collapse_ws(answer),
        confidence: FaqConfidence::Heuristic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::document::normalize;
    use crate::parser::structured::extract_blocks;
    use crate::types::RawPage;

    fn faqs(html: &str) -> Vec<Faq> {
        let doc = normalize(&RawPage::new("https://acme.test/faq", html)).unwrap();
        let (blocks, _) = extract_blocks(&doc.url, &doc.jsonld);
        extract(&doc, &blocks)
    }

    const FAQ_LD: &str = r#"<script type="application/ld+json">{
        "@context": "https://schema.org",
        "@type": "FAQPage",
        "mainEntity": [
            {"@type": "Question", "name": "Do you ship abroad?",
             "acceptedAnswer": {"@type": "Answer", "text": "<p>Yes, to <b>all</b> EU countries.</p>"}},
            {"@type": "Question", "acceptedAnswer": {"@type": "Answer", "text": "orphan"}},
            {"@type": "Question", "name": "How long is delivery?",
             "acceptedAnswer": [{"@type": "Answer", "text": "2-3 days"}]}
        ]
    }</script>"#;

    #[test]
    fn structured_entries_are_emitted() {
        let f = faqs(FAQ_LD);
        assert_eq!(f.len(), 2);
        assert_eq!(f[0].question, "Do you ship abroad?");
        assert_eq!(f[0].answer, "Yes, to all EU countries.");
        assert_eq!(f[0].confidence, FaqConfidence::Structured);
        assert_eq!(f[1].answer, "2-3 days");
    }

    #[test]
    fn headings_ignored_when_faq_page_present() {
        let html = format!("{}<h2>Is this ignored?</h2><p>Yes.</p>", FAQ_LD);
        let f = faqs(&html);
        assert!(f.iter().all(|x| x.confidence == FaqConfidence::Structured));
    }

    #[test]
    fn question_headings_pair_with_next_text() {
        let f = faqs("<h2>What is Acme?</h2><p>A widget maker.</p><h3>Where are you?</h3><h3>Pricing</h3>");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].question, "What is Acme?");
        assert_eq!(f[0].answer, "A widget maker.");
        assert_eq!(f[0].confidence, FaqConfidence::Heuristic);
    }

    #[test]
    fn q_and_a_prefixed_paragraphs() {
        let f = faqs("<p>Q: Can I return items?</p><p>A: Within 30 days.</p><p>Q: dangling</p>");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].question, "Can I return items?");
        assert_eq!(f[0].answer, "Within 30 days.");
    }

    #[test]
    fn line_breaks_stay_inside_the_answer() {
        let f = faqs("<h2>Do you ship?</h2><p>Yes, worldwide.<br>Delivery takes 3 days.</p>");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].question, "Do you ship?");
        assert_eq!(f[0].answer, "Yes, worldwide. Delivery takes 3 days.");
    }

    #[test]
    fn q_and_a_split_by_a_line_break() {
        let f = faqs("<p>Q: Can I pay later?<br>A: Yes, within 14 days.</p>");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].question, "Can I pay later?");
        assert_eq!(f[0].answer, "Yes, within 14 days.");
    }

    #[test]
    fn duplicates_on_a_page_collapse() {
        let f = faqs("<h2>What is Acme?</h2><p>One.</p><h2>what  is ACME?</h2><p>Two.</p>");
        assert_eq!(f.len(), 1);
        assert_eq!(f[0].answer, "One.");
    }
}
