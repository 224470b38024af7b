use std::collections::HashSet;

use crate::config::Heuristics;
use crate::parser::document::{collapse_ws, Document};
use crate::types::{SchemaType, StructuredBlock};

/// Product names from JSON-LD, then headings that read like a product or service.
pub fn extract(doc: &Document, blocks: &[StructuredBlock], h: &Heuristics) -> Vec<String> {
    let from_schema = blocks
        .iter()
        .filter(|b| b.schema_type == SchemaType::Product)
        .filter_map(|b| b.name())
        .map(collapse_ws);

    let from_headings = doc
        .headings()
        .filter(|(level, text)| {
            *level <= 3
                && text.chars().count() <= h.max_product_len
                && h.product_patterns.iter().any(|re| re.is_match(text))
        })
        .map(|(_, text)| collapse_ws(text));

    let mut seen = HashSet::new();
    from_schema
        .chain(from_headings)
        .filter(|p| p.chars().count() > 2)
        .filter(|p| seen.insert(p.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::document::normalize;
    use crate::parser::structured::extract_blocks;
    use crate::types::RawPage;

    fn products(html: &str) -> Vec<String> {
        let h = Heuristics::default();
        let doc = normalize(&RawPage::new("https://acme.test/", html)).unwrap();
        let (blocks, _) = extract_blocks(&doc.url, &doc.jsonld);
        extract(&doc, &blocks, &h)
    }

    #[test]
    fn schema_names_then_matching_headings() {
        let p = products(r#"
            <script type="application/ld+json">{"@type":"Product","name":"Widget Pro"}</script>
            <h1>Welcome to Acme</h1>
            <h2>Cleaning Services</h2>
            <h2>Premium Plans</h2>
            <h4>Gift Bundles</h4>"#);
        assert_eq!(p, vec!["Widget Pro", "Cleaning Services", "Premium Plans"]);
    }

    #[test]
    fn dedups_case_insensitively() {
        let p = products(r#"
            <script type="application/ld+json">[{"@type":"Product","name":"Starter Kit"},{"@type":"Product","name":"starter  kit"}]</script>
            <h2>Starter KIT</h2>"#);
        assert_eq!(p, vec!["Starter Kit"]);
    }
}
