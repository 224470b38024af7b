use crate::config::Heuristics;
use crate::parser::document::{collapse_ws, Document};
use crate::types::StructuredBlock;

/// First non-empty of: business JSON-LD name, `og:site_name`, cleaned title,
/// and (when enabled) the URL's first host label.
pub fn resolve(doc: &Document, blocks: &[StructuredBlock], h: &Heuristics) -> Option<String> {
    let from_schema = blocks
        .iter()
        .filter(|b| b.schema_type.is_business())
        .find_map(|b| b.name())
        .map(collapse_ws);

    from_schema
        .or_else(|| doc.meta("og:site_name").map(collapse_ws))
        .filter(|s| !s.is_empty())
        .or_else(|| doc.title.as_deref().and_then(|t| clean_title(t, h)))
        .or_else(|| {
            if h.brand_domain_fallback {
                brand_from_url(&doc.url)
            } else {
                None
            }
        })
}

/// Drop generic segments ("Home", "Official Site") from either end of a title.
pub fn clean_title(title: &str, h: &Heuristics) -> Option<String> {
    let mut t = collapse_ws(title);

    loop {
        let before = t.clone();

        if let Some((head, tail)) = split_last(&t, h) {
            if is_generic(tail, h) {
                t = head.to_string();
            }
        }
        if let Some((head, tail)) = split_first(&t, h) {
            if is_generic(head, h) {
                t = tail.to_string();
            }
        }
        t = trim_separators(&t, h);

        if t == before {
            break;
        }
    }

    if t.is_empty() || is_generic(&t, h) {
        None
    } else {
        Some(t)
    }
}

fn split_last<'a>(t: &'a str, h: &Heuristics) -> Option<(&'a str, &'a str)> {
    h.title_separators
        .iter()
        .filter_map(|sep| t.rfind(&format!(" {} ", sep)).map(|i| (i, sep.len() + 2)))
        .max_by_key(|(i, _)| *i)
        .map(|(i, len)| (t[..i].trim(), t[i + len..].trim()))
}

fn split_first<'a>(t: &'a str, h: &Heuristics) -> Option<(&'a str, &'a str)> {
    h.title_separators
        .iter()
        .filter_map(|sep| t.find(&format!(" {} ", sep)).map(|i| (i, sep.len() + 2)))
        .min_by_key(|(i, _)| *i)
        .map(|(i, len)| (t[..i].trim(), t[i + len..].trim()))
}

fn trim_separators(t: &str, h: &Heuristics) -> String {
    let mut s = t.trim();
    loop {
        let before = s;
        for sep in &h.title_separators {
            s = s.trim_end_matches(sep.as_str()).trim();
            s = s.trim_start_matches(sep.as_str()).trim();
        }
        if s == before {
            return s.to_string();
        }
    }
}

fn is_generic(segment: &str, h: &Heuristics) -> bool {
    h.title_suffixes.contains(&segment.trim().to_lowercase())
}

fn brand_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    let label = host.trim_start_matches("www.").split('.').next()?;
    let mut chars = label.chars();
    let first = chars.next()?;
    Some(first.to_uppercase().chain(chars).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::document::normalize;
    use crate::parser::structured::extract_blocks;
    use crate::types::RawPage;

    fn brand(html: &str) -> Option<String> {
        let h = Heuristics::default();
        let doc = normalize(&RawPage::new("https://www.acme.test/", html)).unwrap();
        let (blocks, _) = extract_blocks(&doc.url, &doc.jsonld);
        resolve(&doc, &blocks, &h)
    }

    #[test]
    fn og_site_name_beats_title() {
        let b = brand(r#"<head><title>Acme - Home</title><meta property="og:site_name" content="Acme"></head>"#);
        assert_eq!(b.as_deref(), Some("Acme"));
    }

    #[test]
    fn structured_name_beats_og() {
        let b = brand(r#"<head>
            <meta property="og:site_name" content="Acme Shop">
            <script type="application/ld+json">{"@type":"Organization","name":"Acme Corp"}</script>
        </head>"#);
        assert_eq!(b.as_deref(), Some("Acme Corp"));
    }

    #[test]
    fn non_business_schema_is_ignored() {
        let b = brand(r#"<head><title>Widgets | Acme</title>
            <script type="application/ld+json">{"@type":"Product","name":"Widget"}</script>
        </head>"#);
        assert_eq!(b.as_deref(), Some("Widgets | Acme"));
    }

    #[test]
    fn title_suffixes_are_stripped() {
        let h = Heuristics::default();
        assert_eq!(clean_title("Acme - Home", &h).as_deref(), Some("Acme"));
        assert_eq!(clean_title("Acme | Official Site", &h).as_deref(), Some("Acme"));
        assert_eq!(clean_title("Home | Acme", &h).as_deref(), Some("Acme"));
        assert_eq!(clean_title("Acme – Welcome – Home", &h).as_deref(), Some("Acme"));
        assert_eq!(clean_title("Acme |", &h).as_deref(), Some("Acme"));
        assert_eq!(clean_title("Home", &h), None);
        assert_eq!(clean_title("   ", &h), None);
    }

    #[test]
    fn hyphenated_names_survive() {
        let h = Heuristics::default();
        assert_eq!(clean_title("Coca-Cola - Home", &h).as_deref(), Some("Coca-Cola"));
    }

    #[test]
    fn unresolved_is_none_not_empty() {
        assert_eq!(brand("<p>nothing here</p>"), None);
    }

    #[test]
    fn domain_fallback_when_enabled() {
        let mut h = Heuristics::default();
        h.brand_domain_fallback = true;
        let doc = normalize(&RawPage::new("https://www.acme.test/about", "<p>x</p>")).unwrap();
        assert_eq!(resolve(&doc, &[], &h).as_deref(), Some("Acme"));
    }
}
