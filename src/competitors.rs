use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Heuristics;

/// Two or more capitalised words separated by spaces or tabs (never a line break).
static CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}[\p{L}\p{N}&'’-]*(?:[ \t]+\p{Lu}[\p{L}\p{N}&'’-]*)+").unwrap()
});

/// Capitalised multi-word phrases repeated across the site's text, excluding the
/// brand itself, the site's own products, and boilerplate phrases.
///
/// `texts` are page texts in crawl order; each line is scanned on its own.
pub fn detect<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    brand: Option<&str>,
    own_products: &[String],
    h: &Heuristics,
) -> Vec<String> {
    let brand_key = brand.map(|b| b.trim().to_lowercase()).filter(|b| !b.is_empty());
    let products: HashSet<String> = own_products.iter().map(|p| p.to_lowercase()).collect();

    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, usize)> = Vec::new();

    for text in texts {
        for line in text.lines() {
            for m in CANDIDATE_RE.find_iter(line) {
                let Some(phrase) = trim_connectors(m.as_str(), h) else {
                    continue;
                };
                let key = phrase.to_lowercase();
                if is_excluded(&key, brand_key.as_deref(), &products, h) {
                    continue;
                }
                match index.get(&key) {
                    Some(&i) => counts[i].1 += 1,
                    None => {
                        index.insert(key, counts.len());
                        counts.push((phrase, 1));
                    }
                }
            }
        }
    }

    counts
        .into_iter()
        .filter(|(_, n)| *n >= h.min_occurrences)
        .map(|(phrase, _)| phrase)
        .take(h.max_competitors)
        .collect()
}

/// Drop a trailing possessive and connector words from both ends; `None` if fewer than two words remain.
fn trim_connectors(raw: &str, h: &Heuristics) -> Option<String> {
    let mut words: Vec<&str> = raw
        .split_whitespace()
        .map(|w| w.trim_matches(|c| c == '\'' || c == '’' || c == '-'))
        .filter(|w| !w.is_empty())
        .collect();

    // "Globex Corporation's" counts as "Globex Corporation"
    if let Some(last) = words.last_mut() {
        if let Some(stem) = last.strip_suffix("'s").or_else(|| last.strip_suffix("’s")) {
            *last = stem;
        }
    }
    words.retain(|w| !w.is_empty());

    while words
        .first()
        .is_some_and(|w| h.connector_words.contains(&w.to_lowercase()))
    {
        words.remove(0);
    }
    while words
        .last()
        .is_some_and(|w| h.connector_words.contains(&w.to_lowercase()))
    {
        words.pop();
    }

    (words.len() >= 2).then(|| words.join(" "))
}

fn is_excluded(key: &str, brand: Option<&str>, products: &HashSet<String>, h: &Heuristics) -> bool {
    if h.competitor_exclusions.contains(key) || products.contains(key) {
        return true;
    }
    match brand {
        Some(b) => key == b || key.strip_prefix(b).is_some_and(|rest| rest.starts_with(' ')),
        None => false,
    }
}

// ── Tests ──
