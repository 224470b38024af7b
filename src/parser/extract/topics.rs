use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::Heuristics;
use crate::parser::document::{Block, Document};
use crate::types::TermCount;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+(?:['’-][\p{L}\p{N}]+)*").unwrap());

/// Counts terms in first-seen order.
#[derive(Debug, Default)]
pub struct TermCounter {
    index: HashMap<String, usize>,
    terms: Vec<TermCount>,
}

impl TermCounter {
    pub fn add(&mut self, term: &str, weight: usize) {
        match self.index.get(term) {
            Some(&i) => self.terms[i].count += weight,
            None => {
                self.index.insert(term.to_string(), self.terms.len());
                self.terms.push(TermCount {
                    term: term.to_string(),
                    count: weight,
                });
            }
        }
    }

    /// Highest counts first; equal counts keep first-seen order.
    pub fn top(mut self, k: usize) -> Vec<TermCount> {
        // sort_by is stable, so insertion order breaks ties
        self.terms.sort_by(|a, b| b.count.cmp(&a.count));
        self.terms.truncate(k);
        self.terms
    }
}

pub fn extract(doc: &Document, h: &Heuristics) -> Vec<TermCount> {
    let mut counter = TermCounter::default();

    if let Some(title) = &doc.title {
        count_tokens(title, h.heading_weight, h, &mut counter);
    }
    for block in &doc.blocks {
        match block {
            Block::Heading { text, .. } => count_tokens(text, h.heading_weight, h, &mut counter),
            Block::Text(text) => count_tokens(text, 1, h, &mut counter),
        }
    }

    counter.top(h.top_k)
}

fn count_tokens(text: &str, weight: usize, h: &Heuristics, counter: &mut TermCounter) {
    for m in TOKEN_RE.find_iter(text) {
        let token = m.as_str().to_lowercase();
        if is_topic_token(&token, h) {
            counter.add(&token, weight);
        }
    }
}

fn is_topic_token(token: &str, h: &Heuristics) -> bool {
    token.chars().count() >= h.min_token_len
        && !token.chars().all(|c| c.is_numeric())
        && !h.stopwords.contains(token)
}
