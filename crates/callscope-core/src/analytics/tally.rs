//! Frequency tally for free-text strengths and improvement areas.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Number of entries kept in a summary.
pub const TOP_TERMS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TermCount {
    pub name: String,
    pub count: u64,
}

/// Counts terms while remembering the order each was first seen.
#[derive(Debug, Clone, Default)]
pub struct TermTally {
    entries: Vec<TermCount>,
    index: HashMap<String, usize>,
}

impl TermTally {
    /// Blank terms are skipped; surrounding whitespace is ignored.
    pub fn add(&mut self, term: &str) {
        let term = term.trim();
        if term.is_empty() {
            return;
        }
        match self.index.get(term) {
            Some(&i) => self.entries[i].count += 1,
            None => {
                self.index.insert(term.to_string(), self.entries.len());
                self.entries.push(TermCount {
                    name: term.to_string(),
                    count: 1,
                });
            }
        }
    }

    pub fn extend<'a>(&mut self, terms: impl IntoIterator<Item = &'a String>) {
        for term in terms {
            self.add(term);
        }
    }

    /// The `n` most frequent terms. The sort is stable, so terms with
    /// equal counts keep their first-seen order.
    pub fn top(&self, n: usize) -> Vec<TermCount> {
        let mut ranked = self.entries.clone();
        ranked.sort_by(|a, b| b.count.cmp(&a.count));
        ranked.truncate(n);
        ranked
    }
}
