//! Window-level co-occurrence index.
//!
//! Each document body is cut into consecutive windows of `WINDOW_SIZE`
//! tokens; a posting records which window of which document holds the term
//! and how often. Spelling correction uses it to tell apart candidates that
//! are equally close to a misspelled token.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::index::{DocumentId, Term};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WindowPosting {
    pub doc_id: DocumentId,
    pub window: u32,
    pub frequency: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowIndex {
    pub terms: BTreeMap<Term, Vec<WindowPosting>>,
}

/// Splits a token sequence into per-window term counts.
pub fn window_counts(tokens: &[String], window_size: usize) -> Vec<HashMap<Term, u32>> {
    tokens
        .chunks(window_size.max(1))
        .map(|chunk| {
            let mut counts: HashMap<Term, u32> = HashMap::new();
            for token in chunk {
                *counts.entry(token.clone()).or_insert(0) += 1;
            }
            counts
        })
        .collect()
}

impl WindowIndex {
    pub fn from_document_windows<I>(docs: I) -> Self
    where
        I: IntoIterator<Item = (DocumentId, Vec<HashMap<Term, u32>>)>,
    {
        let mut terms: BTreeMap<Term, Vec<WindowPosting>> = BTreeMap::new();
        for (doc_id, windows) in docs {
            for (window, counts) in windows.into_iter().enumerate() {
                for (term, frequency) in counts {
                    terms.entry(term).or_default().push(WindowPosting {
                        doc_id,
                        window: window as u32,
                        frequency,
                    });
                }
            }
        }
        for postings in terms.values_mut() {
            postings.sort();
        }
        Self { terms }
    }

    pub fn get(&self, term: &str) -> Option<&[WindowPosting]> {
        self.terms.get(term).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_split_at_fixed_size() {
        let tokens: Vec<String> = "a b a c d".split(' ').map(String::from).collect();
        let windows = window_counts(&tokens, 2);
        assert_eq!(windows.len(), 3);
        assert_eq!(windows[0]["a"], 1);
        assert_eq!(windows[1]["a"], 1);
        assert_eq!(windows[2]["d"], 1);

        let index = WindowIndex::from_document_windows(vec![(DocumentId::new(0, 1), windows)]);
        let a: Vec<u32> = index.get("a").unwrap().iter().map(|p| p.window).collect();
        assert_eq!(a, vec![0, 1]);
    }
}
