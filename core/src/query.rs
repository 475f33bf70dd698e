//! Raw query text → cleaned, corrected, stem-expanded term groups.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::config::MAX_EDIT_DISTANCE;
use crate::index::{CorpusIndex, Term};
use crate::retrieval::TermGroup;
use crate::stems::{EnglishStemmer, StemMap};
use crate::tokenizer::tokenize;
use crate::window::WindowIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correction {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    /// Cleaned (and possibly corrected) tokens before expansion.
    pub tokens: Vec<Term>,
    /// One group per token: the token followed by its stem siblings.
    pub groups: Vec<TermGroup>,
    pub corrections: Vec<Correction>,
}

impl NormalizedQuery {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

pub struct QueryNormalizer<'a> {
    corpus: &'a CorpusIndex,
    stems: &'a StemMap,
    windows: Option<&'a WindowIndex>,
    max_edits: usize,
}

impl<'a> QueryNormalizer<'a> {
    pub fn new(corpus: &'a CorpusIndex, stems: &'a StemMap) -> Self {
        Self { corpus, stems, windows: None, max_edits: MAX_EDIT_DISTANCE }
    }

    /// Use window co-occurrence instead of document overlap for tie-breaking.
    pub fn with_windows(mut self, windows: &'a WindowIndex) -> Self {
        self.windows = Some(windows);
        self
    }

    pub fn with_max_edits(mut self, max_edits: usize) -> Self {
        self.max_edits = max_edits;
        self
    }

    /// Cleans `raw`, corrects it when no token is in the index, then expands stems.
    pub fn normalize(&self, raw: &str) -> NormalizedQuery {
        let tokens = tokenize(raw);
        if tokens.iter().any(|t| self.corpus.contains(t)) || tokens.is_empty() {
            return self.expand(tokens, Vec::new());
        }
        let (tokens, corrections) = self.correct(&tokens);
        self.expand(tokens, corrections)
    }

    /// Forces correction of every out-of-vocabulary token, e.g. after an
    /// empty conjunctive match.
    pub fn normalize_corrected(&self, raw: &str) -> NormalizedQuery {
        let (tokens, corrections) = self.correct(&tokenize(raw));
        self.expand(tokens, corrections)
    }

    fn expand(&self, tokens: Vec<Term>, corrections: Vec<Correction>) -> NormalizedQuery {
        let groups = tokens.iter().map(|t| self.stems.expand(t, &EnglishStemmer)).collect();
        NormalizedQuery { tokens, groups, corrections }
    }

    /// Replaces every token missing from the index with its best in-vocabulary candidate.
    pub fn correct(&self, tokens: &[Term]) -> (Vec<Term>, Vec<Correction>) {
        let context: Vec<&str> =
            tokens.iter().map(String::as_str).filter(|t| self.corpus.contains(t)).collect();
        let mut corrections = Vec::new();
        let corrected = tokens
            .iter()
            .map(|token| {
                if self.corpus.contains(token) {
                    return token.clone();
                }
                match self.suggest(token, &context) {
                    Some(best) => {
                        tracing::debug!(from = %token, to = %best, "spelling correction");
                        corrections.push(Correction { from: token.clone(), to: best.clone() });
                        best
                    }
                    None => token.clone(),
                }
            })
            .collect();
        (corrected, corrections)
    }

    /// Closest vocabulary word to `token`: fewest edits, then strongest
    /// co-occurrence with `context`, then most documents, then alphabetical.
    pub fn suggest(&self, token: &str, context: &[&str]) -> Option<String> {
        let mut best: Option<(usize, f64, u32, &str)> = None;
        for word in self.corpus.vocabulary() {
            let Some(distance) = levenshtein_within(token, word, self.max_edits) else { continue };
            let dice: f64 = context.iter().map(|c| self.co_occurrence(word, c)).sum();
            let df = self.corpus.get(word).map_or(0, |l| l.document_count);
            let candidate = (distance, dice, df, word);
            if best.map_or(true, |b| better(&candidate, &b)) {
                best = Some(candidate);
            }
        }
        best.map(|(_, _, _, word)| word.to_string())
    }

    fn co_occurrence(&self, a: &str, b: &str) -> f64 {
        match self.windows {
            Some(windows) => window_dice(windows, a, b),
            None => document_dice(self.corpus, a, b),
        }
    }
}

fn better(a: &(usize, f64, u32, &str), b: &(usize, f64, u32, &str)) -> bool {
    a.0.cmp(&b.0)
        .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal))
        .then_with(|| b.2.cmp(&a.2))
        .then_with(|| a.3.cmp(&b.3))
        == Ordering::Less
}

/// Unit-cost edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let above = row[j + 1];
            let cost = if ca == *cb { 0 } else { 1 };
            row[j + 1] = (above + 1).min(row[j] + 1).min(diag + cost);
            diag = above;
        }
    }
    row[b.len()]
}

/// Edit distance when it is at most `max`, skipping the DP when the length
/// difference alone already exceeds it.
pub fn levenshtein_within(a: &str, b: &str, max: usize) -> Option<usize> {
    let (la, lb) = (a.chars().count(), b.chars().count());
    if la.abs_diff(lb) > max {
        return None;
    }
    let d = levenshtein(a, b);
    (d <= max).then_some(d)
}

/// 2|A ∩ B| / (|A| + |B|) over the documents containing each term.
pub fn document_dice(index: &CorpusIndex, a: &str, b: &str) -> f64 {
    let (Some(la), Some(lb)) = (index.get(a), index.get(b)) else { return 0.0 };
    let total = la.postings.len() + lb.postings.len();
    if total == 0 {
        return 0.0;
    }
    let shared = sorted_overlap(la.doc_ids(), lb.doc_ids());
    2.0 * shared as f64 / total as f64
}

/// Dice coefficient over the `(document, window)` slots holding each term.
pub fn window_dice(windows: &WindowIndex, a: &str, b: &str) -> f64 {
    let (Some(wa), Some(wb)) = (windows.get(a), windows.get(b)) else { return 0.0 };
    let total = wa.len() + wb.len();
    if total == 0 {
        return 0.0;
    }
    let slots = |w: &[crate::window::WindowPosting]| {
        w.iter().map(|p| (p.doc_id, p.window)).collect::<Vec<_>>()
    };
    let shared = sorted_overlap(slots(wa).into_iter(), slots(wb).into_iter());
    2.0 * shared as f64 / total as f64
}

fn sorted_overlap<T: Ord, A, B>(a: A, b: B) -> usize
where
    A: Iterator<Item = T>,
    B: Iterator<Item = T>,
{
    let mut a = a.peekable();
    let mut b = b.peekable();
    let mut shared = 0;
    while let (Some(x), Some(y)) = (a.peek(), b.peek()) {
        match x.cmp(y) {
            Ordering::Less => {
                a.next();
            }
            Ordering::Greater => {
                b.next();
            }
            Ordering::Equal => {
                shared += 1;
                a.next();
                b.next();
            }
        }
    }
    shared
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{IndexBuilder, SourceDocument};

    fn build(bodies: &[&str]) -> crate::builder::BuildOutput {
        let docs = bodies
            .iter()
            .enumerate()
            .map(|(i, body)| SourceDocument {
                id: format!("0-{i}"),
                title: Some(format!("page {i}")),
                body: body.to_string(),
                ..Default::default()
            })
            .collect();
        IndexBuilder::default().build(docs)
    }

    #[test]
    fn levenshtein_properties() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("", "abc"), 3);
        let words = ["flaw", "lawn", "law", "integral", "intgral", "", "a"];
        for a in words {
            assert_eq!(levenshtein(a, a), 0);
            for b in words {
                assert_eq!(levenshtein(a, b), levenshtein(b, a));
                for c in words {
                    assert!(levenshtein(a, c) <= levenshtein(a, b) + levenshtein(b, c));
                }
            }
        }
        assert_eq!(levenshtein_within("integral", "intgral", 2), Some(1));
        assert_eq!(levenshtein_within("a", "abcd", 2), None);
    }

    #[test]
    fn in_vocabulary_queries_are_only_expanded() {
        let out = build(&["running runs", "run fast"]);
        let normalizer = QueryNormalizer::new(&out.corpus, &out.stems);
        let q = normalizer.normalize("Running!");
        assert!(q.corrections.is_empty());
        assert_eq!(q.groups, vec![vec!["running".to_string(), "run".to_string(), "runs".to_string()]]);
    }

    #[test]
    fn misspellings_are_corrected_when_nothing_matches() {
        let out = build(&["integral calculus", "integers"]);
        let normalizer = QueryNormalizer::new(&out.corpus, &out.stems);
        let q = normalizer.normalize("intgral");
        assert_eq!(q.tokens, vec!["integral"]);
        assert_eq!(q.corrections, vec![Correction { from: "intgral".into(), to: "integral".into() }]);
    }

    #[test]
    fn edit_bound_limits_candidates() {
        let out = build(&["integral calculus"]);
        let strict = QueryNormalizer::new(&out.corpus, &out.stems).with_max_edits(1);
        assert_eq!(strict.normalize("intgrl").tokens, vec!["intgrl"]);
        assert!(strict.normalize("intgrl").corrections.is_empty());
        let loose = QueryNormalizer::new(&out.corpus, &out.stems).with_max_edits(2);
        assert_eq!(loose.normalize("intgrl").tokens, vec!["integral"]);
    }

    #[test]
    fn co_occurrence_breaks_distance_ties() {
        // "cat" and "car" are both one edit from "cax"; "car" shares a document with "engine".
        let out = build(&["cat whiskers", "car engine", "cat nap"]);
        let normalizer = QueryNormalizer::new(&out.corpus, &out.stems);
        let fixed = normalizer.normalize_corrected("cax engine");
        assert_eq!(fixed.tokens, vec!["car", "engine"]);

        // Without context the more frequent word wins.
        assert_eq!(normalizer.suggest("cax", &[]).as_deref(), Some("cat"));

        let windowed = QueryNormalizer::new(&out.corpus, &out.stems).with_windows(&out.windows);
        assert_eq!(windowed.normalize_corrected("cax engine").tokens, vec!["car", "engine"]);
    }

    #[test]
    fn dice_measures_shared_documents() {
        let out = build(&["a b", "a", "b c"]);
        assert!((document_dice(&out.corpus, "a", "b") - 0.5).abs() < 1e-12);
        assert_eq!(document_dice(&out.corpus, "a", "zzz"), 0.0);
        assert!((window_dice(&out.windows, "b", "c") - 2.0 / 3.0).abs() < 1e-12);
    }
}
