//! Ranking modes over a built index.
//!
//! Every mode returns [`SearchHit`]s sorted by descending score; ties keep the
//! order in which documents were first scored.

pub mod bm25;
pub mod conjunctive;
pub mod features;

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::Bm25Params;
use crate::index::{AnchorIndex, CorpusIndex, DocTable, DocumentId, Term};

pub use bm25::{bm25, Bm25Variant};
pub use conjunctive::{conjunctive, intersect, Intersection, SkipStats};
pub use features::{extract_features, learned_linear, FeatureVector, Weights, FEATURE_COUNT};

/// One query token together with its expansions.
pub type TermGroup = Vec<Term>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub doc_id: DocumentId,
    pub title: String,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    #[default]
    Bm25,
    Bm25Probabilistic,
    /// Documents matching every term group, ranked by classic BM25.
    Conjunctive,
    LearnedLinear,
}

#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub limit_to: Option<HashSet<DocumentId>>,
    pub top_k: Option<usize>,
    pub bm25: Bm25Params,
}

pub fn flatten(groups: &[TermGroup]) -> Vec<Term> {
    groups.iter().flatten().cloned().collect()
}

/// Runs `groups` against the index in the requested mode.
pub fn query(
    groups: &[TermGroup],
    corpus: &CorpusIndex,
    docs: &DocTable,
    anchors: &AnchorIndex,
    weights: &Weights,
    mode: RetrievalMode,
    options: &QueryOptions,
) -> Vec<SearchHit> {
    let terms = flatten(groups);
    let limit_to = options.limit_to.as_ref();
    let mut hits = match mode {
        RetrievalMode::Bm25 => bm25(&terms, corpus, docs, &options.bm25, Bm25Variant::Classic, limit_to),
        RetrievalMode::Bm25Probabilistic => {
            bm25(&terms, corpus, docs, &options.bm25, Bm25Variant::Probabilistic, limit_to)
        }
        RetrievalMode::Conjunctive => {
            let matched = conjunctive(groups, corpus);
            let allowed: HashSet<DocumentId> = matched
                .docs
                .into_iter()
                .filter(|id| limit_to.map_or(true, |l| l.contains(id)))
                .collect();
            if allowed.is_empty() {
                Vec::new()
            } else {
                bm25(&terms, corpus, docs, &options.bm25, Bm25Variant::Classic, Some(&allowed))
            }
        }
        RetrievalMode::LearnedLinear => {
            // Trained on unexpanded query tokens, so score on those too.
            let surface: Vec<Term> = groups.iter().filter_map(|g| g.first().cloned()).collect();
            learned_linear(&surface, corpus, anchors, docs, weights, &options.bm25, limit_to)
        }
    };
    if let Some(k) = options.top_k {
        hits.truncate(k);
    }
    hits
}

/// Insertion-ordered score accumulator.
#[derive(Default)]
pub(crate) struct ScoreBoard {
    order: Vec<(DocumentId, f64)>,
    slots: HashMap<DocumentId, usize>,
}

impl ScoreBoard {
    pub(crate) fn add(&mut self, doc_id: DocumentId, score: f64) {
        match self.slots.get(&doc_id) {
            Some(&slot) => self.order[slot].1 += score,
            None => {
                self.slots.insert(doc_id, self.order.len());
                self.order.push((doc_id, score));
            }
        }
    }

    pub(crate) fn into_hits(self, docs: &DocTable) -> Vec<SearchHit> {
        let hits = self
            .order
            .into_iter()
            .map(|(doc_id, score)| SearchHit {
                doc_id,
                title: docs.get(doc_id).map(|r| r.title.clone()).unwrap_or_default(),
                score,
            })
            .collect();
        sort_hits(hits)
    }
}

/// Stable sort by descending score.
pub(crate) fn sort_hits(mut hits: Vec<SearchHit>) -> Vec<SearchHit> {
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits
}
