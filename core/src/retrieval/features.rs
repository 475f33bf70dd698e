//! Feature extraction and the linear learned ranker.
//!
//! The trainer calls [`extract_features`] too; query time and training time
//! must build vectors the same way or the weights mean nothing.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::Bm25Params;
use crate::index::{AnchorIndex, CorpusIndex, DocTable, DocumentId};
use crate::retrieval::bm25::{bm25, Bm25Variant};
use crate::retrieval::{sort_hits, SearchHit};
use crate::tokenizer::tokenize;

pub const FEATURE_COUNT: usize = 5;

/// `[anchor_bm25, title_overlap, authority, mean_log_tf, mean_idf]`
pub type FeatureVector = [f64; FEATURE_COUNT];

/// Linear model over [`FeatureVector`]. There is no bias term.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights(pub [f64; FEATURE_COUNT]);

impl Default for Weights {
    fn default() -> Self {
        Weights([1.0; FEATURE_COUNT])
    }
}

impl Weights {
    pub fn score(&self, features: &FeatureVector) -> f64 {
        self.0.iter().zip(features).map(|(w, f)| w * f).sum()
    }
}

/// One feature vector per candidate, in candidate order.
pub fn extract_features(
    terms: &[String],
    candidates: &[DocumentId],
    corpus: &CorpusIndex,
    anchors: &AnchorIndex,
    docs: &DocTable,
    params: &Bm25Params,
) -> Vec<FeatureVector> {
    let limit: HashSet<DocumentId> = candidates.iter().copied().collect();
    let anchor_scores: HashMap<DocumentId, f64> =
        bm25(terms, anchors, docs, params, Bm25Variant::Probabilistic, Some(&limit))
            .into_iter()
            .map(|hit| (hit.doc_id, hit.score))
            .collect();

    let query_len = terms.len().max(1) as f64;
    // Unindexed terms count toward the query length with an idf of zero.
    let mean_idf = terms.iter().filter_map(|t| corpus.get(t)).map(|l| l.idf).sum::<f64>() / query_len;

    candidates
        .iter()
        .map(|&doc_id| {
            let record = docs.get(doc_id);
            let title_overlap = record.map_or(0.0, |r| {
                let title_words = tokenize(&r.title);
                terms.iter().filter(|t| title_words.contains(*t)).count() as f64 / query_len
            });
            let log_tf: f64 = terms
                .iter()
                .filter_map(|t| corpus.get(t).and_then(|list| list.frequency(doc_id)))
                .map(|tf| (tf as f64 + 1.0).ln())
                .sum();
            [
                anchor_scores.get(&doc_id).copied().unwrap_or(0.0),
                title_overlap,
                record.map_or(0.0, |r| r.authority_score),
                log_tf / query_len,
                mean_idf,
            ]
        })
        .collect()
}

/// Ranks every document holding a query term by `weights · features`.
pub fn learned_linear(
    terms: &[String],
    corpus: &CorpusIndex,
    anchors: &AnchorIndex,
    docs: &DocTable,
    weights: &Weights,
    params: &Bm25Params,
    limit_to: Option<&HashSet<DocumentId>>,
) -> Vec<SearchHit> {
    let mut candidates: Vec<DocumentId> = terms
        .iter()
        .filter_map(|t| corpus.get(t))
        .flat_map(|list| list.doc_ids())
        .filter(|id| limit_to.map_or(true, |l| l.contains(id)))
        .collect();
    candidates.sort_unstable();
    candidates.dedup();

    let features = extract_features(terms, &candidates, corpus, anchors, docs, params);
    let hits = candidates
        .into_iter()
        .zip(features)
        .map(|(doc_id, f)| SearchHit {
            doc_id,
            title: docs.get(doc_id).map(|r| r.title.clone()).unwrap_or_default(),
            score: weights.score(&f),
        })
        .collect();
    sort_hits(hits)
}
