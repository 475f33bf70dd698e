//! BM25 with the classic ln(N/n) idf or the Robertson-Sparck-Jones weight.

use std::collections::{HashMap, HashSet};

use crate::config::{Bm25Params, PROBABILISTIC_IDF_FLOOR};
use crate::index::{DocTable, DocumentId, InvertedIndex, PostingList};
use crate::retrieval::{ScoreBoard, SearchHit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bm25Variant {
    Classic,
    Probabilistic,
}

/// Scores every document containing at least one of `terms`.
///
/// Terms missing from `index` contribute nothing. With `limit_to`, documents
/// outside the set are never scored.
pub fn bm25(
    terms: &[String],
    index: &InvertedIndex,
    docs: &DocTable,
    params: &Bm25Params,
    variant: Bm25Variant,
    limit_to: Option<&HashSet<DocumentId>>,
) -> Vec<SearchHit> {
    let mut query_counts: Vec<(&str, u32)> = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    for term in terms {
        match seen.get(term.as_str()) {
            Some(&i) => query_counts[i].1 += 1,
            None => {
                seen.insert(term.as_str(), query_counts.len());
                query_counts.push((term.as_str(), 1));
            }
        }
    }

    let avgdl = docs.average_doc_length();
    let total_docs = docs.len();
    let mut board = ScoreBoard::default();
    for (term, qf) in query_counts {
        let Some(list) = index.get(term) else { continue };
        let weight = term_weight(list, total_docs, params, variant);
        let query_weight = ((params.k2 + 1.0) * qf as f64) / (params.k2 + qf as f64);
        for posting in &list.postings {
            if limit_to.is_some_and(|l| !l.contains(&posting.doc_id)) {
                continue;
            }
            let Some(record) = docs.get(posting.doc_id) else { continue };
            let tf = posting.frequency as f64;
            let doc_weight = (params.k1 + 1.0) * tf / (length_norm(record.word_count, avgdl, params) + tf);
            board.add(posting.doc_id, weight * doc_weight * query_weight);
        }
    }
    board.into_hits(docs)
}

fn length_norm(word_count: u32, avgdl: f64, params: &Bm25Params) -> f64 {
    if avgdl <= 0.0 {
        return params.k1;
    }
    params.k1 * ((1.0 - params.b) + params.b * word_count as f64 / avgdl)
}

fn term_weight(list: &PostingList, total_docs: usize, params: &Bm25Params, variant: Bm25Variant) -> f64 {
    match variant {
        Bm25Variant::Classic => list.idf,
        Bm25Variant::Probabilistic => probabilistic_idf(list.document_count, total_docs, params),
    }
}

/// Robertson-Sparck-Jones relevance weight, floored so unjudged terms cannot
/// drag a score far below zero.
pub fn probabilistic_idf(document_count: u32, total_docs: usize, params: &Bm25Params) -> f64 {
    let n_i = document_count as f64;
    let n = total_docs as f64;
    let r = params.relevant;
    let r_i = params.relevant_with_term;
    let relevant_odds = (r_i + 0.5) / (r - r_i + 0.5);
    let background_odds = (n_i - r_i + 0.5) / (n - n_i - r + r_i + 0.5);
    let weight = (relevant_odds / background_odds).log10();
    if weight.is_nan() {
        return PROBABILISTIC_IDF_FLOOR;
    }
    weight.max(PROBABILISTIC_IDF_FLOOR)
}
