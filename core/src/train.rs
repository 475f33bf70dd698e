//! Offline training of the learned ranker from graded relevance judgments.
//!
//! Judgments are grouped by query text, turned into feature vectors with the
//! same extractor the learned ranker uses at query time, and fit with a
//! one-vs-rest linear SVM (L2-regularized squared hinge loss solved by dual
//! coordinate descent). The coefficients for the target grade become the
//! ranking weights.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::config::{Bm25Params, TrainerConfig};
use crate::error::{Result, SearchError};
use crate::index::{AnchorIndex, CorpusIndex, DocTable, DocumentId};
use crate::retrieval::{extract_features, FeatureVector, Weights, FEATURE_COUNT};
use crate::tokenizer::tokenize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
    pub query: String,
    pub doc_id: DocumentId,
    pub grade: i32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<i32>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Builds feature vectors for every judgment whose document is known.
pub fn build_training_set(
    judgments: &[Judgment],
    docs: &DocTable,
    corpus: &CorpusIndex,
    anchors: &AnchorIndex,
    params: &Bm25Params,
) -> TrainingSet {
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<(DocumentId, i32)>> = HashMap::new();
    for judgment in judgments {
        if docs.get(judgment.doc_id).is_none() {
            let err = SearchError::TrainingDataMismatch {
                query: judgment.query.clone(),
                doc_id: judgment.doc_id,
            };
            tracing::warn!(error = %err, "skipping judgment");
            continue;
        }
        groups
            .entry(judgment.query.as_str())
            .or_insert_with(|| {
                order.push(judgment.query.as_str());
                Vec::new()
            })
            .push((judgment.doc_id, judgment.grade));
    }

    let mut set = TrainingSet::default();
    for query in order {
        let judged = &groups[query];
        let terms = tokenize(query);
        let candidates: Vec<DocumentId> = judged.iter().map(|(id, _)| *id).collect();
        set.features.extend(extract_features(&terms, &candidates, corpus, anchors, docs, params));
        set.labels.extend(judged.iter().map(|(_, grade)| *grade));
    }
    set
}

/// `train(judgments, docs, corpus, anchors) → Weights`
pub fn train(
    judgments: &[Judgment],
    docs: &DocTable,
    corpus: &CorpusIndex,
    anchors: &AnchorIndex,
    config: &TrainerConfig,
) -> Result<Weights> {
    let set = build_training_set(judgments, docs, corpus, anchors, &Bm25Params::default());
    tracing::info!(examples = set.len(), "training linear ranker");
    let model = LinearSvm::fit(&set, config)?;
    model.weights_for(config.target_class).ok_or(SearchError::UnknownTargetClass(config.target_class))
}

/// One binary separator per class, `w · x + bias`.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearSvm {
    models: BTreeMap<i32, ([f64; FEATURE_COUNT], f64)>,
}

impl LinearSvm {
    pub fn fit(set: &TrainingSet, config: &TrainerConfig) -> Result<Self> {
        if set.is_empty() {
            return Err(SearchError::EmptyTrainingSet);
        }
        let mut classes: Vec<i32> = set.labels.clone();
        classes.sort_unstable();
        classes.dedup();

        let mut models = BTreeMap::new();
        for class in classes {
            let signs: Vec<f64> = set.labels.iter().map(|&l| if l == class { 1.0 } else { -1.0 }).collect();
            models.insert(class, fit_binary(&set.features, &signs, config));
        }
        Ok(Self { models })
    }

    pub fn weights_for(&self, class: i32) -> Option<Weights> {
        self.models.get(&class).map(|(w, _)| Weights(*w))
    }
}

/// Dual coordinate descent for the L2-loss linear SVM with a constant bias
/// feature appended to every example.
fn fit_binary(x: &[FeatureVector], y: &[f64], config: &TrainerConfig) -> ([f64; FEATURE_COUNT], f64) {
    let diag = 0.5 / config.c;
    let mut w = [0.0f64; FEATURE_COUNT];
    let mut bias = 0.0f64;
    let mut alpha = vec![0.0f64; x.len()];
    let q_diag: Vec<f64> = x.iter().map(|xi| xi.iter().map(|v| v * v).sum::<f64>() + 1.0 + diag).collect();

    for iteration in 0..config.max_iterations {
        let mut pg_max = f64::NEG_INFINITY;
        let mut pg_min = f64::INFINITY;
        for i in 0..x.len() {
            let margin: f64 = w.iter().zip(&x[i]).map(|(a, b)| a * b).sum::<f64>() + bias;
            let g = y[i] * margin - 1.0 + diag * alpha[i];
            let pg = if alpha[i] == 0.0 { g.min(0.0) } else { g };
            pg_max = pg_max.max(pg);
            pg_min = pg_min.min(pg);
            if pg.abs() > 1e-12 {
                let old = alpha[i];
                alpha[i] = (alpha[i] - g / q_diag[i]).max(0.0);
                let delta = (alpha[i] - old) * y[i];
                for (wj, xj) in w.iter_mut().zip(&x[i]) {
                    *wj += delta * xj;
                }
                bias += delta;
            }
        }
        if pg_max - pg_min <= config.tolerance {
            tracing::debug!(iterations = iteration + 1, "svm converged");
            return (w, bias);
        }
    }
    tracing::warn!(max_iterations = config.max_iterations, "svm reached iteration limit");
    (w, bias)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{IndexBuilder, SourceDocument};

    fn separable() -> TrainingSet {
        let mut set = TrainingSet::default();
        for k in 0..5 {
            let s = 1.0 + k as f64 * 0.1;
            set.features.push([s, 0.0, 0.0, 0.0, 0.0]);
            set.labels.push(2);
            set.features.push([0.0, s, 0.0, 0.0, 0.0]);
            set.labels.push(0);
            set.features.push([0.0, 0.0, s, 0.0, 0.0]);
            set.labels.push(1);
        }
        set
    }

    #[test]
    fn one_vs_rest_separates_classes() {
        let model = LinearSvm::fit(&separable(), &TrainerConfig::default()).unwrap();
        assert_eq!(model.models.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
        let decision = |class: i32, x: &FeatureVector| {
            let (w, bias) = model.models[&class];
            Weights(w).score(x) + bias
        };
        let target = model.weights_for(2).unwrap().0;
        assert!(target[0] > 0.0);
        assert!(target[1] < 0.0);
        let x = [1.0, 0.0, 0.0, 0.0, 0.0];
        assert!(decision(2, &x) > 0.0);
        assert!(decision(0, &x) < 0.0);
        assert!(decision(1, &x) < 0.0);
    }

    #[test]
    fn empty_set_is_rejected() {
        assert!(matches!(
            LinearSvm::fit(&TrainingSet::default(), &TrainerConfig::default()),
            Err(SearchError::EmptyTrainingSet)
        ));
    }

    #[test]
    fn judgments_on_unknown_documents_are_skipped() {
        let out = IndexBuilder::default().build(vec![
            SourceDocument { id: "0-1".into(), title: Some("Calculus".into()), body: "integral derivative".into(), ..Default::default() },
            SourceDocument { id: "0-2".into(), title: Some("Algebra".into()), body: "group ring".into(), ..Default::default() },
        ]);
        let judgments = vec![
            Judgment { query: "integral".into(), doc_id: DocumentId::new(0, 1), grade: 2 },
            Judgment { query: "integral".into(), doc_id: DocumentId::new(0, 2), grade: 0 },
            Judgment { query: "integral".into(), doc_id: DocumentId::new(7, 7), grade: 2 },
            Judgment { query: "ring".into(), doc_id: DocumentId::new(0, 2), grade: 2 },
        ];
        let set = build_training_set(&judgments, &out.docs, &out.corpus, &out.anchors, &Bm25Params::default());
        assert_eq!(set.labels, vec![2, 0, 2]);

        let weights = train(&judgments, &out.docs, &out.corpus, &out.anchors, &TrainerConfig::default()).unwrap();
        assert!(weights.0[3] > 0.0);

        let missing = TrainerConfig { target_class: 5, ..TrainerConfig::default() };
        assert!(matches!(
            train(&judgments, &out.docs, &out.corpus, &out.anchors, &missing),
            Err(SearchError::UnknownTargetClass(5))
        ));
    }
}
