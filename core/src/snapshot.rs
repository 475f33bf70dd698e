//! Immutable bundle of everything a query needs, shared across readers by `Arc`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::builder::BuildOutput;
use crate::index::{AnchorIndex, CorpusIndex, DocTable};
use crate::query::QueryNormalizer;
use crate::retrieval::{self, QueryOptions, RetrievalMode, SearchHit, TermGroup, Weights};
use crate::stems::StemMap;
use crate::window::WindowIndex;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSnapshot {
    pub corpus: CorpusIndex,
    pub anchors: AnchorIndex,
    pub docs: DocTable,
    pub windows: WindowIndex,
    pub stems: StemMap,
    pub weights: Weights,
}

impl SearchSnapshot {
    pub fn from_build(out: BuildOutput, weights: Weights) -> Self {
        Self {
            corpus: out.corpus,
            anchors: out.anchors,
            docs: out.docs,
            windows: out.windows,
            stems: out.stems,
            weights,
        }
    }

    /// Normalizer backed by this snapshot's vocabulary, stems and windows.
    pub fn normalizer(&self) -> QueryNormalizer<'_> {
        QueryNormalizer::new(&self.corpus, &self.stems).with_windows(&self.windows)
    }

    pub fn query(&self, groups: &[TermGroup], mode: RetrievalMode, options: &QueryOptions) -> Vec<SearchHit> {
        retrieval::query(groups, &self.corpus, &self.docs, &self.anchors, &self.weights, mode, options)
    }
}

/// Current snapshot for concurrent readers. Readers clone the `Arc` and never
/// hold the lock while querying; a rebuild replaces the whole snapshot.
#[derive(Debug, Default)]
pub struct SnapshotHandle {
    current: RwLock<Arc<SearchSnapshot>>,
}

impl SnapshotHandle {
    pub fn new(snapshot: SearchSnapshot) -> Self {
        Self { current: RwLock::new(Arc::new(snapshot)) }
    }

    pub fn current(&self) -> Arc<SearchSnapshot> {
        self.current.read().clone()
    }

    /// Installs `next` and returns the snapshot it replaced.
    pub fn swap(&self, next: SearchSnapshot) -> Arc<SearchSnapshot> {
        std::mem::replace(&mut *self.current.write(), Arc::new(next))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{IndexBuilder, SourceDocument};

    fn snapshot(body: &str) -> SearchSnapshot {
        let out = IndexBuilder::default().build(vec![SourceDocument {
            id: "0-1".into(),
            title: Some("Only".into()),
            body: body.into(),
            ..Default::default()
        }]);
        SearchSnapshot::from_build(out, Weights::default())
    }

    #[test]
    fn readers_keep_their_snapshot_across_a_swap() {
        let handle = SnapshotHandle::new(snapshot("alpha"));
        let before = handle.current();
        let old = handle.swap(snapshot("beta"));
        assert!(Arc::ptr_eq(&before, &old));
        assert!(before.corpus.contains("alpha"));
        assert!(handle.current().corpus.contains("beta"));
        assert!(!handle.current().corpus.contains("alpha"));
    }
}
