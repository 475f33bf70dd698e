use anyhow::{Context, Result};
use searchcore::config::MAX_EDIT_DISTANCE;
use searchcore::persist::{load_all, IndexPaths};
use searchcore::{Correction, NormalizedQuery, QueryOptions, RetrievalMode, SearchSnapshot, SnapshotHandle};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub mode: RetrievalMode,
}
fn default_k() -> usize { searchcore::config::DEFAULT_TOP_K }

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    /// Corrected query text when spelling correction changed the query.
    pub interpreted_as: Option<String>,
    pub corrections: Vec<Correction>,
    pub mode: RetrievalMode,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f64,
    pub title: String,
    pub display_name: String,
}

pub struct Searcher {
    index_dir: Option<PathBuf>,
    snapshot: SnapshotHandle,
    max_edits: usize,
}

impl Searcher {
    pub fn open(index_dir: impl Into<PathBuf>) -> Result<Self> {
        let index_dir = index_dir.into();
        let snapshot = load_all(&IndexPaths::new(&index_dir))
            .with_context(|| format!("loading index from {}", index_dir.display()))?;
        tracing::info!(documents = snapshot.docs.len(), terms = snapshot.corpus.len(), "index loaded");
        Ok(Self { index_dir: Some(index_dir), snapshot: SnapshotHandle::new(snapshot), max_edits: MAX_EDIT_DISTANCE })
    }

    pub fn from_snapshot(snapshot: SearchSnapshot) -> Self {
        Self { index_dir: None, snapshot: SnapshotHandle::new(snapshot), max_edits: MAX_EDIT_DISTANCE }
    }

    /// Largest edit distance spelling correction will accept.
    pub fn with_max_edits(mut self, max_edits: usize) -> Self {
        self.max_edits = max_edits;
        self
    }

    /// Re-reads the index directory and swaps it in; searches already running
    /// finish against the old snapshot.
    pub fn reload(&self) -> Result<()> {
        let Some(dir) = &self.index_dir else { return Ok(()) };
        let next = load_all(&IndexPaths::new(dir))?;
        self.snapshot.swap(next);
        tracing::info!(index = %dir.display(), "index reloaded");
        Ok(())
    }

    pub fn snapshot(&self) -> Arc<SearchSnapshot> {
        self.snapshot.current()
    }

    pub fn search(&self, params: &SearchParams) -> SearchResponse {
        let start = std::time::Instant::now();
        let snapshot = self.snapshot.current();
        let normalizer = snapshot.normalizer().with_max_edits(self.max_edits);
        let options = QueryOptions::default();

        let mut normalized = normalizer.normalize(&params.q);
        let mut hits = snapshot.query(&normalized.groups, params.mode, &options);
        // An AND query can miss on one misspelled word even when the rest hit.
        if hits.is_empty() && !normalized.is_empty() {
            let corrected = normalizer.normalize_corrected(&params.q);
            if !corrected.corrections.is_empty() {
                hits = snapshot.query(&corrected.groups, params.mode, &options);
                normalized = corrected;
            }
        }

        let total_hits = hits.len();
        let k = params.k.max(1).min(100);
        let results = hits
            .into_iter()
            .take(k)
            .map(|hit| SearchHit {
                display_name: snapshot
                    .docs
                    .get(hit.doc_id)
                    .map(|r| r.display_name.clone())
                    .unwrap_or_else(|| hit.title.clone()),
                doc_id: hit.doc_id.to_string(),
                score: hit.score,
                title: hit.title,
            })
            .collect();

        let elapsed = start.elapsed();
        tracing::debug!(query = %params.q, mode = ?params.mode, total_hits, "search");
        SearchResponse {
            query: params.q.clone(),
            interpreted_as: interpreted_as(&normalized),
            corrections: normalized.corrections,
            mode: params.mode,
            took_s: elapsed.as_secs_f64(),
            total_hits,
            results,
        }
    }
}

fn interpreted_as(q: &NormalizedQuery) -> Option<String> {
    (!q.corrections.is_empty()).then(|| q.tokens.join(" "))
}
