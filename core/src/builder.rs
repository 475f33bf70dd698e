use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::config::WINDOW_SIZE;
use crate::error::{Result, SearchError};
use crate::index::{AnchorIndex, CorpusIndex, DocTable, DocumentId, DocumentRecord, Term};
use crate::stems::{EnglishStemmer, StemMap, Stemmer};
use crate::tokenizer::{normalize_link, tokenize};
use crate::window::{window_counts, WindowIndex};

/// One document as yielded by the document source. Markup has already been
/// stripped; `body` and anchor texts are plain text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    /// `"<partition>-<offset>"`
    pub id: String,
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub anchors: Vec<AnchorText>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorText {
    pub target: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    pub indexed: usize,
    pub skipped: usize,
    pub links_resolved: usize,
    pub links_dropped: usize,
}

pub struct BuildOutput {
    pub corpus: CorpusIndex,
    pub anchors: AnchorIndex,
    pub docs: DocTable,
    pub windows: WindowIndex,
    pub stems: StemMap,
    pub report: BuildReport,
}

/// Per-document statistics; computed independently for every document.
struct Extracted {
    id: DocumentId,
    title: String,
    display_name: String,
    word_count: u32,
    body: HashMap<Term, u32>,
    windows: Vec<HashMap<Term, u32>>,
    links: Vec<String>,
    anchors: Vec<(String, HashMap<Term, u32>)>,
}

pub struct IndexBuilder<S = EnglishStemmer> {
    window_size: usize,
    stemmer: S,
}

impl Default for IndexBuilder<EnglishStemmer> {
    fn default() -> Self {
        Self::new(EnglishStemmer)
    }
}

impl<S: Stemmer> IndexBuilder<S> {
    pub fn new(stemmer: S) -> Self {
        Self { window_size: WINDOW_SIZE, stemmer }
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size.max(1);
        self
    }

    pub fn build(&self, docs: Vec<SourceDocument>) -> BuildOutput {
        let mut report = BuildReport::default();

        // Map: tokenize every document on the worker pool.
        let extracted: Vec<Result<Extracted>> =
            docs.par_iter().map(|doc| extract(doc, self.window_size)).collect();

        let mut seen: HashSet<DocumentId> = HashSet::new();
        let mut kept: Vec<Extracted> = Vec::with_capacity(extracted.len());
        for item in extracted {
            match item {
                Ok(doc) if seen.insert(doc.id) => kept.push(doc),
                Ok(doc) => {
                    tracing::warn!(doc_id = %doc.id, "duplicate document id, skipping");
                    report.skipped += 1;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "skipping document");
                    report.skipped += 1;
                }
            }
        }
        report.indexed = kept.len();
        let total_docs = kept.len();

        // Reduce: resolve links against page keys, then merge into posting lists.
        let mut by_title: HashMap<String, DocumentId> = HashMap::with_capacity(total_docs);
        for doc in &kept {
            by_title.entry(doc.title.clone()).or_insert(doc.id);
        }

        let mut anchor_counts: HashMap<DocumentId, HashMap<Term, u32>> = HashMap::new();
        let mut records = Vec::with_capacity(total_docs);
        let mut body_counts = Vec::with_capacity(total_docs);
        let mut windows = Vec::with_capacity(total_docs);
        for doc in kept {
            let mut outbound = Vec::new();
            for link in &doc.links {
                match by_title.get(link) {
                    Some(&target) => {
                        outbound.push(target);
                        report.links_resolved += 1;
                    }
                    None => report.links_dropped += 1,
                }
            }
            for (target, counts) in doc.anchors {
                let Some(&target) = by_title.get(&target) else { continue };
                let entry = anchor_counts.entry(target).or_default();
                for (term, n) in counts {
                    *entry.entry(term).or_insert(0) += n;
                }
            }
            records.push(DocumentRecord {
                id: doc.id,
                title: doc.title,
                display_name: doc.display_name,
                word_count: doc.word_count,
                outbound_links: outbound,
                inbound_links: Vec::new(),
                authority_score: 0.0,
            });
            body_counts.push((doc.id, doc.body));
            windows.push((doc.id, doc.windows));
        }

        let corpus = CorpusIndex::from_document_counts(body_counts, total_docs);
        let anchors = AnchorIndex::from_document_counts(anchor_counts, total_docs);
        let windows = WindowIndex::from_document_windows(windows);
        let stems = StemMap::build(corpus.vocabulary(), &self.stemmer);
        let mut docs = DocTable::new(records);
        docs.invert_links();

        tracing::info!(
            indexed = report.indexed,
            skipped = report.skipped,
            terms = corpus.len(),
            anchor_terms = anchors.len(),
            stems = stems.len(),
            links_dropped = report.links_dropped,
            "index build complete"
        );
        BuildOutput { corpus, anchors, docs, windows, stems, report }
    }
}

fn extract(doc: &SourceDocument, window_size: usize) -> Result<Extracted> {
    let malformed = |reason: &str| SearchError::MalformedDocument {
        id: doc.id.clone(),
        reason: reason.to_string(),
    };
    let id: DocumentId = doc.id.parse().map_err(|_| malformed("unparseable id"))?;
    let title = doc
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| malformed("missing title"))?;
    let display_name = doc
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(title)
        .to_string();

    let tokens = tokenize(&doc.body);
    let mut body: HashMap<Term, u32> = HashMap::new();
    for token in &tokens {
        *body.entry(token.clone()).or_insert(0) += 1;
    }

    let mut links: Vec<String> = Vec::new();
    let targets = doc.links.iter().chain(doc.anchors.iter().map(|a| &a.target));
    for target in targets.filter_map(|t| normalize_link(t)) {
        if !links.contains(&target) {
            links.push(target);
        }
    }

    let mut anchors: Vec<(String, HashMap<Term, u32>)> = Vec::new();
    for anchor in &doc.anchors {
        let Some(target) = normalize_link(&anchor.target) else { continue };
        let words = tokenize(&anchor.text);
        if words.is_empty() {
            continue;
        }
        let mut counts: HashMap<Term, u32> = HashMap::new();
        for word in words {
            *counts.entry(word).or_insert(0) += 1;
        }
        anchors.push((target, counts));
    }

    Ok(Extracted {
        id,
        title: title.to_lowercase(),
        display_name,
        word_count: tokens.len() as u32,
        windows: window_counts(&tokens, window_size),
        body,
        links,
        anchors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, title: &str, body: &str, links: &[&str]) -> SourceDocument {
        SourceDocument {
            id: id.into(),
            title: Some(title.into()),
            body: body.into(),
            links: links.iter().map(|l| l.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_postings_links_and_anchors() {
        let mut a = doc("0-1", "Alpha", "cat dog cat", &["Beta#History", "Category:Animals", "Nowhere"]);
        a.anchors.push(AnchorText { target: "Beta".into(), text: "the bird page".into() });
        let b = doc("0-2", "Beta", "dog bird", &["alpha"]);
        let out = IndexBuilder::default().build(vec![a, b]);

        assert_eq!(out.report.indexed, 2);
        assert_eq!(out.report.links_dropped, 1);
        let cat = out.corpus.get("cat").unwrap();
        assert_eq!(cat.postings.len(), 1);
        assert_eq!(cat.postings[0].frequency, 2);
        assert_eq!(out.corpus.get("dog").unwrap().document_count, 2);

        let alpha = out.docs.get(DocumentId::new(0, 1)).unwrap();
        let beta = out.docs.get(DocumentId::new(0, 2)).unwrap();
        assert_eq!(alpha.outbound_links, vec![beta.id]);
        assert_eq!(alpha.inbound_links, vec![beta.id]);
        assert_eq!(alpha.word_count, 3);

        let bird = out.anchors.get("bird").unwrap();
        assert_eq!(bird.postings[0].doc_id, beta.id);
    }

    #[test]
    fn documents_without_title_are_skipped() {
        let mut broken = doc("0-3", "", "text", &[]);
        broken.title = None;
        let out = IndexBuilder::default().build(vec![doc("0-1", "A", "text", &[]), broken]);
        assert_eq!(out.report.skipped, 1);
        assert_eq!(out.docs.len(), 1);
    }
}
