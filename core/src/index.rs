use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::SearchError;

pub type Term = String;

/// Stable document identifier: collection partition plus offset inside it.
///
/// Ordering is numeric on `(partition, offset)`, which is what posting list
/// merging and skipping rely on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId {
    pub partition: u32,
    pub offset: u32,
}

impl DocumentId {
    pub fn new(partition: u32, offset: u32) -> Self {
        Self { partition, offset }
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.partition, self.offset)
    }
}

impl FromStr for DocumentId {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || SearchError::InvalidDocumentId(s.to_string());
        let (p, o) = s.trim().split_once('-').ok_or_else(bad)?;
        let partition = p.parse().map_err(|_| bad())?;
        let offset = o.parse().map_err(|_| bad())?;
        Ok(Self { partition, offset })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub doc_id: DocumentId,
    /// Raw occurrences of the term in the document.
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingList {
    pub idf: f64,
    pub document_count: u32,
    pub postings: Vec<Posting>, // sorted by doc_id
}

impl PostingList {
    /// Sorts `postings` and derives idf = ln(N / df) for a collection of `total_docs`.
    pub fn from_postings(mut postings: Vec<Posting>, total_docs: usize) -> Self {
        postings.sort_by_key(|p| p.doc_id);
        let document_count = postings.len() as u32;
        Self { idf: classic_idf(total_docs, document_count), document_count, postings }
    }

    pub fn frequency(&self, doc_id: DocumentId) -> Option<u32> {
        self.postings
            .binary_search_by_key(&doc_id, |p| p.doc_id)
            .ok()
            .map(|i| self.postings[i].frequency)
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = DocumentId> + '_ {
        self.postings.iter().map(|p| p.doc_id)
    }
}

pub fn classic_idf(total_docs: usize, document_count: u32) -> f64 {
    if document_count == 0 || total_docs == 0 {
        return 0.0;
    }
    (total_docs as f64 / document_count as f64).ln()
}

/// Term → posting list. Used for both the body index and the anchor-text index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvertedIndex {
    pub terms: BTreeMap<Term, PostingList>,
}

pub type CorpusIndex = InvertedIndex;
pub type AnchorIndex = InvertedIndex;

impl InvertedIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, term: &str) -> Option<&PostingList> {
        self.terms.get(term)
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Merges per-document term counts into sorted corpus-wide posting lists.
    pub fn from_document_counts<I>(counts: I, total_docs: usize) -> Self
    where
        I: IntoIterator<Item = (DocumentId, HashMap<Term, u32>)>,
    {
        let mut raw: BTreeMap<Term, Vec<Posting>> = BTreeMap::new();
        for (doc_id, doc_counts) in counts {
            for (term, frequency) in doc_counts {
                raw.entry(term).or_default().push(Posting { doc_id, frequency });
            }
        }
        let terms = raw
            .into_iter()
            .map(|(term, postings)| (term, PostingList::from_postings(postings, total_docs)))
            .collect();
        Self { terms }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: DocumentId,
    /// Lower-cased page key; link targets resolve against it.
    pub title: String,
    pub display_name: String,
    pub word_count: u32,
    pub outbound_links: Vec<DocumentId>,
    pub inbound_links: Vec<DocumentId>,
    pub authority_score: f64,
}

/// Document metadata table plus the DocumentId → dense index bijection.
///
/// Records are kept sorted by id, so the dense index of a document is its
/// position in `records`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocTable {
    records: Vec<DocumentRecord>,
    #[serde(skip)]
    positions: HashMap<DocumentId, usize>,
    total_words: u64,
}

impl DocTable {
    pub fn new(mut records: Vec<DocumentRecord>) -> Self {
        records.sort_by_key(|r| r.id);
        records.dedup_by_key(|r| r.id);
        let total_words = records.iter().map(|r| r.word_count as u64).sum();
        let mut table = Self { records, positions: HashMap::new(), total_words };
        table.rebuild_positions();
        table
    }

    /// Restores the id lookup after deserialization.
    pub fn rebuild_positions(&mut self) {
        self.positions = self.records.iter().enumerate().map(|(i, r)| (r.id, i)).collect();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: DocumentId) -> Option<&DocumentRecord> {
        self.dense_index(id).map(|i| &self.records[i])
    }

    pub fn dense_index(&self, id: DocumentId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn records(&self) -> &[DocumentRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.records.iter()
    }

    pub fn average_doc_length(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.total_words as f64 / self.records.len() as f64
    }

    /// Replaces every record's authority score. `scores` is indexed densely.
    pub fn assign_authority(&mut self, scores: &[f64]) {
        for (record, score) in self.records.iter_mut().zip(scores) {
            record.authority_score = *score;
        }
    }

    /// Rebuilds `inbound_links` from the outbound edges of every record.
    pub fn invert_links(&mut self) {
        let mut inbound: Vec<Vec<DocumentId>> = vec![Vec::new(); self.records.len()];
        for record in &self.records {
            for target in &record.outbound_links {
                if let Some(&pos) = self.positions.get(target) {
                    inbound[pos].push(record.id);
                }
            }
        }
        for (record, mut sources) in self.records.iter_mut().zip(inbound) {
            sources.sort();
            sources.dedup();
            record.inbound_links = sources;
        }
    }

    pub fn link_graph(&self) -> LinkGraph {
        LinkGraph::from_docs(self)
    }
}

/// Dense adjacency view of the link graph: `linked_from[i]` holds the dense
/// indices of documents linking to document `i`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkGraph {
    pub linked_from: Vec<Vec<usize>>,
}

impl LinkGraph {
    pub fn from_docs(docs: &DocTable) -> Self {
        let linked_from = docs
            .iter()
            .map(|r| r.inbound_links.iter().filter_map(|id| docs.dense_index(*id)).collect())
            .collect();
        Self { linked_from }
    }

    pub fn len(&self) -> usize {
        self.linked_from.len()
    }

    pub fn is_empty(&self) -> bool {
        self.linked_from.is_empty()
    }

    pub fn inbound_edge_count(&self) -> usize {
        self.linked_from.iter().map(Vec::len).sum()
    }
}
