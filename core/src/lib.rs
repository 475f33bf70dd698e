//! Link-aware document search: index construction, authority ranking,
//! BM25 / conjunctive / learned retrieval, query normalization and ranker
//! training.

pub mod builder;
pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod query;
pub mod rank;
pub mod retrieval;
pub mod snapshot;
pub mod stems;
pub mod tokenizer;
pub mod train;
pub mod window;

pub use builder::{BuildOutput, BuildReport, IndexBuilder, SourceDocument};
pub use error::{Result, SearchError};
pub use index::{AnchorIndex, CorpusIndex, DocTable, DocumentId, DocumentRecord, LinkGraph, Posting, PostingList, Term};
pub use query::{Correction, NormalizedQuery, QueryNormalizer};
pub use rank::authority_scores;
pub use retrieval::{query, QueryOptions, RetrievalMode, SearchHit, Weights};
pub use snapshot::{SearchSnapshot, SnapshotHandle};
pub use train::{train, Judgment};
