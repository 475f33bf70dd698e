use crate::index::DocumentId;

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

/// Failures surfaced by the offline jobs and the exchange-format readers.
///
/// Query paths never return these; missing data there degrades to a zero score.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("malformed document {id}: {reason}")]
    MalformedDocument { id: String, reason: String },

    #[error("invalid document id {0:?}")]
    InvalidDocumentId(String),

    #[error("authority scores did not converge after {iterations} iterations (residual {residual})")]
    ConvergenceFailure { iterations: usize, residual: f64 },

    #[error("judgment for query {query:?} references unknown document {doc_id}")]
    TrainingDataMismatch { query: String, doc_id: DocumentId },

    #[error("no training examples carry target class {0}")]
    UnknownTargetClass(i32),

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("{file}:{line}: {reason}")]
    Parse { file: String, line: usize, reason: String },

    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
