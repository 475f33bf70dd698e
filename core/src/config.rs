//! Tuning constants and the parameter structs built from them.
//!
//! Binaries override individual fields from command-line flags.

/// BM25 term-frequency saturation.
pub const BM25_K1: f64 = 1.2;
/// BM25 query-term-frequency saturation.
pub const BM25_K2: f64 = 100.0;
/// BM25 length normalization.
pub const BM25_B: f64 = 0.75;
/// Lower bound on the Robertson-Sparck-Jones term weight.
pub const PROBABILISTIC_IDF_FLOOR: f64 = -0.25;

/// Probability of leaking to a uniformly chosen document.
pub const DAMPING: f64 = 0.15;
pub const RANK_TOLERANCE: f64 = 1e-3;
pub const RANK_MAX_ITERATIONS: usize = 10_000;

/// Tokens per window in the co-occurrence index.
pub const WINDOW_SIZE: usize = 30;
pub const MAX_EDIT_DISTANCE: usize = 2;
pub const DEFAULT_TOP_K: usize = 10;

pub const SVM_C: f64 = 1.0;
pub const SVM_MAX_ITERATIONS: usize = 2_000;
pub const SVM_TOLERANCE: f64 = 1e-4;
pub const DEFAULT_TARGET_CLASS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub k2: f64,
    pub b: f64,
    /// Judged-relevant document count for the probabilistic weight.
    pub relevant: f64,
    /// Judged-relevant documents containing the term.
    pub relevant_with_term: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: BM25_K1, k2: BM25_K2, b: BM25_B, relevant: 0.0, relevant_with_term: 0.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankConfig {
    pub damping: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for RankConfig {
    fn default() -> Self {
        Self { damping: DAMPING, tolerance: RANK_TOLERANCE, max_iterations: RANK_MAX_ITERATIONS }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    pub c: f64,
    pub max_iterations: usize,
    pub tolerance: f64,
    /// Relevance grade whose one-vs-rest coefficients become the weights.
    pub target_class: i32,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            c: SVM_C,
            max_iterations: SVM_MAX_ITERATIONS,
            tolerance: SVM_TOLERANCE,
            target_class: DEFAULT_TARGET_CLASS,
        }
    }
}
