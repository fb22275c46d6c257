//! Configuration constants.
//!
//! Values shared by the run algebra, the evaluator and the CLI. Keeping them
//! here means tests and benchmarks exercise the same settings as production.
//!
//! # Usage
//!
//! ```
//! use trecrun::config::{DEFAULT_METRICS, RRF_K};
//!
//! assert_eq!(RRF_K, 60);
//! assert!(DEFAULT_METRICS.contains(&"nDCG@10"));
//! ```

// =============================================================================
// Run Algebra
// =============================================================================

/// Damping constant for reciprocal-rank normalization.
///
/// Scores become `1 / (RRF_K + rank)`. The value 60 comes from Cormack,
/// Clarke and Buettcher, "Reciprocal Rank Fusion outperforms Condorcet and
/// individual Rank Learning Methods" (SIGIR 2009).
pub const RRF_K: usize = 60;

/// Gap left between the lowest score of a run and the highest rescaled score
/// spliced in by `concat`.
pub const CONCAT_OFFSET: f64 = 1e-3;

/// Smallest score spread that min-max and standard normalization rescale.
///
/// A query whose range (min-max) or population standard deviation
/// (standard) falls below this absolute bound is treated as constant.
pub const MIN_SCALE: f64 = 10.0 * f64::EPSILON;

// =============================================================================
// Run Format
// =============================================================================

/// Tag written in the sixth column when none is supplied.
pub const DEFAULT_TAG: &str = "trecrun";

/// Iteration marker written in the second column.
pub const ITERATION_MARKER: &str = "Q0";

/// Minimum number of whitespace-separated fields on a run line.
pub const RUN_FIELDS: usize = 5;

/// Minimum number of whitespace-separated fields on a qrels line.
pub const QRELS_FIELDS: usize = 4;

// =============================================================================
// Evaluation
// =============================================================================

/// Metrics computed when the caller does not ask for specific ones.
pub const DEFAULT_METRICS: &[&str] = &[
    "P@1",
    "P@5",
    "P@10",
    "P@20",
    "Judged@10",
    "Judged@20",
    "Judged@50",
    "AP@100",
    "AP@1000",
    "nDCG@5",
    "nDCG@10",
    "nDCG@20",
    "Recall@100",
    "Recall@1000",
    "RR",
];

/// Significance level used when reporting run comparisons.
pub const SIGNIFICANCE_ALPHA: f64 = 0.05;
