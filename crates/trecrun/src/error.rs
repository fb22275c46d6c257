//! Error types for trecrun.
//!
//! Every fallible operation in the crate returns [`RunError`]. Failures are
//! raised at the point of detection; no operation returns partial results.

use thiserror::Error;

/// Errors that can occur while building, combining or evaluating runs.
#[derive(Debug, Error)]
pub enum RunError {
    /// A run would contain zero rows (empty mapping, empty resource, or every
    /// query truncated away)
    #[error("Cannot construct run: {0}")]
    Construction(String),

    /// Elementwise arithmetic on runs whose query/document key sets differ
    #[error(
        "both runs must contain the same qids and docids; perhaps you should intersect or concat first? \
         (qid {qid}: expected {expected}, got {actual})"
    )]
    ShapeMismatch {
        /// Query id where the shapes first diverge (`<qids>` for the query set itself)
        qid: String,
        /// Keys present in the left operand
        expected: String,
        /// Keys present in the right operand
        actual: String,
    },

    /// Invalid argument: unknown method or metric name, overlapping qids
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Relevance judgments do not cover a query id of the run
    #[error("No relevance judgments for qid {qid}")]
    MissingQrels {
        /// The query id that has no qrels entry
        qid: String,
    },

    /// Requested mode exists in the run format but is not supported
    #[error("Not implemented: {0}")]
    NotImplemented(String),

    /// Malformed line in a run or qrels stream
    #[error("Parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// Transport failure from the line source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The metrics engine had nothing to score
    #[error("Evaluation failed: {0}")]
    Evaluation(String),
}

pub type Result<T> = std::result::Result<T, RunError>;

/// Formats a key set compactly for error messages.
pub(crate) fn describe_keys<'a>(keys: impl Iterator<Item = &'a String>) -> String {
    const MAX_SHOWN: usize = 8;

    let keys: Vec<&String> = keys.collect();
    let shown: Vec<&str> = keys.iter().take(MAX_SHOWN).map(|k| k.as_str()).collect();
    if keys.len() > MAX_SHOWN {
        format!("{{{}, ... ({} total)}}", shown.join(", "), keys.len())
    } else {
        format!("{{{}}}", shown.join(", "))
    }
}
