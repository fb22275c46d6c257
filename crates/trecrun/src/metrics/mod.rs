//! Evaluation of runs against relevance judgments.
//!
//! Scoring is delegated to a [`MetricsEngine`]: it receives parsed metric
//! specifications, the qrels and the run mapping, and returns per-query
//! scores. Aggregation to a single number per metric is the arithmetic mean
//! over scored queries unless an engine overrides it.
//!
//! [`TrecEvaluator`] is the built-in engine; see its module docs for the
//! exact conventions.
//!
//! # Example
//!
//! ```
//! use trecrun::metrics::{parse_measures, MetricsEngine, TrecEvaluator};
//! use trecrun::{Qrels, Run};
//!
//! let run = Run::new([("1", [("123", 10.0), ("124", 9.0)])]).unwrap();
//! let qrels = Qrels::new([("1", [("123", 0), ("124", 1)])]);
//! let measures = parse_measures(&["RR"]).unwrap();
//!
//! let scores = TrecEvaluator.aggregate(&measures, &qrels, &run.to_map()).unwrap();
//! assert_eq!(scores["RR"], 0.5);
//! ```

mod measure;
mod trec;

pub use measure::{parse_measures, Measure};
pub use trec::TrecEvaluator;

use crate::error::{Result, RunError};
use crate::qrels::Qrels;
use crate::run::RunMap;
use serde::Serialize;
use std::collections::BTreeMap;

/// Metric name → value.
pub type MetricScores = BTreeMap<String, f64>;

/// Query id → metric name → value.
pub type PerQueryScores = BTreeMap<String, MetricScores>;

/// Computes IR metrics for a run.
pub trait MetricsEngine {
    /// Scores every query that has judgments.
    fn per_query(&self, measures: &[Measure], qrels: &Qrels, run: &RunMap) -> Result<PerQueryScores>;

    /// Mean of each metric over the scored queries.
    ///
    /// # Errors
    ///
    /// [`RunError::Evaluation`] if no query of the run has judgments.
    fn aggregate(&self, measures: &[Measure], qrels: &Qrels, run: &RunMap) -> Result<MetricScores> {
        let per_query = self.per_query(measures, qrels, run)?;
        mean_scores(&per_query)
    }
}

/// Averages per-query scores metric by metric.
pub fn mean_scores(per_query: &PerQueryScores) -> Result<MetricScores> {
    if per_query.is_empty() {
        return Err(RunError::Evaluation(
            "no query of the run has relevance judgments".to_string(),
        ));
    }

    let mut sums = MetricScores::new();
    for scores in per_query.values() {
        for (name, value) in scores {
            *sums.entry(name.clone()).or_insert(0.0) += value;
        }
    }
    let n = per_query.len() as f64;
    Ok(sums.into_iter().map(|(name, sum)| (name, sum / n)).collect())
}

/// Result of [`Run::evaluate`](crate::Run::evaluate).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Evaluation {
    /// Metric name → mean over judged queries
    Aggregate(MetricScores),
    /// Query id → metric name → value
    PerQuery(PerQueryScores),
}

impl Evaluation {
    /// Aggregate scores, if this is an aggregate evaluation.
    pub fn aggregate(&self) -> Option<&MetricScores> {
        match self {
            Evaluation::Aggregate(scores) => Some(scores),
            Evaluation::PerQuery(_) => None,
        }
    }

    /// Per-query scores, if this is a per-query evaluation.
    pub fn per_query(&self) -> Option<&PerQueryScores> {
        match self {
            Evaluation::PerQuery(scores) => Some(scores),
            Evaluation::Aggregate(_) => None,
        }
    }
}
