//! Per-query score normalization and rank fusion.
//!
//! Each query's score vector is normalized independently:
//!
//! | Method | Name | Formula |
//! |--------|------|---------|
//! | [`Normalization::ReciprocalRank`] | `rr` | `1 / (RRF_K + rank)` |
//! | [`Normalization::MinMax`] | `minmax` | `(x - min) / (max - min)` |
//! | [`Normalization::Standard`] | `standard` | `(x - mean) / std` (population) |
//!
//! Constant score vectors have no spread; min-max and standard scaling map
//! every score of such a query to `0.0`. A vector counts as constant when
//! all of its scores are equal, or when its spread (range for min-max,
//! population standard deviation for standard) is below the absolute bound
//! [`MIN_SCALE`], `10 * f64::EPSILON`. The bound does not grow with the
//! magnitude of the scores: `1e6` and `1e6 + 2e-9` standardize to about
//! `-1` and `1`, while `0.0` and `1e-16` both become `0.0`.

use super::{rank_documents, DocScores, Run, RunMap};
use crate::config::{MIN_SCALE, RRF_K};
use crate::error::{Result, RunError};
use std::fmt;
use std::str::FromStr;

/// Score normalization method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Normalization {
    /// Replace scores with reciprocal-rank scores, `1 / (60 + rank)`
    #[default]
    ReciprocalRank,
    /// Rescale to `[0, 1]`
    MinMax,
    /// Zero mean, unit population variance
    Standard,
}

impl FromStr for Normalization {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "rr" => Ok(Normalization::ReciprocalRank),
            "minmax" => Ok(Normalization::MinMax),
            "standard" => Ok(Normalization::Standard),
            other => Err(RunError::Validation(format!(
                "unknown method: {other} (expected rr, minmax or standard)"
            ))),
        }
    }
}

impl fmt::Display for Normalization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Normalization::ReciprocalRank => "rr",
            Normalization::MinMax => "minmax",
            Normalization::Standard => "standard",
        };
        f.write_str(name)
    }
}

impl Run {
    /// Normalizes every query's scores with `method`.
    ///
    /// # Example
    ///
    /// ```
    /// use trecrun::{Normalization, Run};
    ///
    /// let run = Run::new([("1", [("123", 10.0), ("124", 9.0)])]).unwrap();
    /// let rr = run.normalize(Normalization::ReciprocalRank);
    /// assert_eq!(rr.get("1").unwrap()["123"], 1.0 / 61.0);
    /// assert_eq!(rr.get("1").unwrap()["124"], 1.0 / 62.0);
    /// ```
    pub fn normalize(&self, method: Normalization) -> Run {
        let results: RunMap = self
            .results
            .iter()
            .map(|(qid, docs)| {
                let normalized = match method {
                    Normalization::ReciprocalRank => reciprocal_rank(docs),
                    Normalization::MinMax => min_max(docs),
                    Normalization::Standard => standardize(docs),
                };
                (qid.clone(), normalized)
            })
            .collect();
        Run { results }
    }
}

fn reciprocal_rank(docs: &DocScores) -> DocScores {
    rank_documents(docs)
        .into_iter()
        .enumerate()
        .map(|(idx, (docid, _))| {
            let rank = (idx + 1) as f64; // 1-indexed
            (docid.to_string(), 1.0 / (RRF_K as f64 + rank))
        })
        .collect()
}

fn min_max(docs: &DocScores) -> DocScores {
    let min = docs.values().copied().fold(f64::INFINITY, f64::min);
    let max = docs.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;

    docs.iter()
        .map(|(docid, &score)| {
            let scaled = if range >= MIN_SCALE {
                (score - min) / range
            } else {
                0.0
            };
            (docid.clone(), scaled)
        })
        .collect()
}

fn standardize(docs: &DocScores) -> DocScores {
    let n = docs.len() as f64;
    let mean = docs.values().sum::<f64>() / n;
    let variance = docs.values().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
    let std = variance.sqrt();
    // Equal scores are checked directly: the mean of equal values can round
    // away from them and leave a spurious spread
    let mut scores = docs.values();
    let first = scores.next().copied();
    let constant = scores.all(|&s| Some(s) == first);
    let degenerate = constant || std < MIN_SCALE;

    docs.iter()
        .map(|(docid, &score)| {
            let scaled = if degenerate { 0.0 } else { (score - mean) / std };
            (docid.clone(), scaled)
        })
        .collect()
}

/// Fuses runs by summing their normalized scores (CombSUM).
///
/// The result covers the union of all queries and documents. A document a
/// run did not retrieve contributes nothing for that run. With
/// [`Normalization::ReciprocalRank`] this is reciprocal rank fusion.
///
/// # Errors
///
/// [`RunError::Construction`] if `runs` is empty.
pub fn fuse(runs: &[Run], method: Normalization) -> Result<Run> {
    if runs.is_empty() {
        return Err(RunError::Construction("no runs to fuse".to_string()));
    }

    let mut results = RunMap::new();
    for run in runs {
        for (qid, docs) in run.normalize(method).results {
            let fused = results.entry(qid).or_default();
            for (docid, score) in docs {
                *fused.entry(docid).or_insert(0.0) += score;
            }
        }
    }
    Run::from_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(entries: &[(&str, &[(&str, f64)])]) -> Run {
        Run::new(entries.iter().map(|(qid, docs)| (*qid, docs.iter().copied())))
            .unwrap()
    }

    #[test]
    fn test_rr_scores_by_rank() {
        let base = run(&[("1", &[("123", 10.0), ("124", 9.0)]), ("2", &[("125", 9.0)])]);
        let rr = base.normalize(Normalization::ReciprocalRank);

        assert_eq!(rr.get("1").unwrap()["123"], 1.0 / 61.0);
        assert_eq!(rr.get("1").unwrap()["124"], 1.0 / 62.0);
        assert_eq!(rr.get("2").unwrap()["125"], 1.0 / 61.0);
        assert_ne!(rr.cache_hash(), base.cache_hash());
    }

    #[test]
    fn test_rr_ignores_score_magnitude() {
        let a = run(&[("q", &[("x", 1000.0), ("y", 0.001)])]);
        let b = run(&[("q", &[("x", 2.0), ("y", 1.0)])]);
        assert_eq!(
            a.normalize(Normalization::ReciprocalRank),
            b.normalize(Normalization::ReciprocalRank)
        );
    }

    #[test]
    fn test_minmax() {
        let base = run(&[("q", &[("a", 2.0), ("b", 4.0), ("c", 6.0)])]);
        let scaled = base.normalize(Normalization::MinMax);
        let docs = scaled.get("q").unwrap();

        assert_eq!(docs["a"], 0.0);
        assert_eq!(docs["b"], 0.5);
        assert_eq!(docs["c"], 1.0);
    }

    #[test]
    fn test_minmax_constant_scores_map_to_zero() {
        let base = run(&[("q", &[("a", 3.3), ("b", 3.3)]), ("single", &[("z", 7.0)])]);
        let scaled = base.normalize(Normalization::MinMax);

        assert!(scaled.iter().all(|(_, docs)| docs.values().all(|&s| s == 0.0)));
    }

    #[test]
    fn test_standard() {
        let base = run(&[("q", &[("a", 1.0), ("b", 2.0), ("c", 3.0)])]);
        let scaled = base.normalize(Normalization::Standard);
        let docs = scaled.get("q").unwrap();

        let mean: f64 = docs.values().sum::<f64>() / 3.0;
        let var: f64 = docs.values().map(|s| (s - mean).powi(2)).sum::<f64>() / 3.0;
        assert!(mean.abs() < 1e-12);
        assert!((var - 1.0).abs() < 1e-12);
        assert!((docs["c"] - 1.224744871391589).abs() < 1e-12);
    }

    #[test]
    fn test_standard_constant_scores_map_to_zero() {
        let base = run(&[("q", &[("a", 0.1), ("b", 0.1), ("c", 0.1)])]);
        let scaled = base.normalize(Normalization::Standard);
        assert!(scaled.get("q").unwrap().values().all(|&s| s == 0.0));
    }

    #[test]
    fn test_minmax_spread_below_min_scale() {
        let tiny = run(&[("q", &[("a", 0.0), ("b", 1e-16)])]);
        let scaled = tiny.normalize(Normalization::MinMax);
        assert!(scaled.get("q").unwrap().values().all(|&s| s == 0.0));

        let small = run(&[("q", &[("a", 0.0), ("b", 1e-14)])]);
        let scaled = small.normalize(Normalization::MinMax);
        assert_eq!(scaled.get("q").unwrap()["a"], 0.0);
        assert_eq!(scaled.get("q").unwrap()["b"], 1.0);
    }

    #[test]
    fn test_standard_large_magnitude_small_spread() {
        let base = run(&[("q", &[("a", 1e6), ("b", 1e6 + 2e-9)])]);
        let scaled = base.normalize(Normalization::Standard);
        let docs = scaled.get("q").unwrap();

        assert!(docs["a"] < -0.8 && docs["a"] > -1.2);
        assert!(docs["b"] > 0.8 && docs["b"] < 1.2);
    }

    #[test]
    fn test_standard_constant_large_magnitude() {
        let base = run(&[("q", &[("a", 1e6 + 0.1), ("b", 1e6 + 0.1), ("c", 1e6 + 0.1)])]);
        let scaled = base.normalize(Normalization::Standard);
        assert!(scaled.get("q").unwrap().values().all(|&s| s == 0.0));

        let tiny = run(&[("q", &[("a", 0.0), ("b", 1e-16)])]);
        let scaled = tiny.normalize(Normalization::Standard);
        assert!(scaled.get("q").unwrap().values().all(|&s| s == 0.0));
    }

    #[test]
    fn test_method_names() {
        for method in [
            Normalization::ReciprocalRank,
            Normalization::MinMax,
            Normalization::Standard,
        ] {
            assert_eq!(method.to_string().parse::<Normalization>().unwrap(), method);
        }

        let err = "zscore".parse::<Normalization>().unwrap_err();
        assert!(matches!(err, RunError::Validation(_)));
        assert!(err.to_string().contains("zscore"));
    }

    #[test]
    fn test_fuse_rr() {
        let a = run(&[("q", &[("x", 9.0), ("y", 8.0)])]);
        let b = run(&[("q", &[("y", 5.0), ("z", 1.0)]), ("p", &[("w", 1.0)])]);

        let fused = fuse(&[a, b], Normalization::ReciprocalRank).unwrap();
        let docs = fused.get("q").unwrap();

        // y: rank 2 in a, rank 1 in b
        assert!((docs["y"] - (1.0 / 62.0 + 1.0 / 61.0)).abs() < 1e-12);
        assert!((docs["x"] - 1.0 / 61.0).abs() < 1e-12);
        assert!((docs["z"] - 1.0 / 62.0).abs() < 1e-12);
        assert_eq!(fused.ranked("q")[0].0, "y");
        assert!(fused.contains("p"));
    }

    #[test]
    fn test_fuse_empty() {
        assert!(matches!(
            fuse(&[], Normalization::MinMax),
            Err(RunError::Construction(_))
        ));
    }
}
