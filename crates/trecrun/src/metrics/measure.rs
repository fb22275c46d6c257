//! Metric names.
//!
//! Names follow the `Name@cutoff` convention used by TREC tooling:
//!
//! | Name | Aliases | Cutoff |
//! |------|---------|--------|
//! | `P@k` | `Precision@k` | required |
//! | `Recall@k` | `R@k` | required |
//! | `AP` / `AP@k` | `MAP` | optional |
//! | `nDCG` / `nDCG@k` | `NDCG` | optional |
//! | `RR` / `RR@k` | `MRR` | optional |
//! | `Judged@k` | | required |
//! | `Success@k` | | required |
//!
//! Names are matched case-insensitively; [`Measure`]'s `Display` output is
//! the canonical spelling used as the key in evaluation results.

use crate::error::{Result, RunError};
use std::fmt;
use std::str::FromStr;

/// A parsed evaluation metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measure {
    /// Fraction of the top k documents that are relevant
    Precision { k: usize },
    /// Fraction of relevant documents found in the top k
    Recall { k: usize },
    /// Average precision, optionally truncated at k
    AveragePrecision { k: Option<usize> },
    /// Normalized discounted cumulative gain, optionally truncated at k
    Ndcg { k: Option<usize> },
    /// Reciprocal rank of the first relevant document
    ReciprocalRank { k: Option<usize> },
    /// Fraction of the top k documents that have any judgment
    Judged { k: usize },
    /// 1 if any of the top k documents is relevant
    Success { k: usize },
}

impl Measure {
    /// Rank cutoff, if the metric has one.
    pub fn cutoff(&self) -> Option<usize> {
        match *self {
            Measure::Precision { k }
            | Measure::Recall { k }
            | Measure::Judged { k }
            | Measure::Success { k } => Some(k),
            Measure::AveragePrecision { k }
            | Measure::Ndcg { k }
            | Measure::ReciprocalRank { k } => k,
        }
    }
}

impl FromStr for Measure {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        let (name, cutoff) = match s.split_once('@') {
            Some((name, k)) => {
                let k: usize = k.parse().map_err(|_| {
                    RunError::Validation(format!("invalid cutoff in metric {s:?}"))
                })?;
                if k == 0 {
                    return Err(RunError::Validation(format!(
                        "cutoff must be positive in metric {s:?}"
                    )));
                }
                (name, Some(k))
            }
            None => (s, None),
        };

        let required = |cutoff: Option<usize>| {
            cutoff.ok_or_else(|| RunError::Validation(format!("metric {s:?} requires a cutoff, e.g. {s}@10")))
        };

        match name.to_ascii_lowercase().as_str() {
            "p" | "precision" => Ok(Measure::Precision { k: required(cutoff)? }),
            "r" | "recall" => Ok(Measure::Recall { k: required(cutoff)? }),
            "ap" | "map" => Ok(Measure::AveragePrecision { k: cutoff }),
            "ndcg" => Ok(Measure::Ndcg { k: cutoff }),
            "rr" | "mrr" => Ok(Measure::ReciprocalRank { k: cutoff }),
            "judged" => Ok(Measure::Judged { k: required(cutoff)? }),
            "success" => Ok(Measure::Success { k: required(cutoff)? }),
            _ => Err(RunError::Validation(format!("unknown metric: {s}"))),
        }
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Measure::Precision { .. } => "P",
            Measure::Recall { .. } => "Recall",
            Measure::AveragePrecision { .. } => "AP",
            Measure::Ndcg { .. } => "nDCG",
            Measure::ReciprocalRank { .. } => "RR",
            Measure::Judged { .. } => "Judged",
            Measure::Success { .. } => "Success",
        };
        match self.cutoff() {
            Some(k) => write!(f, "{name}@{k}"),
            None => f.write_str(name),
        }
    }
}

/// Parses a list of metric names, failing on the first unknown one.
pub fn parse_measures<S: AsRef<str>>(names: &[S]) -> Result<Vec<Measure>> {
    names.iter().map(|name| name.as_ref().parse()).collect()
}
