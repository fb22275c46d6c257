//! Ranking and set operations on runs.
//!
//! - [`Run::topk`]: keep the k best documents per query
//! - [`Run::intersect`]: shared queries and shared documents
//! - [`Run::union_qids`]: merge runs over disjoint query sets
//! - [`Run::difference`]: drop documents the other run retrieved
//! - [`Run::concat`]: append the other run's extra documents below ours

use super::{rank_documents, DocScores, Run, RunMap};
use crate::config::CONCAT_OFFSET;
use crate::error::{Result, RunError};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How [`Run::union_qids`] treats query ids present in both runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SharedQids {
    /// Overlapping query ids are an error
    #[default]
    Disallow,
}

impl FromStr for SharedQids {
    type Err = RunError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "disallow" => Ok(SharedQids::Disallow),
            other => Err(RunError::NotImplemented(format!(
                "shared_qids={other:?}; only \"disallow\" is implemented"
            ))),
        }
    }
}

impl fmt::Display for SharedQids {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharedQids::Disallow => write!(f, "disallow"),
        }
    }
}

impl Run {
    /// Keeps the `k` highest-scoring documents of every query.
    ///
    /// Queries with at most `k` documents are copied unchanged. Equal scores
    /// are ordered by ascending document id, so truncation is deterministic.
    ///
    /// # Errors
    ///
    /// [`RunError::Construction`] when `k == 0`, since every query would be
    /// left without documents.
    pub fn topk(&self, k: usize) -> Result<Run> {
        let results: RunMap = self
            .results
            .iter()
            .map(|(qid, docs)| {
                let kept: DocScores = if docs.len() > k {
                    rank_documents(docs)
                        .into_iter()
                        .take(k)
                        .map(|(docid, score)| (docid.to_string(), score))
                        .collect()
                } else {
                    docs.clone()
                };
                (qid.clone(), kept)
            })
            .collect();
        Run::from_results(results)
    }

    /// Restricts both runs to what they have in common.
    ///
    /// Only queries present in both runs survive; within each, only documents
    /// present in both. Scores come from `self`.
    ///
    /// # Errors
    ///
    /// [`RunError::Construction`] if no document is shared.
    pub fn intersect(&self, other: &Run) -> Result<Run> {
        let results: RunMap = self
            .results
            .iter()
            .filter_map(|(qid, docs)| {
                let other_docs = other.results.get(qid)?;
                let shared: DocScores = docs
                    .iter()
                    .filter(|(docid, _)| other_docs.contains_key(*docid))
                    .map(|(docid, &score)| (docid.clone(), score))
                    .collect();
                Some((qid.clone(), shared))
            })
            .collect();
        Run::from_results(results)
    }

    /// Combines two runs whose query ids do not overlap.
    ///
    /// # Errors
    ///
    /// [`RunError::Validation`] if the runs share a query id under
    /// [`SharedQids::Disallow`].
    pub fn union_qids(&self, other: &Run, shared_qids: SharedQids) -> Result<Run> {
        match shared_qids {
            SharedQids::Disallow => {
                let shared: Vec<&String> = self
                    .results
                    .keys()
                    .filter(|qid| other.results.contains_key(*qid))
                    .collect();
                if !shared.is_empty() {
                    return Err(RunError::Validation(format!(
                        "inputs share qids {} but shared_qids='{}'",
                        crate::error::describe_keys(shared.into_iter()),
                        shared_qids
                    )));
                }
            }
        }

        let mut results = self.results.clone();
        results.extend(
            other
                .results
                .iter()
                .map(|(qid, docs)| (qid.clone(), docs.clone())),
        );
        Run::from_results(results)
    }

    /// Drops every document that `other` retrieved for the same query.
    ///
    /// Queries missing from `other` are kept whole.
    pub fn difference(&self, other: &Run) -> Result<Run> {
        let results: RunMap = self
            .results
            .iter()
            .map(|(qid, docs)| {
                let remaining: DocScores = match other.results.get(qid) {
                    Some(other_docs) => docs
                        .iter()
                        .filter(|(docid, _)| !other_docs.contains_key(*docid))
                        .map(|(docid, &score)| (docid.clone(), score))
                        .collect(),
                    None => docs.clone(),
                };
                (qid.clone(), remaining)
            })
            .collect();
        Run::from_results(results)
    }

    /// Appends documents that only `other` retrieved, ranked below ours.
    ///
    /// For every query of `self`, documents found only in `other` are shifted
    /// with an affine map so that their best score sits [`CONCAT_OFFSET`]
    /// below this run's lowest score while their spread is preserved:
    ///
    /// ```text
    /// newmx = min(self[q]) - CONCAT_OFFSET
    /// newmn = newmx - (mx - mn)
    /// a * x + b maps [mn, mx] onto [newmn, newmx]
    /// ```
    ///
    /// Documents present in both runs keep `self`'s score. Queries present
    /// only in `other` are not added.
    pub fn concat(&self, other: &Run) -> Result<Run> {
        let mut results = self.results.clone();

        for (qid, docs) in results.iter_mut() {
            let Some(other_docs) = other.results.get(qid) else {
                continue;
            };
            let new_docs: Vec<(&String, f64)> = other_docs
                .iter()
                .filter(|(docid, _)| !docs.contains_key(*docid))
                .map(|(docid, &score)| (docid, score))
                .collect();
            if new_docs.is_empty() {
                continue;
            }

            let Some(floor) = docs.values().copied().reduce(f64::min) else {
                // Nothing of ours to rank below; take the other run's scores as-is
                docs.extend(new_docs.into_iter().map(|(docid, score)| (docid.clone(), score)));
                continue;
            };

            let (a, b) = concat_rescale(&new_docs, floor);
            debug!(
                "concat qid={} appending {} documents with a={} b={}",
                qid,
                new_docs.len(),
                a,
                b
            );
            for (docid, score) in new_docs {
                docs.insert(docid.clone(), a * score + b);
            }
        }

        Run::from_results(results)
    }
}

/// Solves `a * x + b` sending the new scores' `[mn, mx]` to just below `floor`.
///
/// A zero spread (one new document, or all equal) maps everything to `newmx`.
fn concat_rescale(new_docs: &[(&String, f64)], floor: f64) -> (f64, f64) {
    let mn = new_docs.iter().map(|(_, s)| *s).fold(f64::INFINITY, f64::min);
    let mx = new_docs.iter().map(|(_, s)| *s).fold(f64::NEG_INFINITY, f64::max);

    let newmx = floor - CONCAT_OFFSET;
    let newmn = newmx - (mx - mn);

    let a = if mx > mn {
        (newmx - newmn) / (mx - mn)
    } else {
        1.0
    };
    let b = newmx - a * mx;
    (a, b)
}
