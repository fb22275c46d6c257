//! The [`Run`] value type.
//!
//! A run maps query ids to per-query document scores. Runs are immutable:
//! every operation borrows its inputs and builds a brand-new run.
//!
//! # Submodules
//!
//! - `arithmetic`: elementwise and scalar add/subtract/multiply/divide
//! - `set_ops`: topk, intersect, union, difference, concat
//! - `normalize`: reciprocal-rank, min-max and standard score normalization
//! - `format`: reading and writing the whitespace-delimited run format
//!
//! # Key normalization
//!
//! Query and document ids are always stored as strings. Constructors accept
//! anything implementing [`ToString`], so `{1: {123: 10}}` and
//! `{"1": {"123": 10.0}}` build equal runs with equal [`Run::cache_hash`].

mod arithmetic;
mod format;
mod normalize;
mod set_ops;

pub use arithmetic::Operand;
pub use normalize::{fuse, Normalization};
pub use set_ops::SharedQids;

use crate::error::{Result, RunError};
use crate::metrics::{parse_measures, Evaluation, MetricsEngine, TrecEvaluator};
use crate::qrels::Qrels;
use serde::{Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use tracing::instrument;

/// Scores for one query: document id → score.
pub type DocScores = BTreeMap<String, f64>;

/// Full run mapping: query id → document id → score.
pub type RunMap = BTreeMap<String, DocScores>;

/// Per-query ranked results.
///
/// Both levels are ordered maps, so iteration is deterministic and sorted by
/// id. Operations that need a ranking (topk, normalization, output) sort by
/// score explicitly; see [`rank_documents`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RunMap", into = "RunMap")]
pub struct Run {
    results: RunMap,
}

impl Run {
    /// Builds a run from any two-level mapping.
    ///
    /// Ids are stringified. If two source keys stringify to the same id, the
    /// documents are merged and the maximum score is kept, the same rule the
    /// run-format parser applies to duplicate lines. A stored NaN is replaced
    /// by any later duplicate score.
    ///
    /// # Errors
    ///
    /// [`RunError::Construction`] if the mapping holds zero documents.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use trecrun::Run;
    ///
    /// let mapping = HashMap::from([(1, HashMap::from([(123, 10), (124, 9)]))]);
    /// let run = Run::new(mapping).unwrap();
    /// assert_eq!(run.get("1").unwrap()["123"], 10.0);
    /// ```
    pub fn new<M, Q, I, D, S>(mapping: M) -> Result<Self>
    where
        M: IntoIterator<Item = (Q, I)>,
        Q: ToString,
        I: IntoIterator<Item = (D, S)>,
        D: ToString,
        S: Into<f64>,
    {
        let mut results = RunMap::new();
        for (qid, docs) in mapping {
            let entry = results.entry(qid.to_string()).or_default();
            for (docid, score) in docs {
                insert_max(entry, docid.to_string(), score.into());
            }
        }
        Self::from_results(results)
    }

    /// Wraps an already-normalized map, enforcing the non-empty invariant.
    pub(crate) fn from_results(results: RunMap) -> Result<Self> {
        if results.values().all(|docs| docs.is_empty()) {
            return Err(RunError::Construction(format!(
                "run contains no documents ({} queries)",
                results.len()
            )));
        }
        Ok(Self { results })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Scores for one query, if present.
    pub fn get(&self, qid: &str) -> Option<&DocScores> {
        self.results.get(qid)
    }

    /// Returns true if the run has an entry for `qid`.
    pub fn contains(&self, qid: &str) -> bool {
        self.results.contains_key(qid)
    }

    /// Set of query ids.
    pub fn qids(&self) -> BTreeSet<String> {
        self.results.keys().cloned().collect()
    }

    /// Number of queries, including queries whose document map is empty.
    pub fn num_queries(&self) -> usize {
        self.results.len()
    }

    /// Total number of (query, document) pairs.
    pub fn len(&self) -> usize {
        self.results.values().map(|docs| docs.len()).sum()
    }

    /// Always false: a run holds at least one document.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates queries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &DocScores)> {
        self.results.iter()
    }

    /// Owned copy of the full mapping.
    pub fn to_map(&self) -> RunMap {
        self.results.clone()
    }

    /// Documents of `qid` in output order: descending score, ties by
    /// ascending document id.
    pub fn ranked(&self, qid: &str) -> Vec<(&str, f64)> {
        self.results
            .get(qid)
            .map(rank_documents)
            .unwrap_or_default()
    }

    pub(crate) fn results(&self) -> &RunMap {
        &self.results
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    /// Deterministic SHA-256 fingerprint of the run contents, as lowercase hex.
    ///
    /// The sorted mapping is serialized to JSON and hashed, so the result
    /// depends only on the query ids, document ids and exact scores, never
    /// on construction order or the original key types. Non-finite scores
    /// are written as the strings `"Infinity"`, `"-Infinity"` and `"NaN"`
    /// so that each one hashes differently.
    pub fn cache_hash(&self) -> String {
        let mut hasher = Sha256::new();
        // Writing into a Sha256 never fails and every key is a string
        let _ = serde_json::to_writer(HashWriter(&mut hasher), &HashView(&self.results));
        format!("{:x}", hasher.finalize())
    }

    // =========================================================================
    // Judgments and evaluation
    // =========================================================================

    /// Keeps only documents that have a relevance judgment for their query.
    ///
    /// # Errors
    ///
    /// [`RunError::MissingQrels`] if any query of this run is absent from
    /// `qrels`; [`RunError::Construction`] if nothing judged remains.
    pub fn remove_unjudged_documents(&self, qrels: &Qrels) -> Result<Self> {
        let mut results = RunMap::new();
        for (qid, docs) in &self.results {
            let judged = qrels.get(qid).ok_or_else(|| RunError::MissingQrels {
                qid: qid.clone(),
            })?;
            let kept = docs
                .iter()
                .filter(|(docid, _)| judged.contains_key(*docid))
                .map(|(docid, &score)| (docid.clone(), score))
                .collect();
            results.insert(qid.clone(), kept);
        }
        Self::from_results(results)
    }

    /// Evaluates this run with the built-in [`TrecEvaluator`].
    ///
    /// `metrics` are metric names such as `"P@10"`, `"nDCG@10"` or `"RR"`.
    /// With `aggregate` the result maps metric name → mean over judged
    /// queries; otherwise query id → metric name → value.
    ///
    /// # Example
    ///
    /// ```
    /// use std::collections::HashMap;
    /// use trecrun::{Qrels, Run};
    ///
    /// let run = Run::new(HashMap::from([("1", HashMap::from([("123", 10), ("124", 9)]))])).unwrap();
    /// let qrels = Qrels::new(HashMap::from([("1", HashMap::from([("123", 1), ("124", 0)]))]));
    ///
    /// let scores = run.evaluate(&qrels, &["P@1", "RR"], true).unwrap();
    /// assert_eq!(scores.aggregate().unwrap()["P@1"], 1.0);
    /// ```
    pub fn evaluate<S: AsRef<str>>(
        &self,
        qrels: &Qrels,
        metrics: &[S],
        aggregate: bool,
    ) -> Result<Evaluation> {
        self.evaluate_with(&TrecEvaluator, qrels, metrics, aggregate)
    }

    /// Evaluates this run with a caller-supplied metrics engine.
    #[instrument(skip_all, fields(queries = self.num_queries(), metrics = metrics.len()))]
    pub fn evaluate_with<E, S>(
        &self,
        engine: &E,
        qrels: &Qrels,
        metrics: &[S],
        aggregate: bool,
    ) -> Result<Evaluation>
    where
        E: MetricsEngine + ?Sized,
        S: AsRef<str>,
    {
        let measures = parse_measures(metrics)?;
        if aggregate {
            engine
                .aggregate(&measures, qrels, &self.results)
                .map(Evaluation::Aggregate)
        } else {
            engine
                .per_query(&measures, qrels, &self.results)
                .map(Evaluation::PerQuery)
        }
    }
}

impl TryFrom<RunMap> for Run {
    type Error = RunError;

    fn try_from(results: RunMap) -> Result<Self> {
        Self::from_results(results)
    }
}

impl From<Run> for RunMap {
    fn from(run: Run) -> Self {
        run.results
    }
}

impl<'a> IntoIterator for &'a Run {
    type Item = (&'a String, &'a DocScores);
    type IntoIter = std::collections::btree_map::Iter<'a, String, DocScores>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}

/// Serializes a run map with non-finite scores spelled out.
struct HashView<'a>(&'a RunMap);

struct HashDocs<'a>(&'a DocScores);

struct HashScore(f64);

impl Serialize for HashView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(qid, docs)| (qid, HashDocs(docs))))
    }
}

impl Serialize for HashDocs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let entries = self.0.iter().map(|(docid, &score)| (docid, HashScore(score)));
        serializer.collect_map(entries)
    }
}

impl Serialize for HashScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let score = self.0;
        if score.is_nan() {
            serializer.serialize_str("NaN")
        } else if score == f64::INFINITY {
            serializer.serialize_str("Infinity")
        } else if score == f64::NEG_INFINITY {
            serializer.serialize_str("-Infinity")
        } else {
            serializer.serialize_f64(score)
        }
    }
}

/// Feeds serialized bytes straight into a digest.
struct HashWriter<'a>(&'a mut Sha256);

impl std::io::Write for HashWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Inserts a score for a possibly repeated document.
///
/// A later score replaces the stored one unless the stored one is strictly
/// greater. Comparisons with NaN are false, so a stored NaN gives way to any
/// later score and a later NaN replaces the stored score.
pub(crate) fn insert_max(docs: &mut DocScores, docid: String, score: f64) -> bool {
    match docs.get_mut(&docid) {
        Some(existing) => {
            if (*existing).partial_cmp(&score) != Some(Ordering::Greater) {
                *existing = score;
            }
            true
        }
        None => {
            docs.insert(docid, score);
            false
        }
    }
}

/// Sorts documents by descending score.
///
/// The sort is stable over the map's ascending-id iteration order, so equal
/// scores come out in ascending document id order.
pub(crate) fn rank_documents(docs: &DocScores) -> Vec<(&str, f64)> {
    let mut ranked: Vec<(&str, f64)> = docs
        .iter()
        .map(|(docid, &score)| (docid.as_str(), score))
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}
