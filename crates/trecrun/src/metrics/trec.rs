//! Built-in metrics engine following trec_eval conventions.
//!
//! # Conventions
//!
//! - Documents are ranked by descending score; equal scores are ordered by
//!   descending document id.
//! - A document is relevant when its grade is at least 1. Grade 0 means
//!   judged non-relevant.
//! - Only queries present in both the run and the qrels are scored.
//!
//! # Formulas
//!
//! ```text
//! P@k      = |relevant ∩ top_k| / k
//! Recall@k = |relevant ∩ top_k| / |relevant|
//! AP@k     = Σ_{i ≤ k, rel(i)} P@i / |relevant|
//! nDCG@k   = DCG@k / IDCG@k,  DCG@k = Σ_{i ≤ k} grade_i / log₂(i + 1)
//! RR@k     = 1 / rank of the first relevant document within k
//! Judged@k = |judged ∩ top_k| / k
//! ```
//!
//! nDCG uses linear gain. Metrics whose denominator would be zero (no
//! relevant documents) are 0.

use super::{Measure, MetricScores, MetricsEngine, PerQueryScores};
use crate::error::Result;
use crate::qrels::{Judgments, Qrels};
use crate::run::{DocScores, RunMap};
use tracing::debug;

/// trec_eval-compatible evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrecEvaluator;

impl MetricsEngine for TrecEvaluator {
    fn per_query(&self, measures: &[Measure], qrels: &Qrels, run: &RunMap) -> Result<PerQueryScores> {
        let mut scores = PerQueryScores::new();
        let mut skipped = 0usize;

        for (qid, docs) in run {
            let Some(judgments) = qrels.get(qid) else {
                skipped += 1;
                continue;
            };
            let ranking = trec_ranking(docs);
            let query_scores: MetricScores = measures
                .iter()
                .map(|measure| (measure.to_string(), score_query(*measure, &ranking, judgments)))
                .collect();
            scores.insert(qid.clone(), query_scores);
        }

        debug!(
            "Scored {} queries ({} without judgments skipped)",
            scores.len(),
            skipped
        );
        Ok(scores)
    }
}

/// Ranks documents the way trec_eval does: score descending, then document
/// id descending.
fn trec_ranking(docs: &DocScores) -> Vec<&str> {
    let mut ranked: Vec<(&String, f64)> = docs.iter().map(|(d, &s)| (d, s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(a.0)));
    ranked.into_iter().map(|(d, _)| d.as_str()).collect()
}

fn score_query(measure: Measure, ranking: &[&str], judgments: &Judgments) -> f64 {
    match measure {
        Measure::Precision { k } => precision_at_k(ranking, judgments, k),
        Measure::Recall { k } => recall_at_k(ranking, judgments, k),
        Measure::AveragePrecision { k } => average_precision(truncate(ranking, k), judgments),
        Measure::Ndcg { k } => ndcg(truncate(ranking, k), judgments),
        Measure::ReciprocalRank { k } => reciprocal_rank(truncate(ranking, k), judgments),
        Measure::Judged { k } => judged_at_k(ranking, judgments, k),
        Measure::Success { k } => success_at_k(ranking, judgments, k),
    }
}

fn truncate<'a>(ranking: &'a [&'a str], k: Option<usize>) -> &'a [&'a str] {
    match k {
        Some(k) if k < ranking.len() => &ranking[..k],
        _ => ranking,
    }
}

#[inline]
fn is_relevant(judgments: &Judgments, docid: &str) -> bool {
    judgments.get(docid).is_some_and(|&grade| grade > 0)
}

fn num_relevant(judgments: &Judgments) -> usize {
    judgments.values().filter(|&&grade| grade > 0).count()
}

// ============================================================================
// Set-Based Metrics
// ============================================================================

fn precision_at_k(ranking: &[&str], judgments: &Judgments, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let hits = ranking
        .iter()
        .take(k)
        .filter(|d| is_relevant(judgments, d))
        .count();
    hits as f64 / k as f64
}

fn recall_at_k(ranking: &[&str], judgments: &Judgments, k: usize) -> f64 {
    let total = num_relevant(judgments);
    if total == 0 {
        return 0.0;
    }
    let hits = ranking
        .iter()
        .take(k)
        .filter(|d| is_relevant(judgments, d))
        .count();
    hits as f64 / total as f64
}

fn judged_at_k(ranking: &[&str], judgments: &Judgments, k: usize) -> f64 {
    if k == 0 {
        return 0.0;
    }
    let judged = ranking
        .iter()
        .take(k)
        .filter(|d| judgments.contains_key(**d))
        .count();
    judged as f64 / k as f64
}

fn success_at_k(ranking: &[&str], judgments: &Judgments, k: usize) -> f64 {
    if ranking.iter().take(k).any(|d| is_relevant(judgments, d)) {
        1.0
    } else {
        0.0
    }
}

// ============================================================================
// Rank-Based Metrics
// ============================================================================

fn average_precision(ranking: &[&str], judgments: &Judgments) -> f64 {
    let total = num_relevant(judgments);
    if total == 0 {
        return 0.0;
    }

    let mut found = 0usize;
    let mut precision_sum = 0.0;
    for (i, docid) in ranking.iter().enumerate() {
        if is_relevant(judgments, docid) {
            found += 1;
            precision_sum += found as f64 / (i + 1) as f64;
        }
    }
    precision_sum / total as f64
}

fn reciprocal_rank(ranking: &[&str], judgments: &Judgments) -> f64 {
    ranking
        .iter()
        .position(|d| is_relevant(judgments, d))
        .map(|i| 1.0 / (i + 1) as f64)
        .unwrap_or(0.0)
}

fn ndcg(ranking: &[&str], judgments: &Judgments) -> f64 {
    let dcg: f64 = ranking
        .iter()
        .enumerate()
        .map(|(i, d)| gain(judgments.get(*d).copied().unwrap_or(0)) / discount(i + 1))
        .sum();

    let mut ideal: Vec<i32> = judgments.values().copied().filter(|&g| g > 0).collect();
    ideal.sort_unstable_by(|a, b| b.cmp(a));
    let idcg: f64 = ideal
        .iter()
        .take(ranking.len())
        .enumerate()
        .map(|(i, &g)| gain(g) / discount(i + 1))
        .sum();

    if idcg == 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}

/// Linear gain; negative grades count as zero.
#[inline]
fn gain(grade: i32) -> f64 {
    grade.max(0) as f64
}

/// Logarithmic discount for a 1-indexed position.
#[inline]
fn discount(position: usize) -> f64 {
    (position as f64 + 1.0).log2()
}
