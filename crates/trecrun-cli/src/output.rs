//! Output formatting for evaluation and comparison results.
//!
//! Supports both human-readable terminal output and JSON for scripting.

use serde::Serialize;
use trecrun::metrics::{MetricScores, PerQueryScores};
use trecrun::stats::Comparison;
use trecrun::Evaluation;

/// JSON output structure for `eval`
#[derive(Serialize)]
pub struct JsonEvaluation<'a> {
    pub run: &'a str,
    pub qrels: &'a str,
    pub scores: &'a Evaluation,
}

/// JSON output structure for `compare`
#[derive(Serialize)]
pub struct JsonComparison<'a> {
    pub run_a: &'a str,
    pub run_b: &'a str,
    #[serde(flatten)]
    pub comparison: &'a Comparison,
    pub significant: bool,
    pub effect: &'static str,
}

/// Pretty-prints any serializable value as JSON.
pub fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an evaluation as an aligned `metric value` table.
///
/// Per-query evaluations print one block per query, `all` style as in
/// trec_eval: `metric qid value`.
pub fn format_evaluation(evaluation: &Evaluation) -> String {
    match evaluation {
        Evaluation::Aggregate(scores) => format_scores(scores, None),
        Evaluation::PerQuery(per_query) => format_per_query(per_query),
    }
}

fn format_per_query(per_query: &PerQueryScores) -> String {
    if per_query.is_empty() {
        return "No judged queries in run".to_string();
    }
    per_query
        .iter()
        .map(|(qid, scores)| format_scores(scores, Some(qid.as_str())))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_scores(scores: &MetricScores, qid: Option<&str>) -> String {
    let width = scores.keys().map(|name| name.len()).max().unwrap_or(0);
    let qid = qid.unwrap_or("all");
    scores
        .iter()
        .map(|(name, value)| format!("{:<width$}\t{}\t{:.4}", name, qid, value, width = width))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Formats a run comparison for human-readable terminal output.
pub fn format_comparison(run_a: &str, run_b: &str, comparison: &Comparison) -> String {
    let mut output = String::new();
    output.push_str(&format!(
        "{} over {} shared judged quer{}\n",
        comparison.metric,
        comparison.queries,
        if comparison.queries == 1 { "y" } else { "ies" }
    ));
    output.push_str(&format!("  A: {:.4}  {}\n", comparison.mean_a, run_a));
    output.push_str(&format!("  B: {:.4}  {}\n", comparison.mean_b, run_b));
    output.push_str(&format!("  {}\n", comparison.ttest.format()));
    output.push_str(&format!(
        "  Cohen's d = {:.3} ({})",
        comparison.effect_size,
        comparison.effect()
    ));
    output
}
