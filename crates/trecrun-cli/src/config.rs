//! Settings resolution for the CLI.
//!
//! Metric lists come from, in order of precedence:
//! 1. `--metrics` on the command line
//! 2. `$TRECRUN_METRICS` (comma- or whitespace-separated)
//! 3. [`DEFAULT_METRICS`]

use trecrun::config::DEFAULT_METRICS;

/// Environment variable holding a default metric list.
pub const METRICS_ENV: &str = "TRECRUN_METRICS";

/// Resolves the metric list using the process environment.
pub fn resolve_metrics(flag: Option<Vec<String>>) -> Vec<String> {
    resolve_metrics_with(flag, std::env::var(METRICS_ENV).ok())
}

/// Resolves the metric list from explicit inputs.
///
/// Empty values at any level fall through to the next one.
pub fn resolve_metrics_with(flag: Option<Vec<String>>, env: Option<String>) -> Vec<String> {
    if let Some(metrics) = flag.filter(|m| !m.is_empty()) {
        return metrics;
    }
    if let Some(metrics) = env.map(|value| split_metric_list(&value)).filter(|m| !m.is_empty()) {
        return metrics;
    }
    DEFAULT_METRICS.iter().map(|m| m.to_string()).collect()
}

fn split_metric_list(value: &str) -> Vec<String> {
    value
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}
