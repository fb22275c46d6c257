//! Significance testing for run comparisons.
//!
//! Two runs evaluated on the same judged queries produce paired per-query
//! scores. This module answers whether their difference is significant:
//!
//! - Paired t-test (two-tailed)
//! - Effect size (Cohen's d)
//! - [`compare_runs`], which wires both to [`Run::evaluate`]
//!
//! # References
//!
//! - Smucker et al. (2007). "A comparison of statistical significance tests for IR evaluation"
//! - Cohen (1988). "Statistical Power Analysis for the Behavioral Sciences"

use crate::config::SIGNIFICANCE_ALPHA;
use crate::error::{Result, RunError};
use crate::metrics::Measure;
use crate::qrels::Qrels;
use crate::run::Run;
use serde::Serialize;
use tracing::{debug, instrument};

/// Result of a paired t-test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTestResult {
    /// t-statistic (positive if system A > system B)
    pub t_statistic: f64,
    /// Two-tailed p-value
    pub p_value: f64,
    /// Degrees of freedom
    pub df: usize,
}

impl TTestResult {
    /// Returns true if the difference is significant at the given alpha level.
    pub fn is_significant(&self, alpha: f64) -> bool {
        self.p_value < alpha
    }

    /// Formats the result as `t(df)=..., p=...`, starred when significant at
    /// [`SIGNIFICANCE_ALPHA`].
    pub fn format(&self) -> String {
        let marker = if self.is_significant(SIGNIFICANCE_ALPHA) { "*" } else { "" };
        format!(
            "t({})={:.3}, p={:.4}{}",
            self.df, self.t_statistic, self.p_value, marker
        )
    }
}

/// Paired t-test of system A against system B on the same queries.
///
/// `system_a[i]` and `system_b[i]` must be scores for the same query.
///
/// # Errors
///
/// [`RunError::Validation`] if the slices differ in length or hold fewer
/// than two observations.
///
/// # Example
///
/// ```
/// use trecrun::stats::paired_ttest;
///
/// let fused = [0.85, 0.92, 0.78, 0.90];
/// let bm25 = [0.75, 0.88, 0.72, 0.80];
/// let result = paired_ttest(&fused, &bm25).unwrap();
/// assert!(result.t_statistic > 0.0);
/// ```
pub fn paired_ttest(system_a: &[f64], system_b: &[f64]) -> Result<TTestResult> {
    if system_a.len() != system_b.len() {
        return Err(RunError::Validation(format!(
            "paired t-test needs equal-length samples, got {} and {}",
            system_a.len(),
            system_b.len()
        )));
    }
    if system_a.len() < 2 {
        return Err(RunError::Validation(format!(
            "paired t-test needs at least 2 paired observations, got {}",
            system_a.len()
        )));
    }

    let n = system_a.len();
    let df = n - 1;

    let diffs: Vec<f64> = system_a.iter().zip(system_b).map(|(a, b)| a - b).collect();
    let mean_diff = mean(&diffs);
    let var_diff = diffs.iter().map(|d| (d - mean_diff).powi(2)).sum::<f64>() / df as f64;
    let se = var_diff.sqrt() / (n as f64).sqrt();

    // A constant nonzero difference has zero spread: infinitely significant
    let t = if se > 0.0 {
        mean_diff / se
    } else if mean_diff == 0.0 {
        0.0
    } else {
        mean_diff.signum() * f64::INFINITY
    };

    Ok(TTestResult {
        t_statistic: t,
        p_value: t_distribution_p_value(t.abs(), df),
        df,
    })
}

/// Cohen's d with pooled standard deviation (positive if A > B).
///
/// Interpretation per Cohen's conventions, see [`interpret_cohens_d`].
///
/// # Errors
///
/// [`RunError::Validation`] if either group has fewer than two values.
pub fn cohens_d(group_a: &[f64], group_b: &[f64]) -> Result<f64> {
    if group_a.len() < 2 || group_b.len() < 2 {
        return Err(RunError::Validation(format!(
            "Cohen's d needs at least 2 values per group, got {} and {}",
            group_a.len(),
            group_b.len()
        )));
    }

    let (n_a, n_b) = (group_a.len() as f64, group_b.len() as f64);
    let (mean_a, mean_b) = (mean(group_a), mean(group_b));
    let var_a = group_a.iter().map(|x| (x - mean_a).powi(2)).sum::<f64>() / (n_a - 1.0);
    let var_b = group_b.iter().map(|x| (x - mean_b).powi(2)).sum::<f64>() / (n_b - 1.0);

    let pooled_std = (((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / (n_a + n_b - 2.0)).sqrt();
    if pooled_std == 0.0 {
        return Ok(0.0);
    }
    Ok((mean_a - mean_b) / pooled_std)
}

/// Interprets Cohen's d value.
pub fn interpret_cohens_d(d: f64) -> &'static str {
    let d_abs = d.abs();
    if d_abs < 0.2 {
        "negligible"
    } else if d_abs < 0.5 {
        "small"
    } else if d_abs < 0.8 {
        "medium"
    } else {
        "large"
    }
}

// ============================================================================
// Run Comparison
// ============================================================================

/// Outcome of comparing two runs on one metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    /// Canonical metric name
    pub metric: String,
    /// Number of shared judged queries compared
    pub queries: usize,
    /// Mean metric value of run A over the compared queries
    pub mean_a: f64,
    /// Mean metric value of run B over the compared queries
    pub mean_b: f64,
    /// Paired t-test of A against B
    pub ttest: TTestResult,
    /// Cohen's d of A against B
    pub effect_size: f64,
}

impl Comparison {
    /// Verbal label for [`Comparison::effect_size`].
    pub fn effect(&self) -> &'static str {
        interpret_cohens_d(self.effect_size)
    }

    /// Returns true if the difference is significant at [`SIGNIFICANCE_ALPHA`].
    pub fn is_significant(&self) -> bool {
        self.ttest.is_significant(SIGNIFICANCE_ALPHA)
    }
}

/// Compares two runs on one metric over the queries both runs contain and
/// `qrels` judges.
///
/// # Errors
///
/// [`RunError::Validation`] for an unknown metric or fewer than two shared
/// judged queries.
#[instrument(skip(a, b, qrels))]
pub fn compare_runs(a: &Run, b: &Run, qrels: &Qrels, metric: &str) -> Result<Comparison> {
    let measure: Measure = metric.parse()?;
    let name = measure.to_string();

    let scores_a = a.evaluate(qrels, &[name.as_str()], false)?;
    let scores_b = b.evaluate(qrels, &[name.as_str()], false)?;
    let (Some(per_query_a), Some(per_query_b)) = (scores_a.per_query(), scores_b.per_query()) else {
        return Err(RunError::Evaluation(
            "per-query evaluation returned aggregate scores".to_string(),
        ));
    };

    let mut values_a = Vec::new();
    let mut values_b = Vec::new();
    for (qid, metrics_a) in per_query_a {
        if let (Some(&va), Some(&vb)) = (
            metrics_a.get(&name),
            per_query_b.get(qid).and_then(|m| m.get(&name)),
        ) {
            values_a.push(va);
            values_b.push(vb);
        }
    }
    debug!("Comparing {} on {} shared judged queries", name, values_a.len());

    let ttest = paired_ttest(&values_a, &values_b)?;
    let effect_size = cohens_d(&values_a, &values_b)?;

    Ok(Comparison {
        metric: name,
        queries: values_a.len(),
        mean_a: mean(&values_a),
        mean_b: mean(&values_b),
        ttest,
        effect_size,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

// ============================================================================
// Internal: t-distribution
// ============================================================================

/// Two-tailed p-value of the Student t-distribution.
///
/// p = I_{df/(df+t²)}(df/2, 1/2); above 100 degrees of freedom the normal
/// approximation is used.
fn t_distribution_p_value(t_abs: f64, df: usize) -> f64 {
    if df > 100 {
        return 2.0 * (1.0 - normal_cdf(t_abs));
    }
    let df = df as f64;
    let x = df / (df + t_abs * t_abs);
    incomplete_beta(df / 2.0, 0.5, x)
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function (Abramowitz and Stegun 7.1.26).
fn erf(x: f64) -> f64 {
    const A: [f64; 5] = [
        0.254829592,
        -0.284496736,
        1.421413741,
        -1.453152027,
        1.061405429,
    ];
    const P: f64 = 0.3275911;

    let sign = x.signum();
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = A.iter().rev().fold(0.0, |acc, &a| (acc + a) * t);
    sign * (1.0 - poly * (-x * x).exp())
}

/// Regularized incomplete beta function I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln()).exp();

    // The continued fraction converges fastest on this side of the mean
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Lentz's continued fraction for the incomplete beta function.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 200;
    const EPS: f64 = 1e-12;
    const TINY: f64 = 1e-30;

    let clamp = |v: f64| if v.abs() < TINY { TINY } else { v };

    let (qab, qap, qam) = (a + b, a + 1.0, a - 1.0);
    let mut c = 1.0;
    let mut d = 1.0 / clamp(1.0 - qab * x / qap);
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let even = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 / clamp(1.0 + even * d);
        c = clamp(1.0 + even / c);
        h *= d * c;

        let odd = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 / clamp(1.0 + odd * d);
        c = clamp(1.0 + odd / c);
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }
    h
}

/// Log gamma (Lanczos approximation).
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 6] = [
        76.18009172947146,
        -86.50532032941677,
        24.01409824083091,
        -1.231739572450155,
        0.1208650973866179e-2,
        -0.5395239384953e-5,
    ];

    let tmp = x + 5.5;
    let tmp = tmp - (x + 0.5) * tmp.ln();
    let series = COEFFS
        .iter()
        .enumerate()
        .fold(1.000000000190015, |acc, (i, &c)| acc + c / (x + 1.0 + i as f64));
    -tmp + (2.5066282746310005 * series / x).ln()
}
