//! Elementwise arithmetic on runs.
//!
//! Each operator takes either another run or a scalar:
//!
//! | Right operand | Requirement | Result |
//! |---------------|-------------|--------|
//! | `&Run` | identical qids and per-query docids | pointwise `op(a, b)` |
//! | `f64` | none | `op(score, scalar)` for every score |
//!
//! Division follows IEEE semantics: dividing by zero yields infinities or
//! NaN instead of an error.
//!
//! Scalar operations are also available as infix operators on `&Run`
//! (`&run * 2.0`, `1.0 - &run`, `-&run`). Run ⊕ Run is only exposed through
//! the named methods because it can fail.

use super::{DocScores, Run, RunMap};
use crate::error::{describe_keys, Result, RunError};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Right-hand side of an arithmetic operation.
#[derive(Debug, Clone, Copy)]
pub enum Operand<'a> {
    /// Another run with exactly the same shape
    Run(&'a Run),
    /// A number applied to every score
    Scalar(f64),
}

impl<'a> From<&'a Run> for Operand<'a> {
    fn from(run: &'a Run) -> Self {
        Operand::Run(run)
    }
}

impl From<f64> for Operand<'_> {
    fn from(value: f64) -> Self {
        Operand::Scalar(value)
    }
}

impl From<i32> for Operand<'_> {
    fn from(value: i32) -> Self {
        Operand::Scalar(value.into())
    }
}

impl Run {
    /// Adds another run pointwise, or a scalar to every score.
    ///
    /// # Errors
    ///
    /// [`RunError::ShapeMismatch`] if `other` is a run with different keys.
    pub fn add<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Run> {
        self.combine(other.into(), |a, b| a + b)
    }

    /// Subtracts another run pointwise, or a scalar from every score.
    pub fn subtract<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Run> {
        self.combine(other.into(), |a, b| a - b)
    }

    /// Multiplies by another run pointwise, or every score by a scalar.
    pub fn multiply<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Run> {
        self.combine(other.into(), |a, b| a * b)
    }

    /// Divides by another run pointwise, or every score by a scalar.
    pub fn divide<'a>(&self, other: impl Into<Operand<'a>>) -> Result<Run> {
        self.combine(other.into(), |a, b| a / b)
    }

    /// Multiplies every score by -1.
    pub fn negate(&self) -> Run {
        self.map_scores(|score| score * -1.0)
    }

    fn combine(&self, other: Operand<'_>, op: impl Fn(f64, f64) -> f64) -> Result<Run> {
        match other {
            Operand::Scalar(scalar) => Ok(self.map_scores(|score| op(score, scalar))),
            Operand::Run(rhs) => {
                self.check_same_shape(rhs)?;
                let results = self
                    .results
                    .iter()
                    .map(|(qid, docs)| {
                        let rhs_docs = &rhs.results[qid];
                        let combined: DocScores = docs
                            .iter()
                            .map(|(docid, &score)| (docid.clone(), op(score, rhs_docs[docid])))
                            .collect();
                        (qid.clone(), combined)
                    })
                    .collect();
                Ok(Run { results })
            }
        }
    }

    /// Applies `f` to every score. Keys are untouched so the result keeps the
    /// non-empty invariant without re-validation.
    fn map_scores(&self, f: impl Fn(f64) -> f64) -> Run {
        let results: RunMap = self
            .results
            .iter()
            .map(|(qid, docs)| {
                let mapped = docs
                    .iter()
                    .map(|(docid, &score)| (docid.clone(), f(score)))
                    .collect();
                (qid.clone(), mapped)
            })
            .collect();
        Run { results }
    }

    fn check_same_shape(&self, other: &Run) -> Result<()> {
        if !self.results.keys().eq(other.results.keys()) {
            return Err(RunError::ShapeMismatch {
                qid: "<qids>".to_string(),
                expected: describe_keys(self.results.keys()),
                actual: describe_keys(other.results.keys()),
            });
        }

        for (qid, docs) in &self.results {
            let other_docs = &other.results[qid];
            if !docs.keys().eq(other_docs.keys()) {
                return Err(RunError::ShapeMismatch {
                    qid: qid.clone(),
                    expected: describe_keys(docs.keys()),
                    actual: describe_keys(other_docs.keys()),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Scalar operator sugar
// =============================================================================

impl Add<f64> for &Run {
    type Output = Run;

    fn add(self, rhs: f64) -> Run {
        self.map_scores(|score| score + rhs)
    }
}

impl Add<&Run> for f64 {
    type Output = Run;

    fn add(self, rhs: &Run) -> Run {
        rhs + self
    }
}

impl Sub<f64> for &Run {
    type Output = Run;

    fn sub(self, rhs: f64) -> Run {
        self.map_scores(|score| score - rhs)
    }
}

impl Sub<&Run> for f64 {
    type Output = Run;

    /// `c - run` is defined as `-run + c`.
    fn sub(self, rhs: &Run) -> Run {
        &rhs.negate() + self
    }
}

impl Mul<f64> for &Run {
    type Output = Run;

    fn mul(self, rhs: f64) -> Run {
        self.map_scores(|score| score * rhs)
    }
}

impl Mul<&Run> for f64 {
    type Output = Run;

    fn mul(self, rhs: &Run) -> Run {
        rhs * self
    }
}

impl Div<f64> for &Run {
    type Output = Run;

    fn div(self, rhs: f64) -> Run {
        self.map_scores(|score| score / rhs)
    }
}

impl Neg for &Run {
    type Output = Run;

    fn neg(self) -> Run {
        self.negate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(entries: &[(&str, &[(&str, f64)])]) -> Run {
        Run::new(entries.iter().map(|(qid, docs)| (*qid, docs.iter().copied())))
            .unwrap()
    }

    fn simple_run() -> Run {
        run(&[("1", &[("123", 10.0), ("124", 9.0)]), ("2", &[("125", 9.0)])])
    }

    #[test]
    fn test_add_runs_pointwise() {
        let a = simple_run();
        let b = run(&[("1", &[("123", 1.0), ("124", 2.0)]), ("2", &[("125", 3.0)])]);

        let sum = a.add(&b).unwrap();
        assert_eq!(sum.get("1").unwrap()["123"], 11.0);
        assert_eq!(sum.get("1").unwrap()["124"], 11.0);
        assert_eq!(sum.get("2").unwrap()["125"], 12.0);
    }

    #[test]
    fn test_scalar_chain() {
        let a = simple_run();
        let result = &(&(&(&a * 3.0) / 4.0) + 5.0) - 6.0;

        let expected = run(&[
            ("1", &[("123", 10.0 * 3.0 / 4.0 + 5.0 - 6.0), ("124", 9.0 * 3.0 / 4.0 + 5.0 - 6.0)]),
            ("2", &[("125", 9.0 * 3.0 / 4.0 + 5.0 - 6.0)]),
        ]);
        assert_eq!(result, expected);
    }

    #[test]
    fn test_double_equals_self_sum() {
        let a = simple_run();
        assert_eq!(a.multiply(2).unwrap(), a.add(&a).unwrap());
        assert_eq!(&a * 2.0, 2.0 * &a);
    }

    #[test]
    fn test_scalar_commutes() {
        let a = simple_run();
        assert_eq!(&a + 1.5, 1.5 + &a);
        assert_eq!(a.add(1.5).unwrap(), &a + 1.5);
    }

    #[test]
    fn test_scalar_minus_run_is_negated_sum() {
        let a = simple_run();
        let lhs = 4.0 - &a;
        let rhs = &(-&a) + 4.0;
        assert_eq!(lhs, rhs);
        assert_eq!(lhs.get("1").unwrap()["123"], -6.0);
    }

    #[test]
    fn test_subtract_and_divide_runs() {
        let a = simple_run();
        let zero = a.subtract(&a).unwrap();
        assert!(zero.iter().all(|(_, docs)| docs.values().all(|&s| s == 0.0)));

        let one = a.divide(&a).unwrap();
        assert!(one.iter().all(|(_, docs)| docs.values().all(|&s| s == 1.0)));
    }

    #[test]
    fn test_divide_by_zero_scalar_is_ieee() {
        let a = run(&[("1", &[("pos", 2.0), ("neg", -1.0), ("zero", 0.0)])]);
        let result = a.divide(0.0).unwrap();
        let docs = result.get("1").unwrap();

        assert_eq!(docs["pos"], f64::INFINITY);
        assert_eq!(docs["neg"], f64::NEG_INFINITY);
        assert!(docs["zero"].is_nan());
    }

    #[test]
    fn test_shape_mismatch_on_docids() {
        let a = simple_run();
        let b = run(&[("1", &[("123", 1.0)]), ("2", &[("125", 3.0)])]);

        match a.add(&b) {
            Err(RunError::ShapeMismatch { qid, .. }) => assert_eq!(qid, "1"),
            other => panic!("expected ShapeMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_shape_mismatch_on_qids() {
        let a = simple_run();
        let b = run(&[("1", &[("123", 1.0), ("124", 2.0)])]);

        let err = a.multiply(&b).unwrap_err();
        assert!(matches!(err, RunError::ShapeMismatch { .. }));
        assert!(err.to_string().contains("intersect or concat"));
    }

    #[test]
    fn test_operations_do_not_mutate_input() {
        let a = simple_run();
        let before = a.clone();
        let _ = &a * 10.0;
        let _ = a.add(&a).unwrap();
        assert_eq!(a, before);
    }
}
