//! # trecrun
//!
//! Ranked retrieval runs as immutable values with a score algebra.
//!
//! A [`Run`] maps query ids to document ids to scores, the content of a TREC
//! run file. Runs can be combined elementwise (`+ - * /`), truncated to the
//! top k per query, intersected, unioned, diffed, spliced with rescaling,
//! normalized, fingerprinted and evaluated against relevance judgments.
//!
//! ## Modules
//!
//! - [`run`] - The [`Run`] type and every operation on it
//! - [`qrels`] - Relevance judgments
//! - [`metrics`] - Metric parsing and the built-in trec_eval-style evaluator
//! - [`stats`] - Paired t-test and effect size for run comparisons
//! - [`source`] - Line-stream readers (plain, zstd, stdin)
//! - [`config`] - Shared constants
//! - [`error`] - Error type
//!
//! ## Example
//!
//! ```
//! use trecrun::{Normalization, Run};
//!
//! let bm25 = Run::new([("1", [("a", 12.0), ("b", 9.5)])]).unwrap();
//! let dense = Run::new([("1", [("a", 0.71), ("b", 0.93)])]).unwrap();
//!
//! let fused = bm25
//!     .normalize(Normalization::MinMax)
//!     .add(&dense.normalize(Normalization::MinMax))
//!     .unwrap();
//! assert_eq!(fused.get("1").unwrap()["a"], 1.0);
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod qrels;
pub mod run;
pub mod source;
pub mod stats;

pub use error::{Result, RunError};
pub use metrics::{Evaluation, Measure, MetricsEngine, TrecEvaluator};
pub use qrels::Qrels;
pub use run::{fuse, DocScores, Normalization, Operand, Run, RunMap, SharedQids};
pub use source::{FileSource, LineSource};
