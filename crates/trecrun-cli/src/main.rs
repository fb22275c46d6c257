//! trecrun CLI - Combine, normalize and evaluate TREC runs.
//!
//! # Usage
//!
//! ```bash
//! # Evaluate a run (metrics from --metrics, $TRECRUN_METRICS or defaults)
//! trecrun eval bm25.run qrels.txt
//! trecrun eval bm25.run.zst qrels.txt --metrics nDCG@10,RR --per-query --json
//!
//! # Transform runs (output to stdout unless -o is given)
//! trecrun normalize bm25.run --method minmax -o bm25.minmax.run
//! trecrun topk bm25.run -k 100 -o bm25.top100.run
//! trecrun fuse bm25.run dense.run --method rr --tag rrf -o fused.run
//!
//! # Fingerprint and compare
//! trecrun hash bm25.run
//! trecrun compare fused.run bm25.run qrels.txt --metric nDCG@10
//! ```

mod config;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trecrun::config::DEFAULT_TAG;
use trecrun::stats::compare_runs;
use trecrun::{fuse, Normalization, Qrels, Run};

/// Command-line tool for TREC runs.
///
/// Reads `qid Q0 docid rank score tag` files (plain, `.zst`, or `-` for
/// stdin) and writes results in the same format.
#[derive(Parser)]
#[command(name = "trecrun", version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate a run against relevance judgments
    Eval {
        /// Run file
        run: PathBuf,
        /// Qrels file
        qrels: PathBuf,
        /// Comma-separated metric names (e.g. P@10,nDCG@10,RR)
        #[arg(short, long, value_delimiter = ',')]
        metrics: Option<Vec<String>>,
        /// Report every query instead of the mean
        #[arg(long)]
        per_query: bool,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Normalize every query's scores
    Normalize {
        /// Run file
        run: PathBuf,
        /// rr, minmax or standard
        #[arg(long, default_value = "rr")]
        method: Normalization,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Keep the k best documents per query
    Topk {
        /// Run file
        run: PathBuf,
        /// Documents to keep per query
        #[arg(short)]
        k: usize,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Fuse runs by summing normalized scores
    Fuse {
        /// Run files
        #[arg(required = true, num_args = 1..)]
        runs: Vec<PathBuf>,
        /// rr (reciprocal rank fusion), minmax or standard
        #[arg(long, default_value = "rr")]
        method: Normalization,
        #[command(flatten)]
        output: OutputArgs,
    },

    /// Print the content hash of a run
    Hash {
        /// Run files
        #[arg(required = true, num_args = 1..)]
        runs: Vec<PathBuf>,
    },

    /// Test whether run A differs significantly from run B
    Compare {
        /// Run A
        run_a: PathBuf,
        /// Run B
        run_b: PathBuf,
        /// Qrels file
        qrels: PathBuf,
        /// Metric to compare on
        #[arg(long, default_value = "nDCG@10")]
        metric: String,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where and how to write a resulting run.
#[derive(clap::Args)]
struct OutputArgs {
    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Run tag written in the last column
    #[arg(long, default_value = DEFAULT_TAG)]
    tag: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so that runs written to stdout stay clean
    let level = if cli.verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();

    match cli.command {
        Command::Eval {
            run,
            qrels,
            metrics,
            per_query,
            json,
        } => {
            let metrics = config::resolve_metrics(metrics);
            let evaluation = load_run(&run)?
                .evaluate(&load_qrels(&qrels)?, &metrics, !per_query)
                .context("Evaluation failed")?;

            let text = if json {
                output::format_json(&output::JsonEvaluation {
                    run: &run.to_string_lossy(),
                    qrels: &qrels.to_string_lossy(),
                    scores: &evaluation,
                })
            } else {
                output::format_evaluation(&evaluation)
            };
            println!("{}", text);
        }

        Command::Normalize { run, method, output } => {
            let normalized = load_run(&run)?.normalize(method);
            write_run(&normalized, &output)?;
        }

        Command::Topk { run, k, output } => {
            let top = load_run(&run)?
                .topk(k)
                .with_context(|| format!("Cannot keep top {} documents", k))?;
            write_run(&top, &output)?;
        }

        Command::Fuse {
            runs,
            method,
            output,
        } => {
            let loaded = runs
                .iter()
                .map(|path| load_run(path))
                .collect::<Result<Vec<_>>>()?;
            let fused = fuse(&loaded, method).context("Fusion failed")?;
            info!("Fused {} runs with {}", loaded.len(), method);
            write_run(&fused, &output)?;
        }

        Command::Hash { runs } => {
            for path in runs {
                let run = load_run(&path)?;
                println!("{}  {}", run.cache_hash(), path.display());
            }
        }

        Command::Compare {
            run_a,
            run_b,
            qrels,
            metric,
            json,
        } => {
            let a = load_run(&run_a)?;
            let b = load_run(&run_b)?;
            let comparison = compare_runs(&a, &b, &load_qrels(&qrels)?, &metric)
                .context("Comparison failed")?;

            let (name_a, name_b) = (run_a.to_string_lossy(), run_b.to_string_lossy());
            let text = if json {
                output::format_json(&output::JsonComparison {
                    run_a: &name_a,
                    run_b: &name_b,
                    comparison: &comparison,
                    significant: comparison.is_significant(),
                    effect: comparison.effect(),
                })
            } else {
                output::format_comparison(&name_a, &name_b, &comparison)
            };
            println!("{}", text);
        }
    }

    Ok(())
}

fn load_run(path: &Path) -> Result<Run> {
    let run = Run::from_path(path)
        .with_context(|| format!("Failed to read run: {}", path.display()))?;
    info!(
        "Loaded {} ({} queries, {} documents)",
        path.display(),
        run.num_queries(),
        run.len()
    );
    Ok(run)
}

fn load_qrels(path: &Path) -> Result<Qrels> {
    let qrels = Qrels::from_path(path)
        .with_context(|| format!("Failed to read qrels: {}", path.display()))?;
    info!(
        "Loaded {} ({} queries, {} judgments)",
        path.display(),
        qrels.num_queries(),
        qrels.len()
    );
    Ok(qrels)
}

fn write_run(run: &Run, args: &OutputArgs) -> Result<()> {
    match &args.output {
        Some(path) => run
            .write_trec_run(path, &args.tag)
            .with_context(|| format!("Failed to write run: {}", path.display())),
        None => {
            let mut stdout = io::stdout().lock();
            run.write_to(&mut stdout, &args.tag)
                .context("Failed to write run to stdout")?;
            stdout.flush().context("Failed to write run to stdout")
        }
    }
}
