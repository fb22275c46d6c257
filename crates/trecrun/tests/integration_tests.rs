//! End-to-end tests over run files on disk.
//!
//! These tests exercise the full workflow:
//! 1. Reading: plain and zstd run/qrels files → `Run` / `Qrels`
//! 2. Algebra: normalization, concat, fusion, top-k
//! 3. Output: `write_trec_run` → re-read → evaluate
//!
//! Run with: `cargo test -p trecrun --test integration_tests`

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use trecrun::config::{DEFAULT_METRICS, DEFAULT_TAG};
use trecrun::stats::compare_runs;
use trecrun::{fuse, Normalization, Qrels, Run, RunError, SharedQids};

// ============================================================================
// Fixtures
// ============================================================================

const SIMPLE_RUN: &str = "1 Q0 123 1 10\n1 Q0 124 2 9\n2 Q0 125 1 9\n";
const SIMPLE_QRELS: &str = "1 0 123 1\n1 0 124 0\n";

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("Failed to write fixture");
    path
}

fn write_zstd(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let compressed = zstd::encode_all(contents.as_bytes(), 3).expect("Failed to compress fixture");
    fs::File::create(&path)
        .and_then(|mut f| f.write_all(&compressed))
        .expect("Failed to write fixture");
    path
}

// ============================================================================
// Reading
// ============================================================================

#[test]
fn test_parse_run_file() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "simple.run", SIMPLE_RUN);

    let run = Run::from_path(&path).unwrap();
    let expected = Run::new([
        ("1", vec![("123", 10.0), ("124", 9.0)]),
        ("2", vec![("125", 9.0)]),
    ])
    .unwrap();
    assert_eq!(run, expected);
}

#[test]
fn test_zstd_run_matches_plain() {
    let dir = TempDir::new().unwrap();
    let plain = write_file(dir.path(), "simple.run", SIMPLE_RUN);
    let compressed = write_zstd(dir.path(), "simple.run.zst", SIMPLE_RUN);

    let a = Run::from_path(&plain).unwrap();
    let b = Run::from_path(&compressed).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.cache_hash(), b.cache_hash());
}

#[test]
fn test_empty_run_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "empty.run", "");

    let err = Run::from_path(&path).unwrap_err();
    assert!(matches!(err, RunError::Construction(_)));
    assert!(err.to_string().contains("empty.run"));
}

#[test]
fn test_missing_run_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let err = Run::from_path(dir.path().join("nope.run")).unwrap_err();
    assert!(matches!(err, RunError::Io(_)));
}

// ============================================================================
// Write / Read Round Trip
// ============================================================================

#[test]
fn test_round_trip_preserves_top_document() {
    let dir = TempDir::new().unwrap();
    let run = Run::new([
        ("1", vec![("a", 0.5), ("b", 0.5), ("c", 0.25)]),
        ("2", vec![("z", -1.0), ("y", 3.75)]),
    ])
    .unwrap();

    let path = dir.path().join("out.run");
    run.write_trec_run(&path, DEFAULT_TAG).unwrap();
    let back = Run::from_path(&path).unwrap();

    for qid in run.qids() {
        let (_, best) = run.ranked(&qid)[0];
        let (_, best_back) = back.ranked(&qid)[0];
        assert_eq!(best, best_back);
    }
    assert_eq!(back, run);

    let text = fs::read_to_string(&path).unwrap();
    let first = text.lines().next().unwrap();
    assert_eq!(first, "1 Q0 a 1 0.5 trecrun");
}

#[test]
fn test_normalized_run_round_trip() {
    let dir = TempDir::new().unwrap();
    let run = Run::from_path(write_file(dir.path(), "simple.run", SIMPLE_RUN)).unwrap();

    let rr = run.normalize(Normalization::ReciprocalRank);
    let path = dir.path().join("rr.run");
    rr.write_trec_run(&path, "rr").unwrap();

    let back = Run::from_path(&path).unwrap();
    assert_eq!(back.get("1").unwrap()["123"], 1.0 / 61.0);
    assert_eq!(back.get("1").unwrap()["124"], 1.0 / 62.0);
}

// ============================================================================
// Evaluation
// ============================================================================

#[test]
fn test_evaluate_from_files() {
    let dir = TempDir::new().unwrap();
    let run = Run::from_path(write_file(dir.path(), "simple.run", SIMPLE_RUN)).unwrap();
    let qrels = Qrels::from_path(write_file(dir.path(), "simple.qrels", SIMPLE_QRELS)).unwrap();

    let evaluation = run.evaluate(&qrels, DEFAULT_METRICS, true).unwrap();
    let metrics = evaluation.aggregate().unwrap();
    assert_eq!(metrics["P@1"], 1.0);
    assert_eq!(metrics["RR"], 1.0);
    assert_eq!(metrics["Judged@10"], 0.2);

    let json = serde_json::to_value(&evaluation).unwrap();
    assert_eq!(json["P@1"], 1.0);
}

#[test]
fn test_remove_unjudged_then_evaluate() {
    let run = Run::new([("1", vec![("123", 10.0), ("124", 9.0), ("999", 11.0)])]).unwrap();
    let qrels = Qrels::new([("1", vec![("123", 1), ("124", 0)])]);

    let before = run.evaluate(&qrels, &["P@1"], true).unwrap();
    assert_eq!(before.aggregate().unwrap()["P@1"], 0.0);

    let judged = run.remove_unjudged_documents(&qrels).unwrap();
    let after = judged.evaluate(&qrels, &["P@1"], true).unwrap();
    assert_eq!(after.aggregate().unwrap()["P@1"], 1.0);
}

#[test]
fn test_compare_fused_against_single_run() {
    let mut bm25 = Vec::new();
    let mut dense = Vec::new();
    let mut judgments = Vec::new();
    for q in 0..8 {
        let qid = q.to_string();
        // bm25 misses the relevant document on odd queries, dense always finds it second
        let rel_score = if q % 2 == 0 { 3.0 } else { 1.0 };
        bm25.push((qid.clone(), vec![("rel", rel_score), ("a", 2.0), ("b", 1.5)]));
        dense.push((qid.clone(), vec![("rel", 0.8), ("a", 0.9), ("c", 0.1)]));
        judgments.push((qid, vec![("rel", 1), ("a", 0)]));
    }
    let bm25 = Run::new(bm25).unwrap();
    let dense = Run::new(dense).unwrap();
    let qrels = Qrels::new(judgments);

    let fused = fuse(&[bm25.clone(), dense], Normalization::ReciprocalRank).unwrap();
    let comparison = compare_runs(&fused, &bm25, &qrels, "RR").unwrap();

    assert_eq!(comparison.queries, 8);
    assert!(comparison.mean_a >= comparison.mean_b);
}

// ============================================================================
// Algebra Workflows
// ============================================================================

#[test]
fn test_concat_then_topk() {
    let primary = Run::new([("1", vec![("a", 10.0), ("b", 8.0)])]).unwrap();
    let fallback = Run::new([
        ("1", vec![("a", 0.3), ("c", 0.9), ("d", 0.4)]),
        ("2", vec![("x", 1.0)]),
    ])
    .unwrap();

    let combined = primary.concat(&fallback).unwrap();
    assert_eq!(combined.qids().len(), 1);

    let ranked: Vec<&str> = combined.ranked("1").into_iter().map(|(d, _)| d).collect();
    assert_eq!(ranked, vec!["a", "b", "c", "d"]);

    let top = combined.topk(3).unwrap();
    assert_eq!(top.len(), 3);
    assert!(!top.get("1").unwrap().contains_key("d"));
}

#[test]
fn test_union_and_difference() {
    let a = Run::new([("1", vec![("x", 1.0), ("y", 2.0)])]).unwrap();
    let b = Run::new([("2", vec![("x", 1.0)])]).unwrap();

    let both = a.union_qids(&b, SharedQids::default()).unwrap();
    assert_eq!(both.num_queries(), 2);
    assert!(matches!(
        both.union_qids(&a, SharedQids::Disallow),
        Err(RunError::Validation(_))
    ));

    let seen = Run::new([("1", vec![("x", 0.0)])]).unwrap();
    let unseen = both.difference(&seen).unwrap();
    assert_eq!(unseen.get("1").unwrap().len(), 1);
    assert_eq!(unseen.get("2").unwrap().len(), 1);
}

#[test]
fn test_interpolation_of_two_runs() {
    let a = Run::new([("1", vec![("x", 1.0), ("y", 0.0)])]).unwrap();
    let b = Run::new([("1", vec![("x", 0.0), ("y", 1.0)])]).unwrap();

    let mixed = (&a * 0.75).add(&(&b * 0.25)).unwrap();
    assert_eq!(mixed.get("1").unwrap()["x"], 0.75);
    assert_eq!(mixed.get("1").unwrap()["y"], 0.25);

    let mismatch = Run::new([("1", vec![("x", 1.0)])]).unwrap();
    let err = a.add(&mismatch).unwrap_err();
    assert!(err.to_string().contains("intersect or concat"));
}
