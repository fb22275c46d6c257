//! The whitespace-delimited run format.
//!
//! ```text
//! qid Q0 docid rank score [tag]
//! ```
//!
//! On read, only `qid`, `docid` and `score` are used; the iteration marker,
//! rank and any trailing fields are ignored and blank lines are skipped.
//! A (qid, docid) pair seen more than once keeps its maximum score.
//!
//! On write, queries are emitted in ascending id order and documents by
//! descending score with contiguous 1-based ranks.

use super::{insert_max, rank_documents, Run, RunMap};
use crate::config::{ITERATION_MARKER, RUN_FIELDS};
use crate::error::{Result, RunError};
use crate::source::{FileSource, LineSource};
use std::fs::File;
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;
use tracing::{debug, instrument};

impl Run {
    /// Reads a run file from a local path (`.zst` files are decompressed).
    ///
    /// # Errors
    ///
    /// [`RunError::Io`] if the file cannot be read, [`RunError::Parse`] on a
    /// malformed line, [`RunError::Construction`] if it holds no results.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        parse_run_lines(FileSource.open(path)?, &path.display().to_string())
    }

    /// Reads a run through any [`LineSource`].
    #[instrument(skip(source))]
    pub fn from_source(source: &dyn LineSource, resource: &str) -> Result<Self> {
        parse_run_lines(source.lines(resource)?, resource)
    }

    /// Reads a run from an in-memory or streaming reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        parse_run_lines(reader.lines(), "<reader>")
    }

    /// Writes the run to `path`, tagging every line with `tag`.
    pub fn write_trec_run(&self, path: impl AsRef<Path>, tag: &str) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        let written = self.write_to(&mut writer, tag)?;
        writer.flush()?;
        debug!("Wrote {} lines to {}", written, path.display());
        Ok(())
    }

    /// Writes the run format to any writer and returns the number of lines.
    pub fn write_to<W: Write>(&self, mut writer: W, tag: &str) -> Result<usize> {
        let mut count = 0;
        for (qid, docs) in &self.results {
            for (idx, (docid, score)) in rank_documents(docs).into_iter().enumerate() {
                writeln!(
                    writer,
                    "{} {} {} {} {} {}",
                    qid,
                    ITERATION_MARKER,
                    docid,
                    idx + 1,
                    score,
                    tag
                )?;
                count += 1;
            }
        }
        Ok(count)
    }
}

fn parse_run_lines<I>(lines: I, resource: &str) -> Result<Run>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut results = RunMap::new();
    let mut rows = 0usize;
    let mut duplicates = 0usize;

    for (idx, line) in lines.enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < RUN_FIELDS {
            return Err(RunError::Parse {
                line: idx + 1,
                reason: format!(
                    "expected at least {} fields (qid Q0 docid rank score), found {}",
                    RUN_FIELDS,
                    fields.len()
                ),
            });
        }

        let (qid, docid, score) = (fields[0], fields[2], fields[4]);
        let score: f64 = score.parse().map_err(|_| RunError::Parse {
            line: idx + 1,
            reason: format!("invalid score {score:?}"),
        })?;

        let docs = results.entry(qid.to_string()).or_default();
        if insert_max(docs, docid.to_string(), score) {
            duplicates += 1;
        }
        rows += 1;
    }

    if rows == 0 {
        return Err(RunError::Construction(format!(
            "provided path contained no results: {resource}"
        )));
    }

    debug!(
        "Parsed {} rows ({} duplicates merged) across {} queries from {}",
        rows,
        duplicates,
        results.len(),
        resource
    );
    Run::from_results(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    const SIMPLE_RUN: &str = "1 Q0 123 1 10
             1 Q0 124 2 9
             2 Q0 125 1 9";

    #[test]
    fn test_parse_simple_run() {
        let run = Run::from_reader(Cursor::new(SIMPLE_RUN)).unwrap();

        let expected = Run::new([
            ("1", vec![("123", 10.0), ("124", 9.0)]),
            ("2", vec![("125", 9.0)]),
        ])
        .unwrap();
        assert_eq!(run, expected);
    }

    #[test]
    fn test_duplicate_lines_keep_max() {
        let text = "q Q0 d 1 5\nq Q0 d 2 8\nq Q0 d 3 6\n";
        let run = Run::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(run.get("q").unwrap()["d"], 8.0);
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn test_blank_lines_and_extra_fields() {
        let text = "\n  \nq Q0 d 1 1.5 tag extra\n\n";
        let run = Run::from_reader(Cursor::new(text)).unwrap();
        assert_eq!(run.get("q").unwrap()["d"], 1.5);
    }

    #[test]
    fn test_empty_input_fails() {
        let err = Run::from_reader(Cursor::new("\n\n")).unwrap_err();
        assert!(matches!(err, RunError::Construction(_)));
        assert!(err.to_string().contains("no results"));
    }

    #[test]
    fn test_short_line_fails() {
        let err = Run::from_reader(Cursor::new("q Q0 d 1 2\nq Q0 e\n")).unwrap_err();
        match err {
            RunError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("expected Parse, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_score_fails() {
        let err = Run::from_reader(Cursor::new("q Q0 d 1 high\n")).unwrap_err();
        assert!(matches!(err, RunError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_write_orders_and_ranks() {
        let run = Run::new([
            ("2", vec![("x", 1.0)]),
            ("1", vec![("a", 1.0), ("b", 3.0), ("c", 2.0)]),
        ])
        .unwrap();

        let mut out = Vec::new();
        let count = run.write_to(&mut out, "mytag").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(count, 4);
        assert_eq!(
            text,
            "1 Q0 b 1 3 mytag\n1 Q0 c 2 2 mytag\n1 Q0 a 3 1 mytag\n2 Q0 x 1 1 mytag\n"
        );
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.run");
        let run = Run::new([
            ("1", vec![("123", 10.0), ("124", 9.0)]),
            ("2", vec![("125", 0.1 + 0.2)]),
        ])
        .unwrap();

        run.write_trec_run(&path, "trecrun").unwrap();
        let back = Run::from_path(&path).unwrap();
        assert_eq!(back, run);
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"bm25-\xff.run"));
        std::fs::write(&path, SIMPLE_RUN).unwrap();

        let run = Run::from_path(&path).unwrap();
        assert_eq!(run.len(), 3);
        assert_eq!(run.get("1").unwrap()["123"], 10.0);
    }
}
