//! Relevance judgments (qrels).
//!
//! Judgments map query id → document id → integer grade. A grade of 0 means
//! judged but not relevant; grades of 1 or more are relevant. Documents that
//! do not appear at all are unjudged.
//!
//! The text format has four whitespace-separated fields per line:
//!
//! ```text
//! qid iteration docid grade
//! ```

use crate::config::QRELS_FIELDS;
use crate::error::{Result, RunError};
use crate::source::{FileSource, LineSource};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead};
use std::path::Path;
use tracing::{debug, instrument};

/// Grades for one query: document id → relevance grade.
pub type Judgments = BTreeMap<String, i32>;

/// Relevance judgments for a set of queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Qrels {
    judgments: BTreeMap<String, Judgments>,
}

impl Qrels {
    /// Builds qrels from any two-level mapping, stringifying ids.
    ///
    /// Later grades for the same (qid, docid) pair replace earlier ones.
    pub fn new<M, Q, I, D, G>(mapping: M) -> Self
    where
        M: IntoIterator<Item = (Q, I)>,
        Q: ToString,
        I: IntoIterator<Item = (D, G)>,
        D: ToString,
        G: Into<i32>,
    {
        let mut judgments: BTreeMap<String, Judgments> = BTreeMap::new();
        for (qid, docs) in mapping {
            let entry = judgments.entry(qid.to_string()).or_default();
            for (docid, grade) in docs {
                entry.insert(docid.to_string(), grade.into());
            }
        }
        Self { judgments }
    }

    /// Reads a qrels file from a local path (`.zst` files are decompressed).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        parse_qrels_lines(FileSource.open(path)?, &path.display().to_string())
    }

    /// Reads qrels through any [`LineSource`].
    #[instrument(skip(source))]
    pub fn from_source(source: &dyn LineSource, resource: &str) -> Result<Self> {
        parse_qrels_lines(source.lines(resource)?, resource)
    }

    /// Reads qrels from an in-memory or streaming reader.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        parse_qrels_lines(reader.lines(), "<reader>")
    }

    /// Judgments for one query, if any.
    pub fn get(&self, qid: &str) -> Option<&Judgments> {
        self.judgments.get(qid)
    }

    /// Returns true if `qid` has judgments.
    pub fn contains(&self, qid: &str) -> bool {
        self.judgments.contains_key(qid)
    }

    /// Set of judged query ids.
    pub fn qids(&self) -> BTreeSet<String> {
        self.judgments.keys().cloned().collect()
    }

    /// Number of judged queries.
    pub fn num_queries(&self) -> usize {
        self.judgments.len()
    }

    /// Total number of judgments.
    pub fn len(&self) -> usize {
        self.judgments.values().map(|docs| docs.len()).sum()
    }

    /// Returns true if there are no judgments.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates queries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Judgments)> {
        self.judgments.iter()
    }
}

fn parse_qrels_lines<I>(lines: I, resource: &str) -> Result<Qrels>
where
    I: Iterator<Item = io::Result<String>>,
{
    let mut judgments: BTreeMap<String, Judgments> = BTreeMap::new();

    for (idx, line) in lines.enumerate() {
        let line = line?;
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < QRELS_FIELDS {
            return Err(RunError::Parse {
                line: idx + 1,
                reason: format!(
                    "expected {} fields (qid iteration docid grade), found {}",
                    QRELS_FIELDS,
                    fields.len()
                ),
            });
        }

        let grade = parse_grade(fields[3]).ok_or_else(|| RunError::Parse {
            line: idx + 1,
            reason: format!("invalid relevance grade {:?}", fields[3]),
        })?;
        judgments
            .entry(fields[0].to_string())
            .or_default()
            .insert(fields[2].to_string(), grade);
    }

    let qrels = Qrels { judgments };
    debug!(
        "Parsed {} judgments for {} queries from {}",
        qrels.len(),
        qrels.num_queries(),
        resource
    );
    Ok(qrels)
}

/// Integer grades; float grades such as `1.0` are truncated toward zero.
fn parse_grade(field: &str) -> Option<i32> {
    field
        .parse::<i32>()
        .ok()
        .or_else(|| field.parse::<f64>().ok().filter(|g| g.is_finite()).map(|g| g as i32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    #[test]
    fn test_new_stringifies() {
        let qrels = Qrels::new(HashMap::from([(1, HashMap::from([(123, 1), (124, 0)]))]));
        assert_eq!(qrels.get("1").unwrap()["123"], 1);
        assert_eq!(qrels.get("1").unwrap()["124"], 0);
        assert_eq!(qrels.len(), 2);
        assert_eq!(qrels.num_queries(), 1);
    }

    #[test]
    fn test_parse() {
        let text = "1 0 123 1\n1 0 124 0\n\n2 0 200 2\n";
        let qrels = Qrels::from_reader(Cursor::new(text)).unwrap();

        assert_eq!(qrels.qids().len(), 2);
        assert_eq!(qrels.get("2").unwrap()["200"], 2);
        assert!(qrels.contains("1"));
        assert!(!qrels.contains("3"));
    }

    #[test]
    fn test_parse_float_grades() {
        let qrels = Qrels::from_reader(Cursor::new("1 0 a 1.0\n1 0 b -1\n")).unwrap();
        assert_eq!(qrels.get("1").unwrap()["a"], 1);
        assert_eq!(qrels.get("1").unwrap()["b"], -1);
    }

    #[test]
    fn test_parse_errors() {
        let short = Qrels::from_reader(Cursor::new("1 0 a\n")).unwrap_err();
        assert!(matches!(short, RunError::Parse { line: 1, .. }));

        let bad = Qrels::from_reader(Cursor::new("1 0 a 1\n1 0 b yes\n")).unwrap_err();
        assert!(matches!(bad, RunError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_empty_qrels_allowed() {
        let qrels = Qrels::from_reader(Cursor::new("")).unwrap();
        assert!(qrels.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_from_path_non_utf8_name() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join(OsStr::from_bytes(b"qrels-\xff.txt"));
        std::fs::write(&path, "1 0 123 1\n1 0 124 0\n").unwrap();

        let qrels = Qrels::from_path(&path).unwrap();
        assert_eq!(qrels.len(), 2);
        assert_eq!(qrels.get("1").unwrap()["123"], 1);
    }
}
