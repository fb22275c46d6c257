//! Line-stream readers.
//!
//! Runs and qrels are read through the [`LineSource`] trait so that callers
//! can plug in their own transport (object stores, HTTP, archives). The
//! built-in [`FileSource`] covers local files, zstd-compressed files and
//! standard input.

use crate::error::Result;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use tracing::debug;

/// Lazily produced lines of a resource.
pub type Lines = Box<dyn Iterator<Item = io::Result<String>>>;

/// Produces the text lines of a named resource.
///
/// Transport errors are returned as [`RunError::Io`](crate::RunError::Io)
/// and propagate unchanged to the caller.
pub trait LineSource {
    /// Opens `resource` and returns its lines.
    fn lines(&self, resource: &str) -> Result<Lines>;
}

/// Reads local files.
///
/// - `-` reads standard input
/// - paths ending in `.zst` are decompressed with zstd
/// - anything else is read as plain text
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSource;

impl FileSource {
    /// Extension that triggers zstd decompression.
    pub const ZSTD_EXTENSION: &'static str = "zst";

    /// Opens a local path and returns its lines.
    ///
    /// Unlike [`LineSource::lines`] this takes the path as is, so file names
    /// that are not valid UTF-8 open correctly.
    pub fn open(&self, path: &Path) -> Result<Lines> {
        if path.as_os_str() == "-" {
            debug!("Reading lines from stdin");
            return Ok(Box::new(io::stdin().lock().lines()));
        }

        let file = File::open(path)?;
        let compressed = path
            .extension()
            .is_some_and(|ext| ext == Self::ZSTD_EXTENSION);

        if compressed {
            debug!("Reading zstd-compressed lines from {}", path.display());
            let decoder = zstd::stream::read::Decoder::new(file)?;
            Ok(Box::new(BufReader::new(decoder).lines()))
        } else {
            debug!("Reading lines from {}", path.display());
            Ok(Box::new(BufReader::new(file).lines()))
        }
    }
}

impl LineSource for FileSource {
    fn lines(&self, resource: &str) -> Result<Lines> {
        self.open(Path::new(resource))
    }
}
