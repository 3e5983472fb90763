//! Append-only destinations for rendered log text.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

/// Destination that appends text to a named log.
///
/// On error no part of `contents` may remain at the destination; callers keep
/// their backlog and retry later.
pub trait LogSink: Send {
    fn append(&mut self, path: &Path, contents: &str) -> io::Result<()>;
}

/// Appends to files on disk, creating them on first write.
///
/// A write that fails part way is truncated back to the previous length.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSink;

impl LogSink for FileSink {
    fn append(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let previous_len = file.metadata()?.len();
        append_or_truncate(&mut file, previous_len, |file| {
            file.write_all(contents.as_bytes())?;
            file.flush()
        })
    }
}

/// Run `write`, cutting `file` back to `previous_len` if it fails.
fn append_or_truncate<F>(file: &mut File, previous_len: u64, write: F) -> io::Result<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let Err(err) = write(file) else {
        return Ok(());
    };
    if let Err(rollback) = file.set_len(previous_len) {
        warn!(
            previous_len,
            error = %rollback,
            "Could not truncate partially written log file"
        );
    }
    Err(err)
}

/// Keeps appended text in memory, keyed by path in write order.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    writes: Vec<(PathBuf, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> &[(PathBuf, String)] {
        &self.writes
    }

    /// Distinct paths written, in first-write order.
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = Vec::new();
        for (path, _) in &self.writes {
            if !paths.contains(path) {
                paths.push(path.clone());
            }
        }
        paths
    }

    /// Everything appended to `path`.
    pub fn contents(&self, path: &Path) -> String {
        self.writes
            .iter()
            .filter(|(p, _)| p == path)
            .map(|(_, text)| text.as_str())
            .collect()
    }
}

impl LogSink for MemorySink {
    fn append(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        self.writes.push((path.to_path_buf(), contents.to_string()));
        Ok(())
    }
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn append(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        (**self).append(path, contents)
    }
}
