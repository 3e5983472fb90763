//! Flushing the log buffer to a sink.

use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tracing::{error, info};

use crate::buffer::LogBuffer;
use crate::policy::{LoggingPolicy, log_file_name};
use crate::render::render_entries;
use crate::sink::LogSink;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to append {entries} log entries to {}", .path.display())]
    Write {
        path: PathBuf,
        entries: usize,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    /// Entries still pending in the buffer.
    pub fn pending_entries(&self) -> usize {
        match self {
            ExportError::Write { entries, .. } => *entries,
        }
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub entries: usize,
    pub policy: LoggingPolicy,
}

#[derive(Debug, Clone, Copy)]
struct Episode {
    policy: LoggingPolicy,
    started_at: DateTime<Local>,
}

/// Writes buffered entries into per-episode files under one directory.
///
/// The file name is fixed when an episode starts, from the oldest entry then
/// pending, and stays fixed until [`LogExporter::end_episode`] is called or the
/// policy changes.
#[derive(Debug)]
pub struct LogExporter {
    log_dir: PathBuf,
    episode: Option<Episode>,
    retry_pending: bool,
}

impl LogExporter {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
            episode: None,
            retry_pending: false,
        }
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Whether the last export failed and its entries are still buffered.
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn episode_start(&self) -> Option<DateTime<Local>> {
        self.episode.map(|episode| episode.started_at)
    }

    /// File the current episode writes to, if one is open.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.episode
            .map(|episode| self.path_for(episode.policy, &episode.started_at))
    }

    /// Close the current episode so the next export starts a new file.
    pub fn end_episode(&mut self) {
        if let Some(episode) = self.episode.take() {
            info!(
                policy = %episode.policy,
                started_at = %episode.started_at,
                "Motor log episode closed"
            );
        }
    }

    /// Append every buffered entry to the episode's file and clear the buffer.
    ///
    /// Returns `Ok(None)` when there is nothing to write. On failure the
    /// buffer is left intact and [`LogExporter::retry_pending`] is set.
    pub fn export<S: LogSink + ?Sized>(
        &mut self,
        buffer: &mut LogBuffer,
        sink: &mut S,
        policy: LoggingPolicy,
    ) -> Result<Option<ExportReport>, ExportError> {
        let Some(first_captured_at) = buffer.first_captured_at() else {
            self.retry_pending = false;
            return Ok(None);
        };

        let episode = match self.episode {
            Some(episode) if episode.policy == policy => episode,
            _ => {
                let episode = Episode {
                    policy,
                    started_at: first_captured_at,
                };
                self.episode = Some(episode);
                episode
            }
        };

        let path = self.path_for(policy, &episode.started_at);
        let entries = buffer.len();
        let contents = render_entries(buffer.entries());

        if let Err(source) = sink.append(&path, &contents) {
            self.retry_pending = true;
            error!(
                path = %path.display(),
                entries,
                error = %source,
                "Failed to export motor log; keeping entries for retry"
            );
            return Err(ExportError::Write {
                path,
                entries,
                source,
            });
        }

        buffer.clear();
        self.retry_pending = false;
        info!(path = %path.display(), entries, %policy, "Exported motor log");
        Ok(Some(ExportReport {
            path,
            entries,
            policy,
        }))
    }

    fn path_for(&self, policy: LoggingPolicy, started_at: &DateTime<Local>) -> PathBuf {
        self.log_dir.join(log_file_name(policy, started_at))
    }
}
