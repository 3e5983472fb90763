//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters updated by the ingestion task and read by anyone.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    rejected: AtomicU64,
    decoded: AtomicU64,
    transitions: AtomicU64,
    logged_entries: AtomicU64,
    exported_entries: AtomicU64,
    failed_exports: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStatsSnapshot {
    /// Datagrams read from the socket
    pub received: u64,
    /// Datagrams dropped for having the wrong size
    pub rejected: u64,
    /// Datagrams decoded into a batch
    pub decoded: u64,
    /// Error-state transitions reported
    pub transitions: u64,
    /// Batches admitted to the log buffer
    pub logged_entries: u64,
    /// Entries written to log files
    pub exported_entries: u64,
    /// Export attempts that failed
    pub failed_exports: u64,
}

impl IngestStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_decoded(&self) {
        self.decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_transitions(&self, count: usize) {
        self.transitions
            .fetch_add(u64::try_from(count).unwrap_or(u64::MAX), Ordering::Relaxed);
    }

    pub(crate) fn record_logged(&self) {
        self.logged_entries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_exported(&self, entries: usize) {
        self.exported_entries.fetch_add(
            u64::try_from(entries).unwrap_or(u64::MAX),
            Ordering::Relaxed,
        );
    }

    pub(crate) fn record_failed_export(&self) {
        self.failed_exports.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> IngestStatsSnapshot {
        IngestStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            decoded: self.decoded.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            logged_entries: self.logged_entries.load(Ordering::Relaxed),
            exported_entries: self.exported_entries.load(Ordering::Relaxed),
            failed_exports: self.failed_exports.load(Ordering::Relaxed),
        }
    }
}
