//! Progress reporting.
//!
//! The scan pushes state changes and counter updates to a
//! [`ProgressObserver`] from whichever worker thread made the change. The
//! observer is called synchronously and its work is not awaited in any other
//! way, so implementations should return quickly.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Stopped,
    OpeningArchives,
    CheckingClasses,
}

pub trait ProgressObserver: Send + Sync {
    fn state_changed(&self, state: ScanState);

    fn archives_opened(&self, count: usize);

    fn classes_checked(&self, count: usize);
}

/// Ignores every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn state_changed(&self, _state: ScanState) {}

    fn archives_opened(&self, _count: usize) {}

    fn classes_checked(&self, _count: usize) {}
}

/// Logs state changes at info level and counter updates at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn state_changed(&self, state: ScanState) {
        info!(?state, "scan state changed");
    }

    fn archives_opened(&self, count: usize) {
        debug!(count, "archives opened");
    }

    fn classes_checked(&self, count: usize) {
        debug!(count, "classes checked");
    }
}

/// Counters shared by the workers of one scan.
#[derive(Debug, Default)]
pub struct ScanCounters {
    archives_opened: AtomicUsize,
    classes_checked: AtomicUsize,
    archive_failures: AtomicUsize,
    entry_read_failures: AtomicUsize,
    class_format_failures: AtomicUsize,
}

impl ScanCounters {
    /// Returns the new count.
    pub fn archive_opened(&self) -> usize {
        self.archives_opened.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Returns the new count.
    pub fn class_checked(&self) -> usize {
        self.classes_checked.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn archive_failed(&self) {
        self.archive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn entry_read_failed(&self) {
        self.entry_read_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn class_format_failed(&self) {
        self.class_format_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn archives_opened(&self) -> usize {
        self.archives_opened.load(Ordering::Relaxed)
    }

    pub fn classes_checked(&self) -> usize {
        self.classes_checked.load(Ordering::Relaxed)
    }

    pub fn archive_failures(&self) -> usize {
        self.archive_failures.load(Ordering::Relaxed)
    }

    pub fn entry_read_failures(&self) -> usize {
        self.entry_read_failures.load(Ordering::Relaxed)
    }

    pub fn class_format_failures(&self) -> usize {
        self.class_format_failures.load(Ordering::Relaxed)
    }
}

/// Final numbers of a finished scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub total_archives: usize,
    pub archives_opened: usize,
    pub archive_failures: usize,
    pub total_classes: usize,
    pub classes_checked: usize,
    pub entry_read_failures: usize,
    pub class_format_failures: usize,
    pub reports: usize,
}
