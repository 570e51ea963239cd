//! The two-phase scan.
//!
//! Phase 1 opens every input archive on `archive_workers` threads and lists
//! its class entries. Once that pool has fully drained, the listings are
//! turned into one task per class entry and phase 2 parses, visits and
//! matches them on `class_workers` threads. Failed items are counted and
//! logged, never reported.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::archive::{ClassEntry, JarArchive};
use crate::classfile::parse_class;
use crate::config::ScanConfig;
use crate::error::{ClassFormatError, ScanError};
use crate::progress::{NoProgress, ProgressObserver, ScanCounters, ScanState, ScanStats};
use crate::query::Query;
use crate::report::{Report, ReportSink};
use crate::visitor::visit_class;
use crate::worker::{Task, TaskQueue, WorkerPool};

/// State shared by every task of one scan.
struct ScanContext {
    queries: Vec<Query>,
    sink: ReportSink,
    counters: ScanCounters,
    observer: Arc<dyn ProgressObserver>,
}

/// An archive that opened successfully, with its class listing.
struct OpenedArchive {
    archive: JarArchive,
    entries: Vec<ClassEntry>,
}

struct ArchiveTask {
    path: PathBuf,
    opened: Arc<TaskQueue<OpenedArchive>>,
    ctx: Arc<ScanContext>,
}

impl ArchiveTask {
    fn open(&self) -> Result<(), ScanError> {
        let mut archive =
            JarArchive::open(&self.path).inspect_err(|_| self.ctx.counters.archive_failed())?;

        let (entries, failures) = archive.class_entries();
        for err in failures {
            self.ctx.counters.entry_read_failed();
            warn!(archive = %archive.name(), error = %err, "skipping unreadable entry");
        }

        debug!(archive = %archive.name(), classes = entries.len(), "archive opened");
        self.opened.push(OpenedArchive { archive, entries });
        Ok(())
    }
}

impl Task for ArchiveTask {
    type Error = ScanError;

    fn perform(self) -> Result<(), ScanError> {
        let result = self.open();
        let count = self.ctx.counters.archive_opened();
        self.ctx.observer.archives_opened(count);
        result
    }
}

struct ClassTask {
    archive: JarArchive,
    entry: ClassEntry,
    ctx: Arc<ScanContext>,
}

impl ClassTask {
    fn check(&mut self) -> Result<(), ScanError> {
        let bytes = self
            .archive
            .read_entry(&self.entry)
            .inspect_err(|_| self.ctx.counters.entry_read_failed())?;

        let reports = check_class(&bytes, self.archive.name(), &self.ctx.queries).map_err(|source| {
            self.ctx.counters.class_format_failed();
            ScanError::ClassFormat {
                archive: self.archive.name().to_string(),
                entry: self.entry.name.clone(),
                source,
            }
        })?;

        self.ctx.sink.append(reports);
        Ok(())
    }
}

impl Task for ClassTask {
    type Error = ScanError;

    fn perform(mut self) -> Result<(), ScanError> {
        let result = self.check();
        let count = self.ctx.counters.class_checked();
        self.ctx.observer.classes_checked(count);
        result
    }
}

/// Parses one class file and matches every usage in it against `queries`.
///
/// Reports come back in visiting order, one per (usage, matching query) pair.
/// Nothing is returned for a class that fails to parse.
pub fn check_class(
    bytes: &[u8],
    archive: &str,
    queries: &[Query],
) -> Result<Vec<Report>, ClassFormatError> {
    let class = parse_class(bytes)?;
    let mut reports = Vec::new();
    visit_class(&class, archive, |event| {
        for query in queries {
            if query.matches(&event.usage) {
                reports.push(Report::new(event.location.clone(), query.clone()));
            }
        }
    })?;
    Ok(reports)
}

/// Result of a finished scan.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub reports: Vec<Report>,
    pub stats: ScanStats,
}

pub struct UsageChecker {
    config: ScanConfig,
    observer: Arc<dyn ProgressObserver>,
}

impl UsageChecker {
    pub fn new(config: ScanConfig) -> Self {
        Self::with_observer(config, Arc::new(NoProgress))
    }

    pub fn with_observer(config: ScanConfig, observer: Arc<dyn ProgressObserver>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Runs both phases to completion. Only a failure to start worker threads
    /// is an error; per-item failures end up in [`ScanStats`].
    pub fn run(self) -> Result<ScanOutcome> {
        let start = Instant::now();
        let ctx = Arc::new(ScanContext {
            queries: self.config.queries().to_vec(),
            sink: ReportSink::new(),
            counters: ScanCounters::default(),
            observer: Arc::clone(&self.observer),
        });

        let result = self.run_phases(&ctx);
        self.observer.state_changed(ScanState::Stopped);
        let total_classes = result?;

        let counters = &ctx.counters;
        let mut stats = ScanStats {
            total_archives: self.config.inputs().len(),
            archives_opened: counters.archives_opened(),
            archive_failures: counters.archive_failures(),
            total_classes,
            classes_checked: counters.classes_checked(),
            entry_read_failures: counters.entry_read_failures(),
            class_format_failures: counters.class_format_failures(),
            reports: 0,
        };

        let reports = match Arc::try_unwrap(ctx) {
            Ok(ctx) => ctx.sink.into_reports(),
            Err(ctx) => ctx.sink.snapshot(),
        };
        stats.reports = reports.len();

        info!(
            archives = stats.archives_opened,
            archive_failures = stats.archive_failures,
            classes = stats.classes_checked,
            entry_read_failures = stats.entry_read_failures,
            class_format_failures = stats.class_format_failures,
            reports = stats.reports,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "scan finished"
        );

        Ok(ScanOutcome { reports, stats })
    }

    /// Returns the number of class tasks handed to phase 2.
    fn run_phases(&self, ctx: &Arc<ScanContext>) -> Result<usize> {
        self.observer.state_changed(ScanState::OpeningArchives);
        info!(
            archives = self.config.inputs().len(),
            workers = self.config.archive_workers(),
            "opening archives"
        );

        let opened = Arc::new(TaskQueue::new());
        let archive_queue = Arc::new(TaskQueue::new());
        archive_queue.extend(self.config.inputs().iter().map(|path| ArchiveTask {
            path: path.clone(),
            opened: Arc::clone(&opened),
            ctx: Arc::clone(ctx),
        }));
        WorkerPool::new("archive-opener", self.config.archive_workers(), archive_queue).run()?;

        // Phase 1 has drained; no phase-2 task exists before this point.
        let mut archives: Vec<OpenedArchive> = std::iter::from_fn(|| opened.pop()).collect();
        archives.sort_by(|a, b| a.archive.path().cmp(b.archive.path()));

        let class_queue = Arc::new(TaskQueue::new());
        for OpenedArchive { archive, entries } in archives {
            class_queue.extend(entries.into_iter().map(|entry| ClassTask {
                archive: archive.clone(),
                entry,
                ctx: Arc::clone(ctx),
            }));
        }
        let total_classes = class_queue.len();

        self.observer.state_changed(ScanState::CheckingClasses);
        info!(
            classes = total_classes,
            workers = self.config.class_workers(),
            "checking classes"
        );
        WorkerPool::new("class-checker", self.config.class_workers(), class_queue).run()?;

        Ok(total_classes)
    }
}
