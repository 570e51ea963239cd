use std::fmt;
use std::sync::{Mutex, PoisonError};

use serde::Serialize;

use crate::location::LocationPath;
use crate::query::Query;

/// One query match at one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub location: LocationPath,
    pub query: Query,
}

impl Report {
    pub fn new(location: LocationPath, query: Query) -> Self {
        Self { location, query }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "usage at {} from query {}", self.location, self.query)
    }
}

/// Append-only report collection shared by the class-checking workers.
///
/// Each class appends its reports in one batch, so the reports of a single
/// class stay contiguous and in scan order. The order between classes depends
/// on scheduling.
#[derive(Debug, Default)]
pub struct ReportSink {
    reports: Mutex<Vec<Report>>,
}

impl ReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, batch: Vec<Report>) {
        if batch.is_empty() {
            return;
        }
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
    }

    pub fn into_reports(self) -> Vec<Report> {
        self.reports
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies the reports collected so far.
    pub fn snapshot(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
