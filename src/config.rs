use std::path::PathBuf;

use crate::error::ConfigError;
use crate::query::{CheckMode, Query};

/// Archive-opening workers when none are requested.
pub const DEFAULT_ARCHIVE_WORKERS: usize = 1;

/// Class-checking workers. Independent of the archive worker count.
pub const DEFAULT_CLASS_WORKERS: usize = 4;

/// Mode of a query value written without a `[c]`, `[e]` or `[w]` marker.
pub const DEFAULT_CHECK_MODE: CheckMode = CheckMode::ContainsWord;

/// Validated scan settings. Built once before a scan and read-only afterwards.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    inputs: Vec<PathBuf>,
    queries: Vec<Query>,
    archive_workers: usize,
    class_workers: usize,
}

impl ScanConfig {
    /// `inputs` are archive files; directory expansion happens before this
    /// (see [`crate::scan::expand_inputs`]).
    pub fn new(
        inputs: Vec<PathBuf>,
        queries: Vec<Query>,
        archive_workers: usize,
        class_workers: usize,
    ) -> Result<Self, ConfigError> {
        if inputs.is_empty() {
            return Err(ConfigError::NoInputs);
        }
        if queries.is_empty() {
            return Err(ConfigError::NoQueries);
        }
        if archive_workers == 0 {
            return Err(ConfigError::NoWorkers { what: "archive" });
        }
        if class_workers == 0 {
            return Err(ConfigError::NoWorkers { what: "class" });
        }
        Ok(Self {
            inputs,
            queries,
            archive_workers,
            class_workers,
        })
    }

    pub fn with_defaults(inputs: Vec<PathBuf>, queries: Vec<Query>) -> Result<Self, ConfigError> {
        Self::new(inputs, queries, DEFAULT_ARCHIVE_WORKERS, DEFAULT_CLASS_WORKERS)
    }

    pub fn inputs(&self) -> &[PathBuf] {
        &self.inputs
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    pub fn archive_workers(&self) -> usize {
        self.archive_workers
    }

    pub fn class_workers(&self) -> usize {
        self.class_workers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::StringCheck;

    fn query() -> Query {
        Query::Class {
            name: StringCheck::exact("a.B"),
        }
    }

    #[test]
    fn rejects_empty_or_zero_settings() {
        assert!(matches!(
            ScanConfig::new(vec![], vec![query()], 1, 1),
            Err(ConfigError::NoInputs)
        ));
        assert!(matches!(
            ScanConfig::new(vec!["a.jar".into()], vec![], 1, 1),
            Err(ConfigError::NoQueries)
        ));
        assert!(matches!(
            ScanConfig::new(vec!["a.jar".into()], vec![query()], 0, 1),
            Err(ConfigError::NoWorkers { what: "archive" })
        ));
        assert!(matches!(
            ScanConfig::new(vec!["a.jar".into()], vec![query()], 1, 0),
            Err(ConfigError::NoWorkers { what: "class" })
        ));
    }

    #[test]
    fn defaults_keep_phases_independent() {
        let config = ScanConfig::with_defaults(vec!["a.jar".into()], vec![query()]).unwrap();
        assert_eq!(config.archive_workers(), DEFAULT_ARCHIVE_WORKERS);
        assert_eq!(config.class_workers(), DEFAULT_CLASS_WORKERS);
    }
}
