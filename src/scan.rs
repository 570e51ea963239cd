use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tracing::warn;

use crate::error::ConfigError;

const ARCHIVE_EXTENSIONS: [&str; 4] = ["jar", "zip", "war", "ear"];

/// Turns the user's paths into a flat, sorted list of archive files.
///
/// Files are taken as given. Directories are walked recursively and
/// contribute every file with an archive extension; entries the walker cannot
/// read are logged and skipped.
pub fn expand_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, ConfigError> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            out.extend(scan_archives(path));
        } else if path.exists() {
            out.push(path.clone());
        } else {
            return Err(ConfigError::MissingInput(path.clone()));
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| ARCHIVE_EXTENSIONS.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

pub fn scan_archives(base_path: &Path) -> Vec<PathBuf> {
    let (tx, rx) = mpsc::channel();

    let walker = WalkBuilder::new(base_path)
        .hidden(false)
        .ignore(false)
        .parents(false)
        .git_ignore(false)
        .git_global(false)
        .git_exclude(false)
        .build_parallel();

    walker.run(|| {
        let tx = tx.clone();
        Box::new(move |entry| {
            match entry {
                Ok(entry) => {
                    let path = entry.path();
                    if entry.file_type().is_some_and(|t| t.is_file()) && is_archive(path) {
                        let _ = tx.send(path.to_path_buf());
                    }
                }
                Err(err) => warn!(error = %err, "skipping unreadable path"),
            }
            ignore::WalkState::Continue
        })
    });

    drop(tx);
    rx.iter().collect()
}
