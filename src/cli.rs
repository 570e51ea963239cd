use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::config::{DEFAULT_ARCHIVE_WORKERS, DEFAULT_CLASS_WORKERS};

#[derive(Debug, Clone, Parser)]
#[command(name = "class-usage-finder", version)]
#[command(about = "Find usages of Java classes, fields and methods in compiled jar files")]
pub struct Cli {
    /// Query such as `method:owner=[e]java.util.List;name=add`. Repeatable.
    #[arg(short = 'q', long = "query", value_name = "QUERY", required = true)]
    pub queries: Vec<String>,

    /// Archives, or directories searched recursively for jar/zip/war/ear files.
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Threads opening archives.
    #[arg(short = 't', long, value_name = "N", default_value_t = DEFAULT_ARCHIVE_WORKERS)]
    pub threads: usize,

    /// Threads checking class files.
    #[arg(long, value_name = "N", default_value_t = DEFAULT_CLASS_WORKERS)]
    pub class_workers: usize,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(short = 'o', long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Used when RUST_LOG is not set.
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    pub log_level: String,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
