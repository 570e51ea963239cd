//! # class-usage-finder
//!
//! Finds every reference to a chosen set of Java classes, fields and methods
//! inside compiled jar files, down to the method and source line.
//!
//! ## Architecture
//!
//! - **archive**: Memory-mapped jar access, class entry listing and reading
//! - **classfile**: Class file parser producing a structured model with decoded instructions
//! - **constant_pool**: Constant pool decoding and class name normalization
//! - **descriptor**: Field and method descriptor decoding
//! - **visitor**: Walks a parsed class and emits usage events
//! - **location**: Immutable location chains attached to usages
//! - **query**: Queries, string checks and the query grammar
//! - **report**: Matches and the shared report sink
//! - **worker**: Fixed-size worker pools over a shared task queue
//! - **checker**: The two-phase scan wiring everything together
//! - **progress**: Scan state, counters and progress observers
//! - **config**: Validated scan settings and defaults
//! - **scan**: Expansion of input paths into archive files
//! - **error**: Error types

pub mod archive;
pub mod checker;
pub mod classfile;
pub mod cli;
pub mod config;
pub mod constant_pool;
pub mod descriptor;
pub mod error;
pub mod location;
pub mod progress;
pub mod query;
pub mod report;
pub mod scan;
pub mod visitor;
pub mod worker;
