//! Error taxonomy.
//!
//! Every per-item failure during a scan is one of the [`ScanError`] variants.
//! None of them aborts a run: the failing archive or entry is skipped, logged
//! and counted. [`ConfigError`] covers startup validation, which is fatal.

use std::path::PathBuf;

use zip::result::ZipError;

/// A malformed or structurally inconsistent class file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassFormatError {
    #[error("unexpected end of class data at offset {offset} (wanted {wanted} more bytes)")]
    Truncated { offset: usize, wanted: usize },

    #[error("bad magic number {0:#010x}")]
    BadMagic(u32),

    #[error("unsupported class file version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },

    #[error("invalid constant pool tag {tag} at index {index}")]
    InvalidConstantTag { index: u16, tag: u8 },

    #[error("constant pool index {index} is out of range or unusable")]
    BadConstantIndex { index: u16 },

    #[error("constant pool entry {index} is not a {expected}")]
    WrongConstantKind { index: u16, expected: &'static str },

    #[error("malformed modified UTF-8 in constant pool entry {index}")]
    MalformedUtf8 { index: u16 },

    #[error("invalid method handle kind {kind} at index {index}")]
    InvalidHandleKind { index: u16, kind: u8 },

    #[error("invalid descriptor {0:?}")]
    InvalidDescriptor(String),

    #[error("invalid opcode {opcode:#04x} at code offset {offset}")]
    InvalidOpcode { opcode: u8, offset: u32 },

    #[error("invalid code length {0}")]
    InvalidCodeLength(u32),

    #[error("invalid {kind} at code offset {offset}")]
    InvalidSwitch { kind: &'static str, offset: u32 },

    #[error("attribute {name} has inconsistent length")]
    AttributeLength { name: String },

    #[error("{0} trailing bytes after class data")]
    TrailingBytes(usize),
}

/// Per-item scan failures. All are recoverable: the item is dropped.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("cannot open archive {}: {source}", path.display())]
    ArchiveOpen {
        path: PathBuf,
        #[source]
        source: ZipError,
    },

    #[error("cannot read entry {entry} of {archive}: {source}")]
    EntryRead {
        archive: String,
        entry: String,
        #[source]
        source: ZipError,
    },

    #[error("malformed class file {entry} in {archive}: {source}")]
    ClassFormat {
        archive: String,
        entry: String,
        #[source]
        source: ClassFormatError,
    },
}

/// Startup validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no input files or directories given")]
    NoInputs,

    #[error("no queries given")]
    NoQueries,

    #[error("{what} worker count must be positive")]
    NoWorkers { what: &'static str },

    #[error("the file or directory '{}' does not exist", .0.display())]
    MissingInput(PathBuf),
}
