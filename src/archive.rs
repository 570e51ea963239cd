use memmap2::Mmap;
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;
use zip::result::ZipError;

use crate::error::ScanError;

const CLASS_SUFFIX: &str = ".class";
const MAX_PREALLOC: u64 = 1 << 20;

#[derive(Debug, Clone)]
struct MappedFile(Arc<Mmap>);

impl AsRef<[u8]> for MappedFile {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An opened, memory-mapped jar. Clones share the mapping and the parsed
/// central directory, so every class-checking task can hold its own handle.
#[derive(Debug, Clone)]
pub struct JarArchive {
    path: PathBuf,
    name: Arc<str>,
    zip: ZipArchive<Cursor<MappedFile>>,
}

/// A class-file entry found while listing an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassEntry {
    pub index: usize,
    pub name: String,
}

impl JarArchive {
    pub fn open(path: &Path) -> Result<Self, ScanError> {
        let open_error = |source: ZipError| ScanError::ArchiveOpen {
            path: path.to_path_buf(),
            source,
        };

        let file = File::open(path).map_err(|e| open_error(ZipError::Io(e)))?;
        // SAFETY: The file is opened read-only and the mapping is only ever read.
        // Its lifetime is tied to the Arc shared by every clone of this handle.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| open_error(ZipError::Io(e)))?;
        let zip = ZipArchive::new(Cursor::new(MappedFile(Arc::new(mmap)))).map_err(open_error)?;

        Ok(Self {
            path: path.to_path_buf(),
            name: path.to_string_lossy().into(),
            zip,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name used in locations and diagnostics.
    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Lists the class-file entries, skipping directories and everything not
    /// ending in `.class`. Entries whose headers cannot be read are returned
    /// as errors next to the listing.
    pub fn class_entries(&mut self) -> (Vec<ClassEntry>, Vec<ScanError>) {
        let mut entries = Vec::new();
        let mut failures = Vec::new();

        for index in 0..self.zip.len() {
            match self.zip.by_index_raw(index) {
                Ok(entry) => {
                    if entry.is_dir() || !entry.name().ends_with(CLASS_SUFFIX) {
                        continue;
                    }
                    entries.push(ClassEntry {
                        index,
                        name: entry.name().to_string(),
                    });
                }
                Err(source) => failures.push(ScanError::EntryRead {
                    archive: self.name.to_string(),
                    entry: format!("#{index}"),
                    source,
                }),
            }
        }

        (entries, failures)
    }

    pub fn read_entry(&mut self, entry: &ClassEntry) -> Result<Vec<u8>, ScanError> {
        let read_error = |source: ZipError| ScanError::EntryRead {
            archive: self.name.to_string(),
            entry: entry.name.clone(),
            source,
        };

        let mut file = self.zip.by_index(entry.index).map_err(&read_error)?;
        let mut bytes = Vec::with_capacity(file.size().min(MAX_PREALLOC) as usize);
        file.read_to_end(&mut bytes)
            .map_err(|e| read_error(ZipError::Io(e)))?;
        Ok(bytes)
    }
}
