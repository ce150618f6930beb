//! # Filesystem Facade
//!
//! Every path probe, file open, positioned read and directory enumeration the
//! reader performs goes through [`FilesFacade`]. The trait keeps the storage
//! layer behaviorally defined rather than tied to one OS API, and lets tests
//! wrap [`OsFiles`] to inject faults or observe calls.
//!
//! Open files are plain [`File`] handles: dropping the handle is the `close`
//! of the fd-based contract, so every exit path releases its descriptors
//! without finalizers.

use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::path::Path;

use eyre::{Result, WrapErr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Other,
}

pub trait FilesFacade: fmt::Debug {
    fn exists(&self, path: &Path) -> bool;

    fn open_read(&self, path: &Path) -> Result<File>;

    /// Reads up to `buf.len()` bytes at an absolute offset, returning the
    /// byte count. Short reads are reported, not retried.
    fn read_at(&self, file: &File, buf: &mut [u8], offset: u64) -> Result<usize>;

    /// Granularity used to size memory mappings.
    fn page_size(&self) -> u64;

    /// Last OS error code, for diagnostics attached to failed calls.
    fn errno(&self) -> i32;

    fn read_dir(&self, path: &Path) -> Result<Vec<(OsString, EntryKind)>>;
}

/// The standard-library implementation used outside of tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFiles;

impl FilesFacade for OsFiles {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn open_read(&self, path: &Path) -> Result<File> {
        File::open(path).wrap_err_with(|| format!("failed to open '{}'", path.display()))
    }

    fn read_at(&self, file: &File, buf: &mut [u8], offset: u64) -> Result<usize> {
        #[cfg(unix)]
        return std::os::unix::fs::FileExt::read_at(file, buf, offset)
            .wrap_err_with(|| format!("read of {} bytes at {} failed", buf.len(), offset));
        #[cfg(windows)]
        return std::os::windows::fs::FileExt::seek_read(file, buf, offset)
            .wrap_err_with(|| format!("read of {} bytes at {} failed", buf.len(), offset));
    }

    fn page_size(&self) -> u64 {
        4096
    }

    fn errno(&self) -> i32 {
        std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<(OsString, EntryKind)>> {
        let iter = std::fs::read_dir(path)
            .wrap_err_with(|| format!("failed to enumerate '{}'", path.display()))?;
        let mut entries = Vec::new();
        for entry in iter {
            let entry =
                entry.wrap_err_with(|| format!("failed to enumerate '{}'", path.display()))?;
            let file_type = entry
                .file_type()
                .wrap_err_with(|| format!("failed to stat '{}'", entry.path().display()))?;
            let kind = if file_type.is_dir() {
                EntryKind::Dir
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };
            entries.push((entry.file_name(), kind));
        }
        Ok(entries)
    }
}
