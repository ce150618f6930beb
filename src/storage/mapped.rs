//! # Read-Only Mapped Regions
//!
//! [`MappedRegion`] is a byte window over one column (or control) file,
//! memory-mapped read-only. Instead of copying column data through read
//! buffers, the file is mapped into the process address space and typed
//! accessors decode fixed-width values at absolute byte offsets with no
//! intermediate copy.
//!
//! ## Growth
//!
//! The external writer appends to column files while readers hold mappings.
//! A region therefore supports one mutation: [`MappedRegion::track_file_size`]
//! remaps the window to cover the file's current on-disk length. The window
//! is sized in whole map pages and never shrinks; bytes past end-of-file in
//! the final page read as zero and are never addressed by accessors, which
//! stay below the committed row counts of the owning reader's transaction
//! snapshot.
//!
//! ## Flyweights
//!
//! Variable-length payloads are exposed as zero-copy views:
//!
//! ```text
//! string at offset:  [i32 char count][char count x 2 bytes, UTF-16LE]
//! binary at offset:  [i32 byte length][length bytes]
//! ```
//!
//! A length of -1 signals null and yields `None`. Views borrow the region
//! immutably, so any number of them may coexist; they are invalidated by the
//! borrow checker before the region can be remapped or dropped.

use std::char;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use memmap2::{Mmap, MmapOptions};

use super::fs::FilesFacade;

#[derive(Debug)]
pub struct MappedRegion {
    file: File,
    path: PathBuf,
    map: Option<Mmap>,
    len: u64,
    map_page_size: u64,
}

impl MappedRegion {
    /// Opens `path` through the facade and maps its current contents. An
    /// empty file produces an empty window that a later `track_file_size`
    /// can populate.
    pub fn of<F: FilesFacade + ?Sized>(ff: &F, path: &Path, map_page_size: u64) -> Result<Self> {
        let file = ff.open_read(path)?;
        let len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", path.display()))?
            .len();
        let mut region = Self {
            file,
            path: path.to_path_buf(),
            map: None,
            len: 0,
            map_page_size: map_page_size.max(1),
        };
        if len > 0 {
            region.remap(len)?;
        }
        Ok(region)
    }

    /// Remaps the window to cover the file's current length. Never shrinks:
    /// a concurrent truncation is a writer-contract violation and the old
    /// window stays in place.
    pub fn track_file_size(&mut self) -> Result<()> {
        let len = self
            .file
            .metadata()
            .wrap_err_with(|| format!("failed to stat '{}'", self.path.display()))?
            .len();
        if len > self.len {
            self.remap(len)?;
        }
        Ok(())
    }

    fn remap(&mut self, len: u64) -> Result<()> {
        let map_len = len.div_ceil(self.map_page_size) * self.map_page_size;
        // SAFETY: Mmap::map is unsafe because the underlying file can change
        // while mapped. This is safe because:
        // 1. The mapping is read-only; this crate never writes through it
        // 2. The writer contract is append-only: bytes below a committed row
        //    count are never rewritten once published
        // 3. Accessors only dereference offsets the owning reader validated
        //    against its transaction snapshot (the one exception, the
        //    transaction file itself, goes through get_long_volatile)
        // 4. The map's lifetime is tied to this region, preventing
        //    use-after-unmap
        let map = unsafe {
            MmapOptions::new()
                .len(map_len as usize)
                .map(&self.file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", self.path.display()))?
        };
        self.map = Some(map);
        self.len = len;
        Ok(())
    }

    /// File bytes currently covered by the window.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub(crate) fn bytes(&self, offset: u64, len: usize) -> &[u8] {
        let start = offset as usize;
        &self.map.as_deref().unwrap_or(&[])[start..start + len]
    }

    fn array<const N: usize>(&self, offset: u64) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(offset, N));
        out
    }

    pub fn get_bool(&self, offset: u64) -> bool {
        self.bytes(offset, 1)[0] != 0
    }

    pub fn get_byte(&self, offset: u64) -> i8 {
        self.bytes(offset, 1)[0] as i8
    }

    pub fn get_short(&self, offset: u64) -> i16 {
        i16::from_le_bytes(self.array(offset))
    }

    pub fn get_int(&self, offset: u64) -> i32 {
        i32::from_le_bytes(self.array(offset))
    }

    pub fn get_long(&self, offset: u64) -> i64 {
        i64::from_le_bytes(self.array(offset))
    }

    pub fn get_float(&self, offset: u64) -> f32 {
        f32::from_le_bytes(self.array(offset))
    }

    pub fn get_double(&self, offset: u64) -> f64 {
        f64::from_le_bytes(self.array(offset))
    }

    /// Volatile u64 read for the transaction file, which a live writer
    /// rewrites in place. `offset` must be 8-byte aligned.
    pub fn get_long_volatile(&self, offset: u64) -> i64 {
        let map = self.map.as_deref().unwrap_or(&[]);
        let start = offset as usize;
        assert!(start + 8 <= map.len(), "volatile read at {offset} out of bounds");
        debug_assert_eq!(offset % 8, 0);
        // SAFETY: the mapping base is page-aligned and offset is 8-byte
        // aligned, so the cast pointer is properly aligned for i64. The
        // assert above keeps the read inside the mapping. read_volatile is
        // required because a concurrent writer updates these bytes; snapshot
        // coherence is the seq-lock protocol's job (storage::txn), not this
        // read's.
        unsafe { map.as_ptr().add(start).cast::<i64>().read_volatile() }
    }

    /// Flyweight view of the string payload at `offset`; `None` when the
    /// length prefix is -1.
    pub fn get_str(&self, offset: u64) -> Option<StrView<'_>> {
        let count = self.get_int(offset);
        if count < 0 {
            return None;
        }
        Some(StrView {
            units: self.bytes(offset + 4, count as usize * 2),
        })
    }

    /// Flyweight view of the binary payload at `offset`; `None` when the
    /// length prefix is -1.
    pub fn get_bin(&self, offset: u64) -> Option<&[u8]> {
        let len = self.get_int(offset);
        if len < 0 {
            return None;
        }
        Some(self.bytes(offset + 4, len as usize))
    }
}

/// Zero-copy view of a UTF-16LE string payload inside a mapped region.
#[derive(Clone, Copy)]
pub struct StrView<'a> {
    units: &'a [u8],
}

impl<'a> StrView<'a> {
    /// Number of UTF-16 code units.
    pub fn len(&self) -> usize {
        self.units.len() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn char_at(&self, index: usize) -> u16 {
        u16::from_le_bytes([self.units[index * 2], self.units[index * 2 + 1]])
    }

    pub fn code_units(&self) -> impl Iterator<Item = u16> + 'a {
        self.units
            .chunks_exact(2)
            .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
    }
}

impl fmt::Display for StrView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in char::decode_utf16(self.code_units()) {
            write!(f, "{}", c.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for StrView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StrView({self})")
    }
}

impl PartialEq<&str> for StrView<'_> {
    fn eq(&self, other: &&str) -> bool {
        self.code_units().eq(other.encode_utf16())
    }
}
