//! # Table Reader
//!
//! [`TableReader`] is a read-only cursor over one partitioned, columnar,
//! append-only table. Construction opens the metadata and transaction files,
//! scans the table root for partition directories and computes the expected
//! partition range; everything else is lazy. A partition's column files are
//! mapped the first time the cursor (or a random access) enters it, which
//! bounds open file descriptors on wide time ranges.
//!
//! ## Partition Layout in Memory
//!
//! Column mappings live in one flat vector. Each partition occupies a
//! power-of-two stride of `2 * ceil_pow2(column_count)` slots, so a
//! partition's base index is a shift (`p << bits`), and the base doubles as
//! the partition half of the composite row id. Per column there are two
//! slots: the data mapping and, for variable-length columns, the index
//! mapping. Column tops use the same scheme at half the stride.
//!
//! ## Keeping Up With the Writer
//!
//! One external writer may append rows, extend the live partition and create
//! new partitions concurrently. Readers observe none of it until
//! [`TableReader::reload`]: the transaction snapshot is re-read under the
//! sequence-lock protocol, the partition vector grows by the calendar
//! distance between the old and new max timestamp, and already-mapped column
//! regions of the affected partition are remapped to their new length.
//! Between reloads a reader sees a fixed snapshot; two readers on the same
//! transaction observe identical bytes.
//!
//! A reload does not move an in-flight cursor: the current partition's
//! cached bounds stay as they are, and the extended tail becomes visible
//! after [`TableReader::to_top`] (partitions the cursor has not entered yet
//! pick up their post-reload sizes as soon as it reaches them).
//!
//! ## Resources
//!
//! The reader exclusively owns its facade, metadata, transaction mapping and
//! column mappings; dropping it releases everything. Records borrow the
//! reader and cannot outlive a cursor motion.

mod record;

pub use record::Record;

use std::path::{Path, PathBuf};

use eyre::{ensure, Result};
use tracing::{debug, info};

use crate::calendar::PartitionBy;
use crate::layout;
use crate::storage::fs::{EntryKind, FilesFacade, OsFiles};
use crate::storage::mapped::MappedRegion;
use crate::storage::meta::TableMetadata;
use crate::storage::txn::TxFile;
use crate::types::rows;

#[derive(Debug)]
pub struct TableReader<F: FilesFacade = OsFiles> {
    ff: F,
    path: PathBuf,
    metadata: TableMetadata,
    tx: TxFile,
    partition_by: PartitionBy,
    column_count: usize,
    column_count_bits: u32,
    partition_min: i64,
    partition_count: usize,
    /// -1 marks a partition that has not been opened yet.
    partition_sizes: Vec<i64>,
    columns: Vec<Option<MappedRegion>>,
    column_tops: Vec<i64>,
    /// Scratch buffer backing archive and column-top reads.
    temp_mem: [u8; 8],
    // Cursor state.
    partition_index: usize,
    column_base: usize,
    record_index: i64,
    max_record_index: i64,
}

impl TableReader<OsFiles> {
    /// Opens `<root>/<name>` against the standard filesystem.
    pub fn open_default(root: impl AsRef<Path>, name: &str) -> Result<Self> {
        Self::open(OsFiles, root, name)
    }
}

impl<F: FilesFacade> TableReader<F> {
    pub fn open(ff: F, root: impl AsRef<Path>, name: &str) -> Result<Self> {
        let path = root.as_ref().join(name);
        ensure!(
            !ff.exists(&path.join(layout::TODO_FILE_NAME)),
            "table '{}' is pending recovery",
            path.display()
        );

        let mut tx = TxFile::open(&ff, &path.join(layout::TXN_FILE_NAME))?;
        let metadata = TableMetadata::load(&ff, &path.join(layout::META_FILE_NAME))?;
        tx.read_txn();

        let column_count = metadata.column_count();
        let column_count_bits = (column_count.next_power_of_two() * 2).trailing_zeros();
        let partition_by = metadata.partition_by();

        let mut reader = Self {
            ff,
            path,
            metadata,
            tx,
            partition_by,
            column_count,
            column_count_bits,
            partition_min: i64::MAX,
            partition_count: 0,
            partition_sizes: Vec::new(),
            columns: Vec::new(),
            column_tops: Vec::new(),
            temp_mem: [0u8; 8],
            partition_index: 0,
            column_base: 0,
            record_index: 0,
            max_record_index: -1,
        };
        match partition_by {
            PartitionBy::None => {
                reader.partition_count = 1;
                reader.partition_sizes = vec![-1];
                reader.columns.resize_with(column_count * 2, || None);
                reader.column_tops = vec![0; column_count];
            }
            _ => reader.seed_partitions()?,
        }
        Ok(reader)
    }

    pub fn metadata(&self) -> &TableMetadata {
        &self.metadata
    }

    /// Total row count of the current transaction snapshot.
    pub fn size(&self) -> u64 {
        self.tx.size().max(0) as u64
    }

    pub fn partition_count(&self) -> usize {
        self.partition_count
    }

    /// Resets the cursor to before the first row. Nothing is unmapped.
    pub fn to_top(&mut self) {
        self.partition_index = 0;
        self.record_index = -1;
        self.max_record_index = -1;
    }

    /// True if the cursor has another row, lazily opening partitions as it
    /// walks forward. Empty partitions are skipped.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.record_index < self.max_record_index {
            return Ok(true);
        }
        self.switch_partition()
    }

    /// Advances the cursor and returns the record at the new position. Call
    /// only after [`Self::has_next`] returned true.
    pub fn next_record(&mut self) -> Record<'_, F> {
        self.record_index += 1;
        Record::new(self, self.column_base, self.record_index)
    }

    /// Record at the cursor's current position.
    pub fn get_record(&self) -> Record<'_, F> {
        Record::new(self, self.column_base, self.record_index)
    }

    /// Fresh record positioned at the first row of the first partition; use
    /// [`Self::record_at`] to place it anywhere.
    pub fn new_record(&self) -> Record<'_, F> {
        Record::new(self, 0, 0)
    }

    /// Random access by composite row id. Bounds are not checked and the
    /// partition must already be open; callers hold ids produced by a cursor
    /// pass over this reader.
    pub fn record_at(&self, row_id: u64) -> Record<'_, F> {
        Record::new(
            self,
            self.column_base_of(rows::partition_index(row_id)),
            rows::local_row(row_id),
        )
    }

    /// Picks up writer progress. Returns true iff the transaction snapshot
    /// advanced; on failure the reader keeps its prior coherent state.
    pub fn reload(&mut self) -> Result<bool> {
        match self.partition_by {
            PartitionBy::None => {
                if !self.tx.read_txn() {
                    return Ok(false);
                }
                let size = self.tx.size();
                self.reload_partition(0, size)?;
                debug!(size, "reloaded non-partitioned table");
                Ok(true)
            }
            _ => self.reload_partitioned(),
        }
    }

    fn reload_partitioned(&mut self) -> Result<bool> {
        if self.partition_count == 0 {
            // The first partitions may have appeared since construction;
            // nothing is open yet, so a fresh scan is enough.
            if !self.tx.read_txn() {
                return Ok(false);
            }
            self.seed_partitions()?;
            return Ok(true);
        }

        let prev_floor = self.partition_by.floor(self.tx.max_timestamp())?;
        if !self.tx.read_txn() {
            return Ok(false);
        }
        let new_floor = self.partition_by.floor(self.tx.max_timestamp())?;
        let delta = self.partition_by.between(prev_floor, new_floor)?;
        let last = self.partition_count - 1;

        if delta > 0 {
            // The previously-live partition is closed now; its archived row
            // count is read before the partition vectors grow so a failed
            // read leaves the reader coherent.
            let last_size = if self.partition_sizes[last] > 0 {
                let dir = self.partition_dir(last)?;
                Some(read_partition_size(&self.ff, &dir, &mut self.temp_mem)?)
            } else {
                None
            };

            self.partition_count += delta as usize;
            self.partition_sizes.resize(self.partition_count, -1);
            self.columns.resize_with(
                column_capacity(self.column_count_bits, self.partition_count, self.column_count),
                || None,
            );
            self.column_tops.resize(
                top_capacity(self.column_count_bits, self.partition_count, self.column_count),
                0,
            );
            debug!(partitions = self.partition_count, "reload extended partition range");

            if let Some(size) = last_size {
                self.reload_partition(last, size)?;
            }
        } else {
            self.reload_partition(last, self.tx.transient_row_count())?;
        }
        Ok(true)
    }

    /// Remaps every mapped column of an already-opened partition and caches
    /// its new size. Unopened partitions are left for the lazy open, which
    /// reads the post-reload state anyway.
    fn reload_partition(&mut self, p: usize, size: i64) -> Result<()> {
        if self.partition_sizes[p] > -1 {
            let base = self.column_base_of(p);
            for c in 0..self.column_count {
                let primary = primary_index(base, c);
                if let Some(mem) = self.columns[primary].as_mut() {
                    mem.track_file_size()?;
                }
                if let Some(mem) = self.columns[primary + 1].as_mut() {
                    mem.track_file_size()?;
                }
            }
            self.partition_sizes[p] = size;
        }
        Ok(())
    }

    fn switch_partition(&mut self) -> Result<bool> {
        while self.partition_index < self.partition_count {
            let p = self.partition_index;
            let base = self.column_base_of(p);
            self.partition_index += 1;
            let mut size = self.partition_sizes[p];
            if size == -1 {
                let last = self.partition_index == self.partition_count;
                size = self.open_partition(p, base, last)?;
            }
            if size == 0 {
                continue;
            }
            self.max_record_index = size - 1;
            self.record_index = -1;
            self.column_base = base;
            return Ok(true);
        }
        Ok(false)
    }

    fn open_partition(&mut self, p: usize, base: usize, last: bool) -> Result<i64> {
        let dir = self.partition_dir(p)?;
        let size = if self.ff.exists(&dir) {
            let size = if last {
                self.tx.transient_row_count()
            } else {
                read_partition_size(&self.ff, &dir, &mut self.temp_mem)?
            };
            info!(partition = %dir.display(), size, "open partition");
            if size > 0 {
                self.open_partition_columns(base, &dir)?;
            }
            size
        } else {
            // A missing directory inside the partition range is a zero-row
            // partition, not an error.
            0
        };
        self.partition_sizes[p] = size;
        Ok(size)
    }

    fn open_partition_columns(&mut self, base: usize, dir: &Path) -> Result<()> {
        let map_page_size = self.ff.page_size();
        for c in 0..self.column_count {
            let primary = primary_index(base, c);
            if self.columns[primary].is_some() {
                continue;
            }
            let name = self.metadata.column_name(c);
            let d_path = layout::d_file(dir, name);
            if !self.ff.exists(&d_path) {
                // Column added after this partition was created; reads will
                // see the null sentinel.
                continue;
            }
            self.columns[primary] = Some(MappedRegion::of(&self.ff, &d_path, map_page_size)?);
            if self.metadata.column_type(c).is_variable() {
                let i_path = layout::i_file(dir, name);
                self.columns[primary + 1] =
                    Some(MappedRegion::of(&self.ff, &i_path, map_page_size)?);
            }
            self.column_tops[top_index(base, c)] =
                read_column_top(&self.ff, dir, name, &mut self.temp_mem)?;
        }
        Ok(())
    }

    fn seed_partitions(&mut self) -> Result<()> {
        self.partition_min = find_partition_minimum(&self.ff, &self.path, self.partition_by)?;
        self.partition_count = if self.partition_min == i64::MAX {
            0
        } else {
            let floor = self.partition_by.floor(self.tx.max_timestamp())?;
            let spanned = self.partition_by.between(self.partition_min, floor)?;
            (spanned + 1).max(0) as usize
        };
        self.partition_sizes = vec![-1; self.partition_count];
        self.columns = Vec::new();
        self.columns.resize_with(
            column_capacity(self.column_count_bits, self.partition_count, self.column_count),
            || None,
        );
        self.column_tops = vec![
            0;
            top_capacity(self.column_count_bits, self.partition_count, self.column_count)
        ];
        Ok(())
    }

    fn partition_dir(&self, p: usize) -> Result<PathBuf> {
        Ok(self.path.join(self.partition_by.dir_name(self.partition_min, p)?))
    }

    fn column_base_of(&self, p: usize) -> usize {
        p << self.column_count_bits
    }

    pub(crate) fn column_count_bits(&self) -> u32 {
        self.column_count_bits
    }

    pub(crate) fn primary_column(&self, base: usize, column: usize) -> Option<&MappedRegion> {
        self.columns[primary_index(base, column)].as_ref()
    }

    pub(crate) fn secondary_column(&self, base: usize, column: usize) -> Option<&MappedRegion> {
        self.columns[primary_index(base, column) + 1].as_ref()
    }

    pub(crate) fn column_top(&self, base: usize, column: usize) -> i64 {
        self.column_tops[top_index(base, column)]
    }
}

fn primary_index(base: usize, column: usize) -> usize {
    base + column * 2
}

fn top_index(base: usize, column: usize) -> usize {
    (base >> 1) + column
}

/// A single partition uses exactly its own slots; multiple partitions use
/// the power-of-two stride so a base stays a shift.
fn column_capacity(bits: u32, partition_count: usize, column_count: usize) -> usize {
    if partition_count == 1 {
        column_count * 2
    } else {
        partition_count << bits
    }
}

fn top_capacity(bits: u32, partition_count: usize, column_count: usize) -> usize {
    if partition_count == 1 {
        column_count
    } else {
        partition_count << (bits - 1)
    }
}

fn find_partition_minimum<F: FilesFacade + ?Sized>(
    ff: &F,
    path: &Path,
    partition_by: PartitionBy,
) -> Result<i64> {
    let mut min = i64::MAX;
    for (name, kind) in ff.read_dir(path)? {
        if !matches!(kind, EntryKind::Dir | EntryKind::Symlink) {
            continue;
        }
        let Some(name) = name.to_str() else {
            continue;
        };
        // Anything that does not parse under the partition format is an
        // unrelated artifact and is skipped.
        if let Ok(t) = partition_by.parse(name) {
            min = min.min(t);
        }
    }
    Ok(min)
}

fn read_partition_size<F: FilesFacade + ?Sized>(
    ff: &F,
    dir: &Path,
    scratch: &mut [u8; 8],
) -> Result<i64> {
    let path = dir.join(layout::ARCHIVE_FILE_NAME);
    ensure!(
        ff.exists(&path),
        "partition archive does not exist: '{}'",
        path.display()
    );
    let file = ff.open_read(&path)?;
    let n = ff.read_at(&file, scratch, 0)?;
    ensure!(
        n == 8,
        "failed to read partition size from '{}' (errno {})",
        path.display(),
        ff.errno()
    );
    Ok(i64::from_le_bytes(*scratch))
}

fn read_column_top<F: FilesFacade + ?Sized>(
    ff: &F,
    dir: &Path,
    column: &str,
    scratch: &mut [u8; 8],
) -> Result<i64> {
    let path = layout::top_file(dir, column);
    if !ff.exists(&path) {
        return Ok(0);
    }
    let file = ff.open_read(&path)?;
    let n = ff.read_at(&file, scratch, 0)?;
    ensure!(
        n == 8,
        "failed to read column top from '{}' (errno {})",
        path.display(),
        ff.errno()
    );
    Ok(i64::from_le_bytes(*scratch))
}
