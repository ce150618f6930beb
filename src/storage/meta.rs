//! # Table Metadata
//!
//! The `_meta` file describes the table shape: how many columns, their names
//! and types, the partition scheme and the designated timestamp column. It is
//! written once by the writer and parsed here into an immutable
//! [`TableMetadata`] at reader construction.
//!
//! ## File Format
//!
//! ```text
//! Offset  Size          Description
//! 0       4             Column count (u32, 1..=2048)
//! 4       4             Partition scheme code (u32)
//! 8       4             Designated timestamp column (i32, -1 if none)
//! 12      4 x count     Column type codes (u32 each)
//! then    per column    Name: i32 char count + UTF-16LE units
//! ```
//!
//! The fixed header is read through a zerocopy struct so the layout is
//! checked at compile time. Names are decoded into owned strings and the
//! mapping is released before construction returns; the metadata holds no
//! file handle afterwards.

use std::path::Path;

use eyre::{ensure, eyre, Result};
use hashbrown::HashMap;
use zerocopy::little_endian::{I32, U32};
use zerocopy::{FromBytes, Immutable, KnownLayout, Unaligned};

use super::fs::FilesFacade;
use super::mapped::MappedRegion;
use crate::calendar::PartitionBy;
use crate::layout::{MAX_COLUMNS, META_HEADER_SIZE, META_OFFSET_COLUMN_TYPES};
use crate::types::ColumnType;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, Immutable, KnownLayout, Unaligned)]
struct MetaHeader {
    column_count: U32,
    partition_by: U32,
    timestamp_index: I32,
}

const _: () = assert!(std::mem::size_of::<MetaHeader>() == META_HEADER_SIZE);

#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    column_type: ColumnType,
}

#[derive(Debug)]
pub struct TableMetadata {
    columns: Vec<Column>,
    by_name: HashMap<String, usize>,
    timestamp_index: i32,
    partition_by: PartitionBy,
}

impl TableMetadata {
    pub fn load<F: FilesFacade + ?Sized>(ff: &F, path: &Path) -> Result<Self> {
        ensure!(
            ff.exists(path),
            "metadata file does not exist: '{}'",
            path.display()
        );
        let mem = MappedRegion::of(ff, path, ff.page_size())?;
        ensure!(
            mem.len() >= META_HEADER_SIZE as u64,
            "metadata file '{}' is truncated",
            path.display()
        );

        let header = MetaHeader::ref_from_bytes(mem.bytes(0, META_HEADER_SIZE))
            .map_err(|e| eyre!("failed to parse metadata header: {e:?}"))?;
        let column_count = header.column_count.get();
        ensure!(
            column_count >= 1 && column_count <= MAX_COLUMNS,
            "invalid column count {} in '{}'",
            column_count,
            path.display()
        );
        let column_count = column_count as usize;
        let partition_by = PartitionBy::from_code(header.partition_by.get())?;
        let timestamp_index = header.timestamp_index.get();
        ensure!(
            timestamp_index >= -1 && (timestamp_index as i64) < column_count as i64,
            "designated timestamp index {} out of range in '{}'",
            timestamp_index,
            path.display()
        );

        ensure!(
            mem.len() >= META_OFFSET_COLUMN_TYPES + 4 * column_count as u64,
            "metadata file '{}' is truncated",
            path.display()
        );
        let mut types = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let code = mem.get_int(META_OFFSET_COLUMN_TYPES + 4 * i as u64) as u32;
            types.push(ColumnType::from_code(code)?);
        }

        let mut columns = Vec::with_capacity(column_count);
        let mut by_name = HashMap::with_capacity(column_count);
        let mut offset = META_OFFSET_COLUMN_TYPES + 4 * column_count as u64;
        for (i, column_type) in types.into_iter().enumerate() {
            ensure!(
                offset + 4 <= mem.len(),
                "metadata file '{}' is truncated",
                path.display()
            );
            let count = mem.get_int(offset);
            ensure!(count >= 0, "null column name in '{}'", path.display());
            ensure!(
                offset + 4 + 2 * count as u64 <= mem.len(),
                "metadata file '{}' is truncated",
                path.display()
            );
            let view = mem
                .get_str(offset)
                .ok_or_else(|| eyre!("null column name in '{}'", path.display()))?;
            let name = view.to_string();
            offset += 4 + 2 * view.len() as u64;
            by_name.insert(name.to_lowercase(), i);
            columns.push(Column { name, column_type });
        }

        Ok(Self {
            columns,
            by_name,
            timestamp_index,
            partition_by,
        })
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, index: usize) -> &str {
        &self.columns[index].name
    }

    pub fn column_type(&self, index: usize) -> ColumnType {
        self.columns[index].column_type
    }

    /// Case-insensitive column lookup.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(&name.to_lowercase()).copied()
    }

    /// Zero-based index of the designated timestamp column, -1 when the
    /// table has none.
    pub fn timestamp_index(&self) -> i32 {
        self.timestamp_index
    }

    pub fn partition_by(&self) -> PartitionBy {
        self.partition_by
    }
}
