//! # On-Disk Layout Constants
//!
//! This module centralizes every file name and byte offset of the table
//! format. Interdependent values live next to each other and are checked at
//! compile time, so a drift between the transaction-file offsets and the
//! snapshot reader cannot go unnoticed.
//!
//! ## Table Directory
//!
//! ```text
//! <root>/<table>/
//! ├── _meta                # column names, types, partition scheme
//! ├── _txi                 # transaction file, rewritten in place by the writer
//! ├── _todo                # presence means recovery pending; readers must refuse
//! ├── 2020-01-01/          # one directory per partition
//! │   ├── price.d          # column data
//! │   ├── sym.i            # column index (variable-length columns only)
//! │   ├── price.top        # optional 8-byte column top
//! │   └── _archive         # 8-byte row count, absent for the live partition
//! └── default/             # sole partition of a non-partitioned table
//! ```
//!
//! All multi-byte fields on disk are little-endian.

use std::path::{Path, PathBuf};

pub const META_FILE_NAME: &str = "_meta";
pub const TXN_FILE_NAME: &str = "_txi";
pub const TODO_FILE_NAME: &str = "_todo";
pub const ARCHIVE_FILE_NAME: &str = "_archive";
pub const DEFAULT_PARTITION_NAME: &str = "default";

pub const DATA_FILE_SUFFIX: &str = "d";
pub const INDEX_FILE_SUFFIX: &str = "i";
pub const TOP_FILE_SUFFIX: &str = "top";

/// Transaction-file offsets, u64 little-endian at each. The writer publishes
/// the payload fields first and bumps the value at [`TX_OFFSET_TXN`] last.
pub const TX_OFFSET_TXN: u64 = 0;
pub const TX_OFFSET_TRANSIENT_ROW_COUNT: u64 = 8;
pub const TX_OFFSET_FIXED_ROW_COUNT: u64 = 16;
pub const TX_OFFSET_MAX_TIMESTAMP: u64 = 24;
pub const TX_EOF: u64 = 32;

const _: () = assert!(TX_OFFSET_MAX_TIMESTAMP + 8 == TX_EOF);

/// Metadata-file offsets. The fixed header is followed by one u32 type code
/// per column, then one length-prefixed UTF-16 name per column.
pub const META_OFFSET_COLUMN_COUNT: u64 = 0;
pub const META_OFFSET_PARTITION_BY: u64 = 4;
pub const META_OFFSET_TIMESTAMP_INDEX: u64 = 8;
pub const META_OFFSET_COLUMN_TYPES: u64 = 12;
pub const META_HEADER_SIZE: usize = 12;

const _: () = assert!(META_OFFSET_COLUMN_TYPES as usize == META_HEADER_SIZE);

pub const MAX_COLUMNS: u32 = 2048;

pub fn d_file(dir: &Path, column: &str) -> PathBuf {
    dir.join(format!("{column}.{DATA_FILE_SUFFIX}"))
}

pub fn i_file(dir: &Path, column: &str) -> PathBuf {
    dir.join(format!("{column}.{INDEX_FILE_SUFFIX}"))
}

pub fn top_file(dir: &Path, column: &str) -> PathBuf {
    dir.join(format!("{column}.{TOP_FILE_SUFFIX}"))
}
