//! # tickdb - Columnar Time-Series Table Reader
//!
//! tickdb is an embeddable, read-only scanner for partitioned,
//! column-oriented, append-only time-series tables produced by an external
//! writer. It prioritizes:
//!
//! - **Zero-copy access**: column files are memory-mapped and decoded in
//!   place; string and binary values are flyweight views into the mapping
//! - **Lazy materialization**: a partition's columns are mapped the first
//!   time the cursor enters it, bounding open file descriptors
//! - **Lock-free coordination**: one live writer may append concurrently;
//!   readers pick up its progress through a sequence-lock transaction
//!   snapshot, never through locks
//!
//! ## Quick Start
//!
//! ```ignore
//! use tickdb::TableReader;
//!
//! let mut reader = TableReader::open_default("/var/lib/ticks", "trades")?;
//! let price = reader.metadata().column_index("price").unwrap();
//! while reader.has_next()? {
//!     let row = reader.next_record();
//!     println!("{}", row.get_double(price));
//! }
//!
//! // later: observe writer progress
//! if reader.reload()? {
//!     reader.to_top();
//! }
//! ```
//!
//! ## Table Layout
//!
//! ```text
//! <root>/<table>/
//! ├── _meta            # columns, types, partition scheme
//! ├── _txi             # transaction file, rewritten in place by the writer
//! ├── 2020-01-01/      # one directory per day/month/year partition
//! │   ├── price.d      # column data
//! │   ├── sym.i        # column index (variable-length columns)
//! │   ├── price.top    # optional column top
//! │   └── _archive     # row count, absent for the live partition
//! └── default/         # sole partition of a non-partitioned table
//! ```
//!
//! ## Module Overview
//!
//! - [`reader`]: the [`TableReader`] cursor and [`Record`] flyweight
//! - [`storage`]: filesystem facade, mapped regions, metadata, transactions
//! - [`calendar`]: partition scheme arithmetic and directory names
//! - [`types`]: column types, null sentinels, row-id packing
//! - [`layout`]: on-disk names and byte offsets
//!
//! Everything the reader acquires is released when it is dropped; records
//! borrow the reader and cannot outlive a cursor motion.

pub mod calendar;
pub mod layout;
pub mod reader;
pub mod storage;
pub mod types;

pub use calendar::PartitionBy;
pub use reader::{Record, TableReader};
pub use storage::{EntryKind, FilesFacade, MappedRegion, OsFiles, StrView, TableMetadata};
pub use types::{nulls, rows, ColumnType};
