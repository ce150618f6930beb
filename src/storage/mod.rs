//! # Storage Module
//!
//! The storage layer turns a table directory into memory-mapped, typed byte
//! windows. Instead of copying column data between kernel and user space,
//! column files are mapped directly into the process address space and
//! decoded in place; the OS page cache does the caching.
//!
//! ## Components
//!
//! - [`fs`]: the filesystem facade every path probe, open, positioned read
//!   and directory enumeration goes through; swap it to test against faults
//! - [`mapped`]: read-only growable mapped regions with typed accessors and
//!   zero-copy string/binary flyweights
//! - [`meta`]: the immutable `_meta` parse (columns, types, partition scheme)
//! - [`txn`]: the `_txi` sequence-lock snapshot shared with the live writer
//!
//! ## Safety Model
//!
//! Mapped memory is only ever read. The append-only writer contract means
//! bytes below a committed row count are never rewritten, so plain reads of
//! column data are stable once the owning reader holds the transaction
//! snapshot that published them. The one file a writer mutates in place is
//! `_txi`; it is read exclusively through volatile loads fenced by the
//! sequence-lock protocol in [`txn`].
//!
//! Remapping is the other hazard: growing a region invalidates its old
//! window. Regions require `&mut self` to remap, so the borrow checker
//! proves no flyweight or slice into the old window survives the move, at
//! zero runtime cost.

pub mod fs;
pub mod mapped;
pub mod meta;
pub mod txn;

pub use fs::{EntryKind, FilesFacade, OsFiles};
pub use mapped::{MappedRegion, StrView};
pub use meta::TableMetadata;
pub use txn::TxFile;
