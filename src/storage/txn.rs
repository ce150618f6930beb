//! # Transaction View
//!
//! The `_txi` file is the single point of coordination between the external
//! writer and any number of readers. The writer rewrites it in place, without
//! locks, publishing the payload fields first and bumping the transaction
//! number last (behind a store fence on its side). Readers obtain a coherent
//! snapshot with the classic sequence-lock pattern:
//!
//! ```text
//! loop:
//!   txn1 := read(TXN)
//!   if txn1 == last committed txn: return Unchanged
//!   acquire fence
//!   read transientRowCount, fixedRowCount, maxTimestamp
//!   acquire fence
//!   if read(TXN) == txn1: commit snapshot, return Changed
//!   park briefly, retry
//! ```
//!
//! A reader that sees the same transaction number on both sides of the
//! payload has observed a fully published snapshot; anything else is a torn
//! read and the loop retries after a bounded sub-microsecond park.
//!
//! `size` is `fixedRowCount + transientRowCount`: the rows of all closed
//! partitions plus the live partition's row count.

use std::hint;
use std::path::Path;
use std::sync::atomic::{fence, Ordering};

use eyre::{ensure, Result};

use super::fs::FilesFacade;
use super::mapped::MappedRegion;
use crate::layout::{
    TX_EOF, TX_OFFSET_FIXED_ROW_COUNT, TX_OFFSET_MAX_TIMESTAMP, TX_OFFSET_TRANSIENT_ROW_COUNT,
    TX_OFFSET_TXN,
};

#[derive(Debug)]
pub struct TxFile {
    mem: MappedRegion,
    txn: i64,
    transient_row_count: i64,
    fixed_row_count: i64,
    max_timestamp: i64,
}

impl TxFile {
    pub fn open<F: FilesFacade + ?Sized>(ff: &F, path: &Path) -> Result<Self> {
        ensure!(
            ff.exists(path),
            "transaction file does not exist: '{}'",
            path.display()
        );
        let mem = MappedRegion::of(ff, path, ff.page_size())?;
        ensure!(
            mem.len() >= TX_EOF,
            "transaction file '{}' is truncated ({} < {} bytes)",
            path.display(),
            mem.len(),
            TX_EOF
        );
        Ok(Self {
            mem,
            txn: -1,
            transient_row_count: 0,
            fixed_row_count: 0,
            max_timestamp: 0,
        })
    }

    /// Re-reads the transaction snapshot. Returns `false` when the writer has
    /// not committed since the last call, `true` once a new coherent snapshot
    /// has been captured.
    pub fn read_txn(&mut self) -> bool {
        loop {
            let txn = self.mem.get_long_volatile(TX_OFFSET_TXN);
            if txn == self.txn {
                return false;
            }

            fence(Ordering::Acquire);
            let transient_row_count = self.mem.get_long_volatile(TX_OFFSET_TRANSIENT_ROW_COUNT);
            let fixed_row_count = self.mem.get_long_volatile(TX_OFFSET_FIXED_ROW_COUNT);
            let max_timestamp = self.mem.get_long_volatile(TX_OFFSET_MAX_TIMESTAMP);
            fence(Ordering::Acquire);

            if txn == self.mem.get_long_volatile(TX_OFFSET_TXN) {
                self.txn = txn;
                self.transient_row_count = transient_row_count;
                self.fixed_row_count = fixed_row_count;
                self.max_timestamp = max_timestamp;
                return true;
            }
            hint::spin_loop();
        }
    }

    pub fn txn(&self) -> i64 {
        self.txn
    }

    pub fn transient_row_count(&self) -> i64 {
        self.transient_row_count
    }

    pub fn fixed_row_count(&self) -> i64 {
        self.fixed_row_count
    }

    pub fn max_timestamp(&self) -> i64 {
        self.max_timestamp
    }

    pub fn size(&self) -> i64 {
        self.fixed_row_count + self.transient_row_count
    }
}
