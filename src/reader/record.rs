//! # Record Flyweight
//!
//! A [`Record`] is a cursor position, not a value: it borrows the reader at
//! a `(column base, local row)` coordinate and decodes column values straight
//! out of the mapped regions on access. Motion of the cursor requires
//! `&mut TableReader`, so the borrow checker retires every outstanding record
//! before the position or the mappings can change.
//!
//! Accessors never fail. Rows a column has no data for read as the type's
//! null sentinel: rows below the column top, every row of a partition where
//! the column file is absent, and symbol columns (whose dictionary this crate
//! does not materialize).

use crate::storage::fs::FilesFacade;
use crate::storage::mapped::{MappedRegion, StrView};
use crate::storage::OsFiles;
use crate::types::{nulls, rows};

use super::TableReader;

#[derive(Debug)]
pub struct Record<'a, F: FilesFacade = OsFiles> {
    reader: &'a TableReader<F>,
    column_base: usize,
    record_index: i64,
}

impl<'a, F: FilesFacade> Record<'a, F> {
    pub(crate) fn new(reader: &'a TableReader<F>, column_base: usize, record_index: i64) -> Self {
        Self {
            reader,
            column_base,
            record_index,
        }
    }

    /// Data region and byte offset for a fixed-width column, or `None` when
    /// the row reads as null. Column files begin at the column top, so the
    /// stored row index is shifted down by it.
    fn fixed_offset(&self, column: usize, size: u64) -> Option<(&'a MappedRegion, u64)> {
        let top = self.reader.column_top(self.column_base, column);
        if self.record_index < top {
            return None;
        }
        let mem = self.reader.primary_column(self.column_base, column)?;
        Some((mem, (self.record_index - top) as u64 * size))
    }

    /// Data region and payload offset for a variable-length column.
    fn var_offset(&self, column: usize) -> Option<(&'a MappedRegion, u64)> {
        let top = self.reader.column_top(self.column_base, column);
        if self.record_index < top {
            return None;
        }
        let data = self.reader.primary_column(self.column_base, column)?;
        let index = self.reader.secondary_column(self.column_base, column)?;
        let offset = index.get_long((self.record_index - top) as u64 * 8);
        Some((data, offset as u64))
    }

    pub fn get_bool(&self, column: usize) -> bool {
        match self.fixed_offset(column, 1) {
            Some((mem, offset)) => mem.get_bool(offset),
            None => nulls::BOOL_NULL,
        }
    }

    pub fn get_byte(&self, column: usize) -> i8 {
        match self.fixed_offset(column, 1) {
            Some((mem, offset)) => mem.get_byte(offset),
            None => nulls::BYTE_NULL,
        }
    }

    pub fn get_short(&self, column: usize) -> i16 {
        match self.fixed_offset(column, 2) {
            Some((mem, offset)) => mem.get_short(offset),
            None => nulls::SHORT_NULL,
        }
    }

    pub fn get_int(&self, column: usize) -> i32 {
        match self.fixed_offset(column, 4) {
            Some((mem, offset)) => mem.get_int(offset),
            None => nulls::INT_NULL,
        }
    }

    pub fn get_long(&self, column: usize) -> i64 {
        match self.fixed_offset(column, 8) {
            Some((mem, offset)) => mem.get_long(offset),
            None => nulls::LONG_NULL,
        }
    }

    pub fn get_float(&self, column: usize) -> f32 {
        match self.fixed_offset(column, 4) {
            Some((mem, offset)) => mem.get_float(offset),
            None => nulls::FLOAT_NULL,
        }
    }

    pub fn get_double(&self, column: usize) -> f64 {
        match self.fixed_offset(column, 8) {
            Some((mem, offset)) => mem.get_double(offset),
            None => nulls::DOUBLE_NULL,
        }
    }

    pub fn get_date(&self, column: usize) -> i64 {
        self.get_long(column)
    }

    pub fn get_timestamp(&self, column: usize) -> i64 {
        self.get_long(column)
    }

    pub fn get_str(&self, column: usize) -> Option<StrView<'a>> {
        let (data, offset) = self.var_offset(column)?;
        data.get_str(offset)
    }

    /// Second string accessor. Views borrow the mapping and are independent
    /// by construction, so this is the same read; the name survives for
    /// callers comparing two strings from one column.
    pub fn get_str_b(&self, column: usize) -> Option<StrView<'a>> {
        self.get_str(column)
    }

    /// Char count of the string at `column`, reading only the length prefix;
    /// -1 for null.
    pub fn get_str_len(&self, column: usize) -> i32 {
        match self.var_offset(column) {
            Some((data, offset)) => data.get_int(offset),
            None => nulls::NULL_LEN,
        }
    }

    pub fn get_bin(&self, column: usize) -> Option<&'a [u8]> {
        let (data, offset) = self.var_offset(column)?;
        data.get_bin(offset)
    }

    /// Byte length of the binary at `column`, reading only the length prefix;
    /// -1 for null.
    pub fn get_bin_len(&self, column: usize) -> i32 {
        match self.var_offset(column) {
            Some((data, offset)) => data.get_int(offset),
            None => nulls::NULL_LEN,
        }
    }

    /// Symbol dictionaries are not materialized by this reader; the accessor
    /// exists for API completeness and always reports null.
    pub fn get_sym(&self, _column: usize) -> Option<StrView<'a>> {
        None
    }

    pub fn row_id(&self) -> u64 {
        rows::row_id(
            (self.column_base >> self.reader.column_count_bits()) as u64,
            self.record_index as u64,
        )
    }
}
