//! # Column Types, Null Sentinels and Row Identifiers
//!
//! Column types are stable per column and drawn from a fixed set. Fixed-width
//! types read directly from the column data file; variable-length types
//! (string, binary) use a two-file layout where the index file holds one u64
//! payload offset per row.
//!
//! | Type | Size (bytes) | Storage |
//! |-----------|--------------|------------------------------------|
//! | boolean   | 1            | one byte per row                   |
//! | byte      | 1            | |
//! | short     | 2            | |
//! | int       | 4            | |
//! | long      | 8            | |
//! | float     | 4            | |
//! | double    | 8            | |
//! | date      | 8            | epoch millis                       |
//! | timestamp | 8            | epoch millis                       |
//! | symbol    | 4            | dictionary id; dictionary not read |
//! | string    | variable     | i32 char count + UTF-16LE units    |
//! | binary    | variable     | i32 byte length + bytes            |
//!
//! A row identifier packs the partition index into the high 32 bits and the
//! local row index into the low 32 bits.

use eyre::{bail, Result};

#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Boolean = 0,
    Byte = 1,
    Short = 2,
    Int = 3,
    Long = 4,
    Float = 5,
    Double = 6,
    Date = 7,
    Timestamp = 8,
    Symbol = 9,
    String = 10,
    Binary = 11,
}

impl ColumnType {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => ColumnType::Boolean,
            1 => ColumnType::Byte,
            2 => ColumnType::Short,
            3 => ColumnType::Int,
            4 => ColumnType::Long,
            5 => ColumnType::Float,
            6 => ColumnType::Double,
            7 => ColumnType::Date,
            8 => ColumnType::Timestamp,
            9 => ColumnType::Symbol,
            10 => ColumnType::String,
            11 => ColumnType::Binary,
            _ => bail!("unknown column type code {code}"),
        })
    }

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn fixed_size(self) -> Option<usize> {
        match self {
            ColumnType::Boolean | ColumnType::Byte => Some(1),
            ColumnType::Short => Some(2),
            ColumnType::Int | ColumnType::Float | ColumnType::Symbol => Some(4),
            ColumnType::Long
            | ColumnType::Double
            | ColumnType::Date
            | ColumnType::Timestamp => Some(8),
            ColumnType::String | ColumnType::Binary => None,
        }
    }

    pub fn is_variable(self) -> bool {
        self.fixed_size().is_none()
    }
}

/// Values returned for rows a column has no data for: rows below the column
/// top, every row of a partition where the column file is absent, and symbol
/// columns (whose dictionary this crate does not read).
pub mod nulls {
    pub const INT_NULL: i32 = i32::MIN;
    pub const LONG_NULL: i64 = i64::MIN;
    pub const FLOAT_NULL: f32 = f32::NAN;
    pub const DOUBLE_NULL: f64 = f64::NAN;
    pub const SHORT_NULL: i16 = 0;
    pub const BYTE_NULL: i8 = 0;
    pub const BOOL_NULL: bool = false;
    /// Length reported for a null string or binary value.
    pub const NULL_LEN: i32 = -1;
}

/// Composite row identifier packing and unpacking.
pub mod rows {
    pub fn row_id(partition_index: u64, local_row: u64) -> u64 {
        (partition_index << 32) | (local_row & 0xFFFF_FFFF)
    }

    pub fn partition_index(row_id: u64) -> usize {
        (row_id >> 32) as usize
    }

    pub fn local_row(row_id: u64) -> i64 {
        (row_id & 0xFFFF_FFFF) as i64
    }
}
