//! # Partition Calendar Arithmetic
//!
//! A table is partitioned by day, month or year (or not at all). Each
//! partition is a directory whose name is the partition-start instant
//! formatted for the scheme: `YYYY-MM-DD`, `YYYY-MM`, `YYYY`, or the literal
//! `default` for non-partitioned tables.
//!
//! [`PartitionBy`] binds the four scheme-dependent operations once per
//! reader: flooring a timestamp to the partition boundary, advancing a
//! boundary by N partitions, counting partitions between two instants, and
//! formatting/parsing directory names. Dispatch happens per partition open,
//! never per row.
//!
//! All timestamps are milliseconds since the Unix epoch, UTC.

use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use eyre::{bail, eyre, Result};

use crate::layout::DEFAULT_PARTITION_NAME;

pub const DAY_MILLIS: i64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionBy {
    Day,
    Month,
    Year,
    None,
}

impl PartitionBy {
    pub fn from_code(code: u32) -> Result<Self> {
        Ok(match code {
            0 => PartitionBy::Day,
            1 => PartitionBy::Month,
            2 => PartitionBy::Year,
            3 => PartitionBy::None,
            _ => bail!("unsupported partition scheme code {code}"),
        })
    }

    pub fn code(self) -> u32 {
        match self {
            PartitionBy::Day => 0,
            PartitionBy::Month => 1,
            PartitionBy::Year => 2,
            PartitionBy::None => 3,
        }
    }

    pub fn is_partitioned(self) -> bool {
        !matches!(self, PartitionBy::None)
    }

    /// Greatest instant `<= t` aligned to the partition boundary.
    pub fn floor(self, t: i64) -> Result<i64> {
        match self {
            PartitionBy::Day => Ok(t - t.rem_euclid(DAY_MILLIS)),
            PartitionBy::Month => {
                let d = date_of(t)?.date();
                to_millis(ymd(d.year(), d.month(), 1)?)
            }
            PartitionBy::Year => {
                let d = date_of(t)?.date();
                to_millis(ymd(d.year(), 1, 1)?)
            }
            PartitionBy::None => {
                bail!("cannot get partition floor for non-partitioned table")
            }
        }
    }

    /// `base` advanced by `n` partitions; `n` may be negative.
    pub fn add(self, base: i64, n: i64) -> Result<i64> {
        match self {
            PartitionBy::Day => Ok(base + n * DAY_MILLIS),
            PartitionBy::Month => add_months(base, n),
            PartitionBy::Year => add_months(base, n * 12),
            PartitionBy::None => {
                bail!("cannot add partition intervals for non-partitioned table")
            }
        }
    }

    /// Count of complete partition units from `floor(a)` to `floor(b)`.
    /// Callers guarantee `a <= b`; non-partitioned tables span 0 units.
    pub fn between(self, a: i64, b: i64) -> Result<i64> {
        match self {
            PartitionBy::Day => Ok((self.floor(b)? - self.floor(a)?) / DAY_MILLIS),
            PartitionBy::Month => {
                let da = date_of(a)?.date();
                let db = date_of(b)?.date();
                Ok((i64::from(db.year()) - i64::from(da.year())) * 12
                    + i64::from(db.month() as i32 - da.month() as i32))
            }
            PartitionBy::Year => {
                let da = date_of(a)?.date();
                let db = date_of(b)?.date();
                Ok(i64::from(db.year()) - i64::from(da.year()))
            }
            PartitionBy::None => Ok(0),
        }
    }

    /// Directory name of the partition `index` steps after `base`.
    pub fn dir_name(self, base: i64, index: usize) -> Result<String> {
        if let PartitionBy::None = self {
            return Ok(DEFAULT_PARTITION_NAME.to_string());
        }
        self.format(self.add(base, index as i64)?)
    }

    pub fn format(self, t: i64) -> Result<String> {
        let d = date_of(t)?.date();
        Ok(match self {
            PartitionBy::Day => d.format("%Y-%m-%d").to_string(),
            PartitionBy::Month => d.format("%Y-%m").to_string(),
            PartitionBy::Year => d.format("%Y").to_string(),
            PartitionBy::None => DEFAULT_PARTITION_NAME.to_string(),
        })
    }

    /// Parses a partition directory name back to its start instant. Fails on
    /// anything that is not an exact rendition of the scheme's format; the
    /// partition scan swallows these failures to skip unrelated directories.
    pub fn parse(self, name: &str) -> Result<i64> {
        let invalid = || eyre!("invalid partition directory name '{name}'");
        if !name.is_ascii() {
            return Err(invalid());
        }
        let date = match self {
            PartitionBy::Day => {
                if name.len() != 10 || &name[4..5] != "-" || &name[7..8] != "-" {
                    return Err(invalid());
                }
                let y = digits(&name[..4]).ok_or_else(invalid)?;
                let m = digits(&name[5..7]).ok_or_else(invalid)?;
                let d = digits(&name[8..10]).ok_or_else(invalid)?;
                NaiveDate::from_ymd_opt(y, m as u32, d as u32).ok_or_else(invalid)?
            }
            PartitionBy::Month => {
                if name.len() != 7 || &name[4..5] != "-" {
                    return Err(invalid());
                }
                let y = digits(&name[..4]).ok_or_else(invalid)?;
                let m = digits(&name[5..7]).ok_or_else(invalid)?;
                NaiveDate::from_ymd_opt(y, m as u32, 1).ok_or_else(invalid)?
            }
            PartitionBy::Year => {
                if name.len() != 4 {
                    return Err(invalid());
                }
                let y = digits(name).ok_or_else(invalid)?;
                NaiveDate::from_ymd_opt(y, 1, 1).ok_or_else(invalid)?
            }
            PartitionBy::None => {
                bail!("non-partitioned tables have no partition directories")
            }
        };
        to_millis(date)
    }
}

fn date_of(t: i64) -> Result<NaiveDateTime> {
    DateTime::<Utc>::from_timestamp_millis(t)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| eyre!("timestamp {t} out of range"))
}

fn ymd(y: i32, m: u32, d: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| eyre!("date {y:04}-{m:02}-{d:02} out of range"))
}

fn to_millis(date: NaiveDate) -> Result<i64> {
    Ok(NaiveDateTime::new(date, NaiveTime::MIN)
        .and_utc()
        .timestamp_millis())
}

fn add_months(t: i64, n: i64) -> Result<i64> {
    let dt = date_of(t)?;
    let shifted = if n >= 0 {
        dt.date().checked_add_months(Months::new(n as u32))
    } else {
        dt.date().checked_sub_months(Months::new(n.unsigned_abs() as u32))
    }
    .ok_or_else(|| eyre!("month arithmetic out of range: {t} + {n} months"))?;
    Ok(NaiveDateTime::new(shifted, dt.time())
        .and_utc()
        .timestamp_millis())
}

fn digits(s: &str) -> Option<i32> {
    if s.bytes().all(|b| b.is_ascii_digit()) {
        s.parse().ok()
    } else {
        None
    }
}
