//! # Reader Smoke Test
//!
//! This test file is the source of truth for reader correctness against
//! writer-produced tables. It plays the writer, laying out `_meta`, `_txi`,
//! partition directories and column files bit-exactly, then drives the
//! reader through:
//!
//! - Construction: empty tables, pending recovery, missing control files
//! - Forward iteration and random access by row id
//! - Partitioned and non-partitioned scans, missing partition directories
//! - Null semantics: column tops, missing column files, null strings
//! - Reload: live-partition growth, new partitions, first-partition discovery
//!
//! If any test fails after making changes, it indicates a regression.
//! Do NOT modify expected values to make tests pass - fix the underlying issue.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tickdb::{nulls, rows, ColumnType, PartitionBy, TableReader};

fn new_table() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let table = dir.path().join("trades");
    fs::create_dir_all(&table).unwrap();
    (dir, table)
}

fn write_meta(table: &Path, partition_by: PartitionBy, ts_index: i32, cols: &[(&str, ColumnType)]) {
    let mut buf = Vec::new();
    buf.extend((cols.len() as u32).to_le_bytes());
    buf.extend(partition_by.code().to_le_bytes());
    buf.extend(ts_index.to_le_bytes());
    for (_, t) in cols {
        buf.extend(t.code().to_le_bytes());
    }
    for (name, _) in cols {
        buf.extend((name.encode_utf16().count() as i32).to_le_bytes());
        for u in name.encode_utf16() {
            buf.extend(u.to_le_bytes());
        }
    }
    fs::write(table.join("_meta"), buf).unwrap();
}

fn write_txi(table: &Path, txn: i64, transient: i64, fixed: i64, max_ts: i64) {
    let mut buf = Vec::with_capacity(32);
    buf.extend(txn.to_le_bytes());
    buf.extend(transient.to_le_bytes());
    buf.extend(fixed.to_le_bytes());
    buf.extend(max_ts.to_le_bytes());
    fs::write(table.join("_txi"), buf).unwrap();
}

fn partition(table: &Path, name: &str) -> PathBuf {
    let dir = table.join(name);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_archive(dir: &Path, row_count: i64) {
    fs::write(dir.join("_archive"), row_count.to_le_bytes()).unwrap();
}

fn write_top(dir: &Path, col: &str, top: i64) {
    fs::write(dir.join(format!("{col}.top")), top.to_le_bytes()).unwrap();
}

fn write_ints(dir: &Path, col: &str, values: &[i32]) {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend(v.to_le_bytes());
    }
    fs::write(dir.join(format!("{col}.d")), buf).unwrap();
}

fn write_longs(dir: &Path, col: &str, values: &[i64]) {
    let mut buf = Vec::with_capacity(values.len() * 8);
    for v in values {
        buf.extend(v.to_le_bytes());
    }
    fs::write(dir.join(format!("{col}.d")), buf).unwrap();
}

fn append_int(dir: &Path, col: &str, value: i32) {
    let mut f = fs::OpenOptions::new()
        .append(true)
        .open(dir.join(format!("{col}.d")))
        .unwrap();
    f.write_all(&value.to_le_bytes()).unwrap();
    f.sync_all().unwrap();
}

fn write_strs(dir: &Path, col: &str, values: &[Option<&str>]) {
    let mut data = Vec::new();
    let mut index = Vec::new();
    for v in values {
        index.extend((data.len() as u64).to_le_bytes());
        match v {
            Some(s) => {
                data.extend((s.encode_utf16().count() as i32).to_le_bytes());
                for u in s.encode_utf16() {
                    data.extend(u.to_le_bytes());
                }
            }
            None => data.extend((-1i32).to_le_bytes()),
        }
    }
    fs::write(dir.join(format!("{col}.d")), data).unwrap();
    fs::write(dir.join(format!("{col}.i")), index).unwrap();
}

fn write_bins(dir: &Path, col: &str, values: &[Option<&[u8]>]) {
    let mut data = Vec::new();
    let mut index = Vec::new();
    for v in values {
        index.extend((data.len() as u64).to_le_bytes());
        match v {
            Some(b) => {
                data.extend((b.len() as i32).to_le_bytes());
                data.extend(*b);
            }
            None => data.extend((-1i32).to_le_bytes()),
        }
    }
    fs::write(dir.join(format!("{col}.d")), data).unwrap();
    fs::write(dir.join(format!("{col}.i")), index).unwrap();
}

fn day(name: &str) -> i64 {
    PartitionBy::Day.parse(name).unwrap()
}

fn collect_ints(reader: &mut TableReader, col: usize) -> Vec<i32> {
    let mut out = Vec::new();
    while reader.has_next().unwrap() {
        out.push(reader.next_record().get_int(col));
    }
    out
}

/// The S3 layout: day partitions 2020-01-01 (closed, rows 10/20) and
/// 2020-01-02 (live, row 30).
fn two_day_table() -> (TempDir, PathBuf) {
    let (dir, table) = new_table();
    write_meta(&table, PartitionBy::Day, -1, &[("v", ColumnType::Int)]);
    let p0 = partition(&table, "2020-01-01");
    write_ints(&p0, "v", &[10, 20]);
    write_archive(&p0, 2);
    let p1 = partition(&table, "2020-01-02");
    write_ints(&p1, "v", &[30]);
    write_txi(&table, 5, 1, 2, day("2020-01-02"));
    (dir, table)
}

mod construction_tests {
    use super::*;

    #[test]
    fn empty_table_has_no_partitions() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Day, 0, &[("ts", ColumnType::Long)]);
        write_txi(&table, 0, 0, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(reader.size(), 0);
        assert_eq!(reader.partition_count(), 0);
        assert!(!reader.has_next().unwrap());
    }

    #[test]
    fn pending_recovery_is_refused() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Day, -1, &[("v", ColumnType::Int)]);
        write_txi(&table, 0, 0, 0, 0);
        fs::write(table.join("_todo"), []).unwrap();

        let err = TableReader::open_default(table.parent().unwrap(), "trades").unwrap_err();
        assert!(err.to_string().contains("pending recovery"));
    }

    #[test]
    fn missing_transaction_file_is_refused() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Day, -1, &[("v", ColumnType::Int)]);

        let err = TableReader::open_default(table.parent().unwrap(), "trades").unwrap_err();
        assert!(err.to_string().contains("transaction file does not exist"));
    }

    #[test]
    fn missing_metadata_file_is_refused() {
        let (_dir, table) = new_table();
        write_txi(&table, 0, 0, 0, 0);

        let err = TableReader::open_default(table.parent().unwrap(), "trades").unwrap_err();
        assert!(err.to_string().contains("metadata file does not exist"));
    }

    #[test]
    fn metadata_is_published() {
        let (_dir, table) = new_table();
        write_meta(
            &table,
            PartitionBy::Day,
            1,
            &[("price", ColumnType::Double), ("ts", ColumnType::Timestamp)],
        );
        write_txi(&table, 0, 0, 0, 0);

        let reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        let meta = reader.metadata();
        assert_eq!(meta.column_count(), 2);
        assert_eq!(meta.column_index("PRICE"), Some(0));
        assert_eq!(meta.column_type(1), ColumnType::Timestamp);
        assert_eq!(meta.timestamp_index(), 1);
        assert_eq!(meta.partition_by(), PartitionBy::Day);
    }
}

mod scan_tests {
    use super::*;

    #[test]
    fn non_partitioned_scan_and_random_access() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::None, -1, &[("v", ColumnType::Int)]);
        let p = partition(&table, "default");
        write_ints(&p, "v", &[1, 2, 3]);
        write_archive(&p, 3);
        write_txi(&table, 1, 3, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(reader.partition_count(), 1);
        assert_eq!(collect_ints(&mut reader, 0), vec![1, 2, 3]);
        assert_eq!(reader.size(), 3);
        assert_eq!(reader.record_at(rows::row_id(0, 2)).get_int(0), 3);

        reader.to_top();
        assert_eq!(collect_ints(&mut reader, 0), vec![1, 2, 3]);
    }

    #[test]
    fn day_partitions_scan_in_order() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();

        assert_eq!(reader.partition_count(), 2);
        assert_eq!(reader.size(), 3);
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30]);
    }

    #[test]
    fn iteration_and_record_at_agree() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();

        let mut seen = Vec::new();
        while reader.has_next().unwrap() {
            let record = reader.next_record();
            seen.push((record.row_id(), record.get_int(0)));
        }
        assert_eq!(
            seen.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![rows::row_id(0, 0), rows::row_id(0, 1), rows::row_id(1, 0)]
        );
        for (id, value) in seen {
            assert_eq!(reader.record_at(id).get_int(0), value);
        }
    }

    #[test]
    fn missing_partition_dir_is_a_zero_row_partition() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Day, -1, &[("v", ColumnType::Int)]);
        let p0 = partition(&table, "2020-01-01");
        write_ints(&p0, "v", &[1]);
        write_archive(&p0, 1);
        // 2020-01-02 never materialized on disk.
        let p2 = partition(&table, "2020-01-03");
        write_ints(&p2, "v", &[3]);
        write_txi(&table, 2, 1, 1, day("2020-01-03"));

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(reader.partition_count(), 3);
        assert_eq!(reader.size(), 2);
        assert_eq!(collect_ints(&mut reader, 0), vec![1, 3]);
    }

    #[test]
    fn unrelated_directories_are_skipped() {
        let (_dir, table) = two_day_table();
        fs::create_dir_all(table.join("scratch")).unwrap();
        fs::create_dir_all(table.join("1999-13-99x")).unwrap();

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(reader.partition_count(), 2);
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30]);
    }

    #[test]
    fn month_partitions_cross_year_boundary() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Month, -1, &[("v", ColumnType::Int)]);
        let p0 = partition(&table, "2019-12");
        write_ints(&p0, "v", &[1]);
        write_archive(&p0, 1);
        let p1 = partition(&table, "2020-01");
        write_ints(&p1, "v", &[2]);
        write_txi(&table, 3, 1, 1, PartitionBy::Month.parse("2020-01").unwrap());

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(reader.partition_count(), 2);
        assert_eq!(collect_ints(&mut reader, 0), vec![1, 2]);
    }

    #[test]
    fn designated_timestamps_are_non_decreasing() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Day, 0, &[("ts", ColumnType::Timestamp)]);
        let d0 = day("2020-01-01");
        let d1 = day("2020-01-02");
        let p0 = partition(&table, "2020-01-01");
        write_longs(&p0, "ts", &[d0, d0 + 3_600_000, d0 + 7_200_000]);
        write_archive(&p0, 3);
        let p1 = partition(&table, "2020-01-02");
        write_longs(&p1, "ts", &[d1, d1 + 60_000]);
        write_txi(&table, 4, 2, 3, d1 + 60_000);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        let ts_col = reader.metadata().timestamp_index() as usize;
        let mut last = i64::MIN;
        let mut count = 0;
        while reader.has_next().unwrap() {
            let ts = reader.next_record().get_timestamp(ts_col);
            assert!(ts >= last);
            last = ts;
            count += 1;
        }
        assert_eq!(count, 5);
    }

    #[test]
    fn fixed_width_accessors_decode_all_types() {
        let (_dir, table) = new_table();
        write_meta(
            &table,
            PartitionBy::None,
            -1,
            &[
                ("flag", ColumnType::Boolean),
                ("b", ColumnType::Byte),
                ("s", ColumnType::Short),
                ("f", ColumnType::Float),
                ("d", ColumnType::Double),
                ("dt", ColumnType::Date),
            ],
        );
        let p = partition(&table, "default");
        fs::write(p.join("flag.d"), [1u8, 0]).unwrap();
        fs::write(p.join("b.d"), [0x7Fu8, 0x80]).unwrap();
        let mut shorts = Vec::new();
        shorts.extend((-5i16).to_le_bytes());
        shorts.extend(300i16.to_le_bytes());
        fs::write(p.join("s.d"), shorts).unwrap();
        let mut floats = Vec::new();
        floats.extend(0.5f32.to_le_bytes());
        floats.extend((-2.0f32).to_le_bytes());
        fs::write(p.join("f.d"), floats).unwrap();
        let mut doubles = Vec::new();
        doubles.extend(1.25f64.to_le_bytes());
        doubles.extend(9.0f64.to_le_bytes());
        fs::write(p.join("d.d"), doubles).unwrap();
        let mut dates = Vec::new();
        dates.extend(day("2020-01-01").to_le_bytes());
        dates.extend(day("2020-06-01").to_le_bytes());
        fs::write(p.join("dt.d"), dates).unwrap();
        write_txi(&table, 1, 2, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert!(reader.has_next().unwrap());
        let row = reader.next_record();
        assert!(row.get_bool(0));
        assert_eq!(row.get_byte(1), 0x7F);
        assert_eq!(row.get_short(2), -5);
        assert_eq!(row.get_float(3), 0.5);
        assert_eq!(row.get_double(4), 1.25);
        assert_eq!(row.get_date(5), day("2020-01-01"));

        assert!(reader.has_next().unwrap());
        let row = reader.next_record();
        assert!(!row.get_bool(0));
        assert_eq!(row.get_byte(1), -128);
        assert_eq!(row.get_short(2), 300);
        assert!(!reader.has_next().unwrap());
    }
}

mod null_tests {
    use super::*;

    #[test]
    fn missing_column_files_read_as_null() {
        let (_dir, table) = new_table();
        write_meta(
            &table,
            PartitionBy::None,
            -1,
            &[
                ("a", ColumnType::Int),
                ("b", ColumnType::Long),
                ("s", ColumnType::String),
            ],
        );
        let p = partition(&table, "default");
        write_ints(&p, "a", &[1, 2]);
        // b.d and s.d/s.i never existed in this partition.
        write_txi(&table, 1, 2, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        while reader.has_next().unwrap() {
            let row = reader.next_record();
            assert_eq!(row.get_long(1), nulls::LONG_NULL);
            assert!(row.get_str(2).is_none());
            assert_eq!(row.get_str_len(2), nulls::NULL_LEN);
        }
    }

    #[test]
    fn column_top_prefix_reads_as_null() {
        let (_dir, table) = new_table();
        write_meta(
            &table,
            PartitionBy::None,
            -1,
            &[("a", ColumnType::Int), ("b", ColumnType::Int)],
        );
        let p = partition(&table, "default");
        write_ints(&p, "a", &[1, 2, 3, 4]);
        write_ints(&p, "b", &[7, 8]);
        write_top(&p, "b", 2);
        write_txi(&table, 1, 4, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        let mut b_values = Vec::new();
        while reader.has_next().unwrap() {
            b_values.push(reader.next_record().get_int(1));
        }
        assert_eq!(b_values, vec![nulls::INT_NULL, nulls::INT_NULL, 7, 8]);
    }

    #[test]
    fn strings_and_binaries_round_trip() {
        let (_dir, table) = new_table();
        write_meta(
            &table,
            PartitionBy::None,
            -1,
            &[("s", ColumnType::String), ("p", ColumnType::Binary)],
        );
        let p = partition(&table, "default");
        write_strs(&p, "s", &[Some("hello"), None, Some("")]);
        write_bins(&p, "p", &[Some(&[0xCA, 0xFE][..]), None, Some(&[][..])]);
        write_txi(&table, 1, 3, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();

        assert!(reader.has_next().unwrap());
        let row = reader.next_record();
        assert_eq!(row.get_str(0).unwrap().to_string(), "hello");
        assert_eq!(row.get_str_b(0).unwrap().to_string(), "hello");
        assert_eq!(row.get_str_len(0), 5);
        assert_eq!(row.get_bin(1).unwrap(), &[0xCA, 0xFE]);
        assert_eq!(row.get_bin_len(1), 2);

        assert!(reader.has_next().unwrap());
        let row = reader.next_record();
        assert!(row.get_str(0).is_none());
        assert_eq!(row.get_str_len(0), nulls::NULL_LEN);
        assert!(row.get_bin(1).is_none());
        assert_eq!(row.get_bin_len(1), nulls::NULL_LEN);

        assert!(reader.has_next().unwrap());
        let row = reader.next_record();
        assert_eq!(row.get_str_len(0), 0);
        assert!(row.get_str(0).unwrap().is_empty());
        assert_eq!(row.get_bin(1).unwrap(), &[] as &[u8]);
    }

    #[test]
    fn symbols_read_as_null() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::None, -1, &[("sym", ColumnType::Symbol)]);
        let p = partition(&table, "default");
        write_ints(&p, "sym", &[0, 1]);
        write_txi(&table, 1, 2, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        while reader.has_next().unwrap() {
            assert!(reader.next_record().get_sym(0).is_none());
        }
    }
}

mod reload_tests {
    use super::*;

    #[test]
    fn unchanged_snapshot_reloads_to_false() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert!(!reader.reload().unwrap());
        assert_eq!(reader.size(), 3);
    }

    #[test]
    fn reload_extends_live_partition() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30]);

        let before: Vec<i32> = (0..2)
            .map(|i| reader.record_at(rows::row_id(0, i)).get_int(0))
            .collect();

        append_int(&table.join("2020-01-02"), "v", 40);
        write_txi(&table, 6, 2, 2, day("2020-01-02"));
        assert!(reader.reload().unwrap());
        assert_eq!(reader.size(), 4);

        // The exhausted cursor does not see the tail until repositioned.
        assert!(!reader.has_next().unwrap());
        reader.to_top();
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30, 40]);

        // Rows visible before the reload read back bit-identical.
        for (i, v) in before.iter().enumerate() {
            assert_eq!(reader.record_at(rows::row_id(0, i as u64)).get_int(0), *v);
        }
    }

    #[test]
    fn unentered_partition_picks_up_reloaded_size() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();

        assert!(reader.has_next().unwrap());
        assert_eq!(reader.next_record().get_int(0), 10);

        append_int(&table.join("2020-01-02"), "v", 40);
        write_txi(&table, 6, 2, 2, day("2020-01-02"));
        assert!(reader.reload().unwrap());

        let mut rest = Vec::new();
        while reader.has_next().unwrap() {
            rest.push(reader.next_record().get_int(0));
        }
        assert_eq!(rest, vec![20, 30, 40]);
    }

    #[test]
    fn reload_discovers_new_partition() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30]);

        let p2 = partition(&table, "2020-01-03");
        write_ints(&p2, "v", &[50]);
        write_archive(&table.join("2020-01-02"), 1);
        write_txi(&table, 7, 1, 3, day("2020-01-03"));

        assert!(reader.reload().unwrap());
        assert_eq!(reader.partition_count(), 3);
        assert_eq!(reader.size(), 4);

        reader.to_top();
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30, 50]);
    }

    #[test]
    fn reload_discovers_first_partition_of_empty_table() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::Day, -1, &[("v", ColumnType::Int)]);
        write_txi(&table, 0, 0, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(reader.partition_count(), 0);
        assert!(!reader.has_next().unwrap());

        let p = partition(&table, "2020-03-01");
        write_ints(&p, "v", &[9]);
        write_txi(&table, 1, 1, 0, day("2020-03-01"));

        assert!(reader.reload().unwrap());
        assert_eq!(reader.partition_count(), 1);
        reader.to_top();
        assert_eq!(collect_ints(&mut reader, 0), vec![9]);
    }

    #[test]
    fn non_partitioned_reload_extends_default_partition() {
        let (_dir, table) = new_table();
        write_meta(&table, PartitionBy::None, -1, &[("v", ColumnType::Int)]);
        let p = partition(&table, "default");
        write_ints(&p, "v", &[1, 2, 3]);
        write_txi(&table, 1, 3, 0, 0);

        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(collect_ints(&mut reader, 0), vec![1, 2, 3]);

        append_int(&p, "v", 4);
        write_txi(&table, 2, 4, 0, 0);
        assert!(reader.reload().unwrap());
        assert!(!reader.reload().unwrap());

        reader.to_top();
        assert_eq!(collect_ints(&mut reader, 0), vec![1, 2, 3, 4]);
        assert_eq!(reader.size(), 4);
    }

    #[test]
    fn size_matches_iterated_rows_after_reloads() {
        let (_dir, table) = two_day_table();
        let mut reader = TableReader::open_default(table.parent().unwrap(), "trades").unwrap();
        assert_eq!(collect_ints(&mut reader, 0).len() as u64, reader.size());

        append_int(&table.join("2020-01-02"), "v", 40);
        write_txi(&table, 6, 2, 2, day("2020-01-02"));
        assert!(reader.reload().unwrap());

        let p2 = partition(&table, "2020-01-03");
        write_ints(&p2, "v", &[50]);
        write_archive(&table.join("2020-01-02"), 2);
        write_txi(&table, 7, 1, 4, day("2020-01-03"));
        assert!(reader.reload().unwrap());

        reader.to_top();
        assert_eq!(collect_ints(&mut reader, 0), vec![10, 20, 30, 40, 50]);
        assert_eq!(reader.size(), 5);
    }
}
