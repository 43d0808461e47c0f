use bwatch::core::store::{schema, Store, StoreReader, CURRENT_VERSION};
use bwatch::BwError;
use rusqlite::{params, Connection};
use std::path::Path;
use tempfile::TempDir;

const V1_SCHEMA: &str = "
    CREATE TABLE samples (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp REAL NOT NULL,
        pressure_smoothed REAL NOT NULL,
        pressure_raw REAL NOT NULL,
        page_faults REAL NOT NULL,
        available_ram_bytes INTEGER NOT NULL,
        available_ram_percent REAL NOT NULL,
        committed_bytes INTEGER NOT NULL,
        committed_ratio REAL NOT NULL
    );
    CREATE INDEX idx_samples_timestamp ON samples(timestamp);";

fn write_v1_store(path: &Path, with_meta: bool) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(V1_SCHEMA).unwrap();
    if with_meta {
        conn.execute_batch(
            "CREATE TABLE meta (key TEXT PRIMARY KEY, value TEXT NOT NULL);
             INSERT INTO meta (key, value) VALUES ('schema_version', '1');",
        )
        .unwrap();
    }
    for (i, ratio_percent) in [85.0, 42.5, 100.0].into_iter().enumerate() {
        conn.execute(
            "INSERT INTO samples (timestamp, pressure_smoothed, pressure_raw, page_faults,
                available_ram_bytes, available_ram_percent, committed_bytes, committed_ratio)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                1_700_000_000.0 + i as f64 * 5.0,
                40.0,
                45.0,
                12.0,
                2_147_483_648i64,
                25.0,
                8_589_934_592i64,
                ratio_percent
            ],
        )
        .unwrap();
    }
}

#[test]
fn test_v1_store_migrates_without_losing_rows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    write_v1_store(&path, true);

    let store = Store::open(&path).unwrap();
    assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);

    let records = store.query(0.0, f64::MAX).collect_all().unwrap();
    assert_eq!(records.len(), 3);

    let first = &records[0].sample;
    assert_eq!(first.raw.committed_ratio, Some(0.85));
    assert_eq!(first.raw.available_ram_bytes, Some(2_147_483_648));
    assert_eq!(first.raw.page_faults_per_sec, Some(12.0));
    assert_eq!(first.raw.disk_read_bytes_per_sec, None);
    assert_eq!(first.raw.page_io_bytes_per_sec, None);
    assert_eq!(first.raw.timestamp.monotonic, first.raw.timestamp.wall);
    assert_eq!(first.pressure_smoothed, 40.0);
    assert_eq!(records[2].sample.raw.committed_ratio, Some(1.0));
}

#[test]
fn test_store_without_version_marker_is_treated_as_v1() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    write_v1_store(&path, false);

    let store = Store::open(&path).unwrap();
    let records = store.query(0.0, f64::MAX).collect_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[1].sample.raw.committed_ratio, Some(0.425));
}

#[test]
fn test_v2_disk_columns_survive() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    write_v1_store(&path, true);
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch(
            "ALTER TABLE samples ADD COLUMN page_io_bytes_per_sec REAL;
             ALTER TABLE samples ADD COLUMN disk_read_bytes_per_sec REAL;
             ALTER TABLE samples ADD COLUMN disk_write_bytes_per_sec REAL;
             ALTER TABLE samples ADD COLUMN disk_percent_busy REAL;
             UPDATE samples SET disk_read_bytes_per_sec = 1024.0, disk_percent_busy = 7.5;
             UPDATE meta SET value = '2' WHERE key = 'schema_version';",
        )
        .unwrap();
    }

    let store = Store::open(&path).unwrap();
    let latest = store.latest().unwrap().unwrap();
    assert_eq!(latest.sample.raw.disk_read_bytes_per_sec, Some(1024.0));
    assert_eq!(latest.sample.raw.disk_percent_busy, Some(7.5));
    assert_eq!(latest.sample.raw.disk_write_bytes_per_sec, None);
    assert_eq!(latest.sample.raw.committed_ratio, Some(1.0));
}

#[test]
fn test_reopening_migrated_store_is_noop() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    write_v1_store(&path, true);

    drop(Store::open(&path).unwrap());
    let store = Store::open(&path).unwrap();

    let records = store.query(0.0, f64::MAX).collect_all().unwrap();
    assert_eq!(records.len(), 3);
    // Converted exactly once
    assert_eq!(records[0].sample.raw.committed_ratio, Some(0.85));
}

#[test]
fn test_reapplying_steps_on_migrated_store_changes_nothing() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    write_v1_store(&path, true);
    drop(Store::open(&path).unwrap());

    let conn = Connection::open(&path).unwrap();
    for migration in schema::MIGRATIONS {
        (migration.apply)(&conn).unwrap();
    }
    drop(conn);

    let store = Store::open(&path).unwrap();
    let records = store.query(0.0, f64::MAX).collect_all().unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].sample.raw.committed_ratio, Some(0.85));
}

#[test]
fn test_newer_schema_is_refused() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    drop(Store::open(&path).unwrap());
    {
        let conn = Connection::open(&path).unwrap();
        conn.execute(
            "UPDATE meta SET value = ?1 WHERE key = 'schema_version'",
            params![(CURRENT_VERSION + 1).to_string()],
        )
        .unwrap();
    }

    assert!(matches!(
        Store::open(&path),
        Err(BwError::IncompatibleSchema { .. })
    ));
    assert!(matches!(
        StoreReader::open(&path),
        Err(BwError::IncompatibleSchema { .. })
    ));
}

#[test]
fn test_reader_refuses_unmigrated_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    write_v1_store(&path, true);

    assert!(matches!(StoreReader::open(&path), Err(BwError::Store(_))));
}
