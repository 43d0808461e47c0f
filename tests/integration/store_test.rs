use bwatch::core::export::{write_csv, CSV_HEADER};
use bwatch::core::pressure::DerivedSample;
use bwatch::core::sampling::{RawSample, SampleTime};
use bwatch::core::store::{Store, StoreReader};
use std::time::Duration;
use tempfile::TempDir;

const DAY: f64 = 86_400.0;

fn derived(wall: f64, pressure: f64) -> DerivedSample {
    DerivedSample {
        raw: RawSample {
            page_faults_per_sec: Some(3.0),
            available_ram_percent: Some(50.0),
            committed_ratio: Some(0.5),
            ..RawSample::at(SampleTime {
                wall,
                monotonic: 10.0,
            })
        },
        pressure_raw: pressure,
        pressure_smoothed: pressure,
    }
}

#[test]
fn test_retention_scenario() {
    let temp_dir = TempDir::new().unwrap();
    let mut store = Store::open(&temp_dir.path().join("history.db")).unwrap();

    let now = 1_750_000_000.0;
    for age in [1.0, 10.0, 29.0, 30.0, 31.0, 100.0] {
        store.append(&derived(now - age * DAY, 10.0)).unwrap();
    }

    assert_eq!(store.prune_before(now - 30.0 * DAY).unwrap(), 2);
    assert_eq!(store.count().unwrap(), 4);

    let oldest = store.query(0.0, f64::MAX).next().unwrap().unwrap();
    assert_eq!(oldest.sample.raw.timestamp.wall, now - 30.0 * DAY);
}

#[test]
fn test_query_last_only_returns_recent() {
    let mut store = Store::open_in_memory().unwrap();
    let now = SampleTime::now().wall;
    store.append(&derived(now - 7200.0, 1.0)).unwrap();
    store.append(&derived(now - 60.0, 2.0)).unwrap();

    let recent: Vec<_> = store
        .query_last(Duration::from_secs(3600))
        .map(|r| r.unwrap().sample.pressure_raw)
        .collect();
    assert_eq!(recent, vec![2.0]);
}

#[test]
fn test_large_range_streams_in_order() {
    let mut store = Store::open_in_memory().unwrap();
    for i in 0..2_000 {
        store.append(&derived(i as f64, (i % 100) as f64)).unwrap();
    }

    let mut previous = f64::MIN;
    let mut seen = 0;
    for record in store.query(0.0, 1_999.0) {
        let wall = record.unwrap().sample.raw.timestamp.wall;
        assert!(wall >= previous);
        previous = wall;
        seen += 1;
    }
    assert_eq!(seen, 2_000);
}

#[test]
fn test_reader_queries_while_writer_appends() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    let mut store = Store::open(&path).unwrap();
    for i in 0..10 {
        store.append(&derived(i as f64, 5.0)).unwrap();
    }

    let reader = StoreReader::open(&path).unwrap();
    let mut cursor = reader.query(0.0, 100.0).with_page_size(4);
    let head: Vec<_> = cursor.by_ref().take(4).map(|r| r.unwrap().id).collect();

    for i in 10..15 {
        store.append(&derived(i as f64, 5.0)).unwrap();
    }

    let rest = cursor.count();
    assert_eq!(head.len() + rest, 15);
}

#[test]
fn test_reader_on_other_thread() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    let mut store = Store::open(&path).unwrap();
    store.append(&derived(1.0, 1.0)).unwrap();

    let reader_path = path.clone();
    let count = std::thread::spawn(move || StoreReader::open(&reader_path).unwrap().count().unwrap())
        .join()
        .unwrap();
    assert_eq!(count, 1);

    store.append(&derived(2.0, 1.0)).unwrap();
    assert_eq!(store.count().unwrap(), 2);
}

#[test]
fn test_clear_all_empties_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    let mut store = Store::open(&path).unwrap();
    for i in 0..100 {
        store.append(&derived(i as f64, 1.0)).unwrap();
    }

    assert_eq!(store.clear_all().unwrap(), 100);
    assert_eq!(store.count().unwrap(), 0);
    assert_eq!(store.query(f64::MIN, f64::MAX).count(), 0);
}

#[test]
fn test_export_from_store() {
    let mut store = Store::open_in_memory().unwrap();
    store.append(&derived(1.0, 12.5)).unwrap();
    let mut partial = derived(2.0, 20.0);
    partial.raw.committed_ratio = None;
    store.append(&partial).unwrap();

    let mut out = Vec::new();
    let rows = write_csv(&mut out, store.query(0.0, 10.0)).unwrap();
    assert_eq!(rows, 2);

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], CSV_HEADER);
    // committed_ratio is the ninth column
    assert_eq!(lines[1].split(',').nth(8), Some("0.5"));
    assert_eq!(lines[2].split(',').nth(8), Some(""));
}
