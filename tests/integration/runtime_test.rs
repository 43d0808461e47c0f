use bwatch::core::config::Config;
use bwatch::core::monitor::{CollectionRuntime, MonitorSnapshot};
use bwatch::core::sampling::{MetricSource, RawSample, SampleTime};
use bwatch::core::store::StoreReader;
use bwatch::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

struct Constant;

impl MetricSource for Constant {
    fn sample(&mut self) -> Result<RawSample> {
        Ok(RawSample {
            page_faults_per_sec: Some(5.0),
            available_ram_percent: Some(70.0),
            committed_ratio: Some(0.3),
            ..RawSample::at(SampleTime::now())
        })
    }
}

fn fast_config() -> Config {
    Config {
        sampling_frequency_seconds: 1,
        ..Default::default()
    }
}

fn wait_for(runtime: &CollectionRuntime, predicate: impl Fn(&MonitorSnapshot) -> bool) -> Arc<MonitorSnapshot> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let snapshot = runtime.snapshot();
        if predicate(&snapshot) || Instant::now() > deadline {
            return snapshot;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn test_runtime_collects_and_persists() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");

    let runtime = CollectionRuntime::start(fast_config(), Box::new(Constant), Some(path.clone())).unwrap();
    let snapshot = wait_for(&runtime, |s| s.samples_collected >= 2);
    assert!(snapshot.samples_collected >= 2);
    assert!(snapshot.latest.is_some());
    assert!(snapshot.health.persistence.is_ok());

    runtime.shutdown();

    let reader = StoreReader::open(&path).unwrap();
    assert!(reader.count().unwrap() >= 2);
}

#[test]
fn test_runtime_rejects_invalid_reconfiguration() {
    let runtime = CollectionRuntime::start(fast_config(), Box::new(Constant), None).unwrap();

    let mut invalid = fast_config();
    invalid.metric_weights.page_faults = 0.8;
    assert!(runtime.reconfigure(invalid).is_err());

    let mut valid = fast_config();
    valid.thresholds.yellow = 50.0;
    assert!(runtime.reconfigure(valid).is_ok());

    let snapshot = wait_for(&runtime, |s| s.samples_collected >= 1);
    assert!(snapshot.samples_collected >= 1);
    assert!(runtime.is_running());
}

#[test]
fn test_runtime_samples_without_usable_store() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");
    std::fs::write(&path, vec![0x42u8; 4096]).unwrap();

    let runtime = CollectionRuntime::start(fast_config(), Box::new(Constant), Some(path)).unwrap();
    let snapshot = wait_for(&runtime, |s| s.samples_collected >= 1);

    assert!(snapshot.samples_collected >= 1);
    assert!(snapshot.health.persistence.is_failed());
}

#[test]
fn test_invalid_config_fails_before_start() {
    let mut config = fast_config();
    config.sampling_frequency_seconds = 0;
    assert!(CollectionRuntime::start(config, Box::new(Constant), None).is_err());
}
