use bwatch::core::config::Config;
use bwatch::core::monitor::{CollectionCycle, ComponentHealth, MAX_CONSECUTIVE_FAILURES};
use bwatch::core::pressure::EventTransition;
use bwatch::core::sampling::{MetricSource, RawSample, SampleTime};
use bwatch::core::store::{Store, StoreReader};
use bwatch::{BwError, Result};
use tempfile::TempDir;

/// Replays a fixed load curve, advancing 5s per sample.
struct Replay {
    t: f64,
    pressure_inputs: Vec<(f64, f64, f64)>,
    next: usize,
}

impl Replay {
    fn new(pressure_inputs: Vec<(f64, f64, f64)>) -> Self {
        Self {
            t: 0.0,
            pressure_inputs,
            next: 0,
        }
    }
}

impl MetricSource for Replay {
    fn sample(&mut self) -> Result<RawSample> {
        let (faults, available, committed) = *self
            .pressure_inputs
            .get(self.next)
            .ok_or_else(|| BwError::collection("replay finished"))?;
        self.next += 1;
        let timestamp = SampleTime {
            wall: 1_760_000_000.0 + self.t,
            monotonic: self.t,
        };
        self.t += 5.0;
        Ok(RawSample {
            page_faults_per_sec: Some(faults),
            available_ram_percent: Some(available),
            committed_ratio: Some(committed),
            ..RawSample::at(timestamp)
        })
    }
}

fn config() -> Config {
    Config {
        smoothing_window_minutes: 1,
        minimum_pressure_duration_seconds: 20,
        ..Default::default()
    }
}

#[test]
fn test_pipeline_persists_and_reports_event() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("history.db");

    let mut inputs = vec![(1000.0, 0.0, 1.0); 12];
    inputs.extend(vec![(0.0, 100.0, 0.0); 30]);

    let mut cycle = CollectionCycle::new(config(), Box::new(Replay::new(inputs)))
        .unwrap()
        .with_store(Store::open(&path).unwrap());

    let mut transitions = Vec::new();
    for _ in 0..42 {
        let report = cycle.run_once();
        assert!(report.stored_id.is_some());
        transitions.extend(report.transition);
    }

    assert_eq!(transitions.len(), 2);
    assert!(matches!(transitions[0], EventTransition::Opened(_)));
    assert!(matches!(transitions[1], EventTransition::Closed(_)));

    let reader = StoreReader::open(&path).unwrap();
    assert_eq!(reader.count().unwrap(), 42);
    let first = reader.query(0.0, f64::MAX).next().unwrap().unwrap();
    assert_eq!(first.sample.pressure_raw, 100.0);
}

#[test]
fn test_collection_failure_does_not_stop_cycles() {
    let mut cycle = CollectionCycle::new(config(), Box::new(Replay::new(vec![])))
        .unwrap()
        .with_store(Store::open_in_memory().unwrap());

    for i in 1..=MAX_CONSECUTIVE_FAILURES {
        let report = cycle.run_once();
        assert!(report.sample.is_none());
        if i < MAX_CONSECUTIVE_FAILURES {
            assert!(matches!(cycle.health().collection, ComponentHealth::Degraded(_)));
        }
    }
    assert!(cycle.health().collection.is_failed());
    assert!(cycle.health().persistence.is_ok());
    assert_eq!(cycle.store().unwrap().count().unwrap(), 0);
}

#[test]
fn test_store_prunes_expired_history_on_attach() {
    let mut store = Store::open_in_memory().unwrap();
    let mut old = bwatch::core::pressure::DerivedSample {
        raw: RawSample::at(SampleTime::from_secs(1_000.0)),
        pressure_raw: 1.0,
        pressure_smoothed: 1.0,
    };
    old.raw.page_faults_per_sec = Some(1.0);
    store.append(&old).unwrap();

    let cycle = CollectionCycle::new(config(), Box::new(Replay::new(vec![])))
        .unwrap()
        .with_store(store);
    assert_eq!(cycle.store().unwrap().count().unwrap(), 0);
}

#[test]
fn test_snapshot_reflects_latest_cycle() {
    let mut cycle = CollectionCycle::new(
        config(),
        Box::new(Replay::new(vec![(0.0, 90.0, 0.1), (0.0, 80.0, 0.2)])),
    )
    .unwrap();

    cycle.run_once();
    let report = cycle.run_once();
    let snapshot = cycle.snapshot();

    assert_eq!(snapshot.samples_collected, 2);
    assert_eq!(snapshot.latest, report.sample);
    assert!(snapshot.open_event.is_none());
    assert_eq!(snapshot.health.persistence, ComponentHealth::Disabled);
}
