use bwatch::core::config::{Config, MetricWeights, Thresholds};
use bwatch::core::pressure::normalize::{available_ram_score, committed_ratio_score, page_fault_score};
use bwatch::core::pressure::{EventTransition, PressureEngine, PressureLevel};
use bwatch::core::sampling::{RawSample, SampleTime};

fn sample(t: f64, faults: f64, available: f64, committed: f64) -> RawSample {
    RawSample {
        page_faults_per_sec: Some(faults),
        available_ram_percent: Some(available),
        committed_ratio: Some(committed),
        ..RawSample::at(SampleTime::from_secs(t))
    }
}

#[test]
fn test_weighted_scenario() {
    assert!((page_fault_score(100.0) - 67.0).abs() <= 1.0);
    assert_eq!(available_ram_score(20.0), 80.0);
    assert!((committed_ratio_score(0.9) - 90.0).abs() < 1e-9);

    let mut engine = PressureEngine::new(&Config::default()).unwrap();
    let derived = engine.process(sample(0.0, 100.0, 20.0, 0.9)).sample;
    assert!((derived.pressure_raw - 75.5).abs() < 0.5);
}

#[test]
fn test_only_page_faults_available() {
    let mut engine = PressureEngine::new(&Config::default()).unwrap();
    let raw = RawSample {
        page_faults_per_sec: Some(100.0),
        ..RawSample::at(SampleTime::from_secs(0.0))
    };

    let derived = engine.process(raw).sample;
    assert!(derived.raw.is_degraded());
    assert!(derived.raw.unavailable_fields().contains(&"committed_ratio"));
    assert!(derived.raw.unavailable_fields().contains(&"available_ram_percent"));
    let expected = 0.5 * page_fault_score(100.0);
    assert!((derived.pressure_raw - expected).abs() < 1e-9);
}

#[test]
fn test_custom_weights_shift_pressure() {
    let config = Config {
        metric_weights: MetricWeights {
            page_faults: 0.0,
            available_ram: 1.0,
            committed_ratio: 0.0,
        },
        ..Default::default()
    };
    let mut engine = PressureEngine::new(&config).unwrap();
    let derived = engine.process(sample(0.0, 1000.0, 75.0, 1.0)).sample;
    assert!((derived.pressure_raw - 25.0).abs() < 1e-9);
}

#[test]
fn test_steady_load_over_a_day_keeps_bounded_window() {
    let mut engine = PressureEngine::new(&Config::default()).unwrap();
    for i in 0..17_280u32 {
        engine.process(sample(i as f64 * 5.0, 10.0, 50.0, 0.5));
    }
    // 5 minute window at 5s
    assert_eq!(engine.window_len(), 61);
}

#[test]
fn test_event_lifecycle_through_engine() {
    let config = Config {
        smoothing_window_minutes: 1,
        minimum_pressure_duration_seconds: 30,
        thresholds: Thresholds {
            yellow: 50.0,
            red: 90.0,
        },
        ..Default::default()
    };
    let mut engine = PressureEngine::new(&config).unwrap();

    let mut transitions = Vec::new();
    let mut t = 0.0;
    for _ in 0..20 {
        transitions.extend(engine.process(sample(t, 1000.0, 5.0, 1.0)).transition);
        t += 5.0;
    }
    assert_eq!(engine.level(), PressureLevel::Critical);
    for _ in 0..40 {
        transitions.extend(engine.process(sample(t, 0.0, 100.0, 0.0)).transition);
        t += 5.0;
    }

    assert_eq!(transitions.len(), 2);
    let (opened, closed) = match (&transitions[0], &transitions[1]) {
        (EventTransition::Opened(o), EventTransition::Closed(c)) => (o, c),
        other => panic!("unexpected transitions {:?}", other),
    };
    assert_eq!(opened.start_timestamp, closed.start_timestamp);
    assert!(closed.peak_pressure >= closed.average_pressure);
    assert!(closed.end_timestamp.unwrap().monotonic > opened.start_timestamp.monotonic);
    assert_eq!(engine.level(), PressureLevel::Normal);
}
