use bwatch::core::config::{Config, PartialMetricPolicy};
use bwatch::BwError;
use tempfile::TempDir;

#[test]
fn test_missing_file_creates_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bwatch").join("config.json");

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config, Config::default());
    assert!(path.exists());
}

#[test]
fn test_partial_file_fills_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "sampling_frequency_seconds": 10, "thresholds": { "red": 90 } }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.sampling_frequency_seconds, 10);
    assert_eq!(config.thresholds.red, 90.0);
    assert_eq!(config.thresholds.yellow, 60.0);
    assert_eq!(config.smoothing_window_minutes, 5);
    assert_eq!(config.partial_metric_policy, PartialMetricPolicy::Neutral);
}

#[test]
fn test_garbage_file_falls_back_to_defaults() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert_eq!(Config::load_from(&path).unwrap(), Config::default());
}

#[test]
fn test_save_and_reload() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");

    let mut config = Config::default();
    config.data_retention_days = 7;
    config.partial_metric_policy = PartialMetricPolicy::CarryForward;
    config.save_to(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("\"carry_forward\""));
    assert_eq!(Config::load_from(&path).unwrap(), config);
}

#[test]
fn test_loaded_values_are_validated_separately() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("config.json");
    std::fs::write(
        &path,
        r#"{ "metric_weights": { "page_faults": 0.9, "available_ram": 0.3, "committed_ratio": 0.2 } }"#,
    )
    .unwrap();

    let config = Config::load_from(&path).unwrap();
    assert!(matches!(config.validate(), Err(BwError::Configuration(_))));
}
