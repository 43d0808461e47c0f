// Core monitoring logic

pub mod config;
pub mod export;
pub mod monitor;
pub mod pressure;
pub mod sampling;
pub mod store;

// Re-export commonly used items
pub use config::Config;
pub use monitor::{CollectionCycle, CollectionRuntime, HealthStatus, MonitorSnapshot};
pub use pressure::{DerivedSample, PressureEngine, PressureEvent, PressureLevel};
pub use sampling::{MetricSource, RawSample, SampleTime, SystemMetricSource};
pub use store::{Store, StoreReader, StoredRecord};
