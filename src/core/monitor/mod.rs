//! Collection pipeline: sample, derive, persist, publish.

mod cycle;
mod health;
mod runtime;

pub use cycle::{CollectionCycle, CycleReport, MAX_CONSECUTIVE_FAILURES};
pub use health::{ComponentHealth, HealthStatus};
pub use runtime::CollectionRuntime;

use serde::{Deserialize, Serialize};

use crate::core::pressure::{DerivedSample, PressureEvent, PressureLevel};

/// Point-in-time view of the collector for presentation code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSnapshot {
    pub latest: Option<DerivedSample>,
    pub open_event: Option<PressureEvent>,
    pub level: PressureLevel,
    pub health: HealthStatus,
    pub samples_collected: u64,
}
