//! Pressure calculation engine.
//!
//! Raw counters are normalized to 0-100 sub-scores, combined with the
//! configured weights, smoothed over a time-bounded window and fed to a
//! hysteresis state machine that reports sustained-pressure events.
//!
//! Unavailable sub-metrics score 0 under the default
//! [`PartialMetricPolicy::Neutral`](crate::core::config::PartialMetricPolicy):
//! partial collection failure biases toward "no pressure" rather than
//! showing stress that was never measured.

mod engine;
pub mod events;
pub mod normalize;
mod window;

pub use engine::{PressureEngine, ProcessOutcome};
pub use events::{EventDetector, EventTransition, PressureEvent};
pub use window::SmoothingWindow;

use serde::{Deserialize, Serialize};

use crate::core::config::Thresholds;
use crate::core::sampling::RawSample;

/// A raw sample with its computed pressure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedSample {
    #[serde(flatten)]
    pub raw: RawSample,
    /// Instantaneous weighted pressure, 0-100
    pub pressure_raw: f64,
    /// Moving average over the smoothing window, 0-100
    pub pressure_smoothed: f64,
}

/// Band a pressure value falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PressureLevel {
    Normal,
    Elevated,
    Critical,
}

impl PressureLevel {
    pub fn classify(pressure: f64, thresholds: &Thresholds) -> Self {
        if pressure >= thresholds.red {
            PressureLevel::Critical
        } else if pressure >= thresholds.yellow {
            PressureLevel::Elevated
        } else {
            PressureLevel::Normal
        }
    }
}

impl std::fmt::Display for PressureLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PressureLevel::Normal => "normal",
            PressureLevel::Elevated => "elevated",
            PressureLevel::Critical => "critical",
        };
        f.write_str(label)
    }
}
