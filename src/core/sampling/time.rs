use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

static PROCESS_ANCHOR: Lazy<Instant> = Lazy::new(Instant::now);

/// When a sample was taken, on both clocks.
///
/// `wall` is persisted and used for queries; `monotonic` drives the
/// smoothing window and event durations so clock adjustments cannot
/// stretch or shrink them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleTime {
    /// Seconds since the Unix epoch
    pub wall: f64,
    /// Seconds since this process first asked for the time
    pub monotonic: f64,
}

impl SampleTime {
    pub fn now() -> Self {
        let monotonic = PROCESS_ANCHOR.elapsed().as_secs_f64();
        let wall = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        Self { wall, monotonic }
    }

    /// Both clocks set to `secs`; used for replaying recorded series.
    pub fn from_secs(secs: f64) -> Self {
        Self {
            wall: secs,
            monotonic: secs,
        }
    }

    pub fn as_datetime(&self) -> chrono::DateTime<chrono::Utc> {
        let millis = (self.wall * 1000.0).round() as i64;
        chrono::DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
