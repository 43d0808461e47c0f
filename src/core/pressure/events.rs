use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::core::sampling::SampleTime;

/// A sustained-pressure episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PressureEvent {
    /// When smoothed pressure first crossed the threshold
    pub start_timestamp: SampleTime,
    /// `None` while the event is ongoing
    pub end_timestamp: Option<SampleTime>,
    pub peak_pressure: f64,
    /// Mean smoothed pressure since the crossing
    pub average_pressure: f64,
}

impl PressureEvent {
    pub fn is_open(&self) -> bool {
        self.end_timestamp.is_none()
    }

    /// Elapsed time between start and end (or `until` while open).
    pub fn duration(&self, until: SampleTime) -> Duration {
        let end = self.end_timestamp.unwrap_or(until);
        Duration::from_secs_f64((end.monotonic - self.start_timestamp.monotonic).max(0.0))
    }
}

/// Emitted when an event opens or closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTransition {
    Opened(PressureEvent),
    Closed(PressureEvent),
}

impl EventTransition {
    pub fn event(&self) -> &PressureEvent {
        match self {
            EventTransition::Opened(event) | EventTransition::Closed(event) => event,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Crossing {
    since: SampleTime,
    peak: f64,
    sum: f64,
    count: u64,
}

impl Crossing {
    fn to_event(self, end: Option<SampleTime>) -> PressureEvent {
        PressureEvent {
            start_timestamp: self.since,
            end_timestamp: end,
            peak_pressure: self.peak,
            average_pressure: if self.count > 0 {
                self.sum / self.count as f64
            } else {
                self.peak
            },
        }
    }
}

/// Hysteresis state machine over smoothed pressure.
///
/// An event opens once pressure has stayed at or above `threshold` for
/// `minimum_duration`, back-dated to the first crossing, and closes on the
/// first value below it. At most one event is open at a time.
#[derive(Debug, Clone)]
pub struct EventDetector {
    threshold: f64,
    minimum_duration_secs: f64,
    crossing: Option<Crossing>,
    open: bool,
}

impl EventDetector {
    pub fn new(threshold: f64, minimum_duration: Duration) -> Self {
        Self {
            threshold,
            minimum_duration_secs: minimum_duration.as_secs_f64(),
            crossing: None,
            open: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn observe(&mut self, at: SampleTime, smoothed: f64) -> Option<EventTransition> {
        if smoothed >= self.threshold {
            let crossing = self.crossing.get_or_insert(Crossing {
                since: at,
                peak: smoothed,
                sum: 0.0,
                count: 0,
            });
            crossing.peak = crossing.peak.max(smoothed);
            crossing.sum += smoothed;
            crossing.count += 1;

            let sustained = at.monotonic - crossing.since.monotonic >= self.minimum_duration_secs;
            if !self.open && sustained {
                self.open = true;
                let event = crossing.to_event(None);
                log::info!(
                    "Pressure event started (crossed {:.1}% at {:.0}, peak {:.1}%)",
                    self.threshold,
                    event.start_timestamp.wall,
                    event.peak_pressure
                );
                return Some(EventTransition::Opened(event));
            }
            return None;
        }

        let crossing = self.crossing.take()?;
        if !self.open {
            return None;
        }
        self.open = false;
        let event = crossing.to_event(Some(at));
        log::info!(
            "Pressure event ended: duration={:.1}s, peak={:.1}%, avg={:.1}%",
            event.duration(at).as_secs_f64(),
            event.peak_pressure,
            event.average_pressure
        );
        Some(EventTransition::Closed(event))
    }

    /// The open event, if any
    pub fn current(&self) -> Option<PressureEvent> {
        if !self.open {
            return None;
        }
        self.crossing.map(|crossing| crossing.to_event(None))
    }

    /// Close the open event at `at` without waiting for pressure to drop.
    pub fn close(&mut self, at: SampleTime) -> Option<PressureEvent> {
        let crossing = self.crossing.take()?;
        if !self.open {
            return None;
        }
        self.open = false;
        let event = crossing.to_event(Some(at));
        log::info!(
            "Pressure event closed early after {:.1}s, peak={:.1}%",
            event.duration(at).as_secs_f64(),
            event.peak_pressure
        );
        Some(event)
    }

    pub fn reset(&mut self) {
        self.crossing = None;
        self.open = false;
    }
}
