use crate::core::config::{Config, MetricWeights, PartialMetricPolicy, Thresholds};
use crate::core::sampling::RawSample;
use crate::error::Result;

use super::events::{EventDetector, EventTransition, PressureEvent};
use super::normalize::{combine, SubScores};
use super::window::SmoothingWindow;
use super::{DerivedSample, PressureLevel};

/// Result of feeding one raw sample through the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessOutcome {
    pub sample: DerivedSample,
    pub transition: Option<EventTransition>,
}

/// Turns raw samples into smoothed pressure and pressure events.
///
/// Owned by the collection thread; consumers get clones, never references.
#[derive(Debug, Clone)]
pub struct PressureEngine {
    weights: MetricWeights,
    thresholds: Thresholds,
    policy: PartialMetricPolicy,
    window: SmoothingWindow,
    detector: EventDetector,
    last_known: SubScores,
    latest: Option<DerivedSample>,
}

impl PressureEngine {
    /// Build an engine from validated configuration.
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;

        let duration = config.smoothing_window();
        let capacity = SmoothingWindow::capacity_for(duration, config.sampling_interval());
        log::info!(
            "PressureEngine initialized: window {}s (capacity {}), event threshold {:.0}%",
            duration.as_secs(),
            capacity,
            config.thresholds.yellow
        );

        Ok(Self {
            weights: config.metric_weights,
            thresholds: config.thresholds,
            policy: config.partial_metric_policy,
            window: SmoothingWindow::new(duration, capacity),
            detector: EventDetector::new(
                config.thresholds.yellow,
                config.minimum_pressure_duration(),
            ),
            last_known: SubScores::default(),
            latest: None,
        })
    }

    /// Score, smooth and run event detection for one sample.
    pub fn process(&mut self, raw: RawSample) -> ProcessOutcome {
        let raw = raw.sanitized();
        let pressure_raw = self.raw_pressure(&raw);
        let pressure_smoothed = self.window.push(raw.timestamp.monotonic, pressure_raw);
        let transition = self.detector.observe(raw.timestamp, pressure_smoothed);

        log::debug!(
            "Pressure: raw={:.1}%, smoothed={:.1}% ({} in window)",
            pressure_raw,
            pressure_smoothed,
            self.window.len()
        );

        let sample = DerivedSample {
            raw,
            pressure_raw,
            pressure_smoothed,
        };
        self.latest = Some(sample.clone());

        ProcessOutcome { sample, transition }
    }

    /// Instantaneous pressure, applying the partial-metric policy.
    pub fn raw_pressure(&mut self, raw: &RawSample) -> f64 {
        let scores = SubScores::from_inputs(
            raw.page_faults_per_sec,
            raw.available_ram_percent,
            raw.committed_ratio,
        );

        let resolve = |current: Option<f64>, last: Option<f64>| match self.policy {
            PartialMetricPolicy::Neutral => current.unwrap_or(0.0),
            PartialMetricPolicy::CarryForward => current.or(last).unwrap_or(0.0),
        };
        let page_faults = resolve(scores.page_faults, self.last_known.page_faults);
        let available_ram = resolve(scores.available_ram, self.last_known.available_ram);
        let committed = resolve(scores.committed_ratio, self.last_known.committed_ratio);

        self.last_known = SubScores {
            page_faults: scores.page_faults.or(self.last_known.page_faults),
            available_ram: scores.available_ram.or(self.last_known.available_ram),
            committed_ratio: scores.committed_ratio.or(self.last_known.committed_ratio),
        };

        log::trace!(
            "Sub-scores: page_faults={:.1}, available_ram={:.1}, committed={:.1}",
            page_faults,
            available_ram,
            committed
        );

        combine(&self.weights, page_faults, available_ram, committed)
    }

    /// Copy of the most recent derived sample
    pub fn latest(&self) -> Option<DerivedSample> {
        self.latest.clone()
    }

    pub fn open_event(&self) -> Option<PressureEvent> {
        self.detector.current()
    }

    /// Close any open event at the latest sample's time.
    pub fn close_open_event(&mut self) -> Option<EventTransition> {
        let at = self.latest.as_ref()?.raw.timestamp;
        self.detector.close(at).map(EventTransition::Closed)
    }

    /// Current smoothed pressure, 0 before the first sample
    pub fn smoothed_pressure(&self) -> f64 {
        self.window.mean().unwrap_or(0.0)
    }

    pub fn level(&self) -> PressureLevel {
        self.level_for(self.smoothed_pressure())
    }

    pub fn level_for(&self, pressure: f64) -> PressureLevel {
        PressureLevel::classify(pressure, &self.thresholds)
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Forget the window, carried-forward scores and any open event
    pub fn reset(&mut self) {
        self.window.clear();
        self.detector.reset();
        self.last_known = SubScores::default();
        self.latest = None;
        log::info!("PressureEngine reset");
    }
}
