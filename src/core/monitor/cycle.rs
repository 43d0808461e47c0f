use std::time::{Duration, Instant};

use crate::core::config::Config;
use crate::core::pressure::{DerivedSample, EventTransition, PressureEngine};
use crate::core::sampling::MetricSource;
use crate::core::store::Store;
use crate::error::Result;

use super::health::{ComponentHealth, HealthStatus};
use super::MonitorSnapshot;

/// Consecutive collection errors before collection is reported as failed.
pub const MAX_CONSECUTIVE_FAILURES: u32 = 3;

const PRUNE_INTERVAL: Duration = Duration::from_secs(3600);

/// What one cycle produced.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// `None` when collection failed this cycle
    pub sample: Option<DerivedSample>,
    pub transition: Option<EventTransition>,
    pub stored_id: Option<i64>,
}

/// Sample, derive and persist, one step at a time.
///
/// Everything here is synchronous; [`super::CollectionRuntime`] drives it on
/// a timer, tests drive it by hand.
pub struct CollectionCycle {
    config: Config,
    source: Box<dyn MetricSource>,
    engine: PressureEngine,
    store: Option<Store>,
    health: HealthStatus,
    consecutive_failures: u32,
    samples_collected: u64,
    last_prune: Option<Instant>,
}

impl CollectionCycle {
    pub fn new(config: Config, source: Box<dyn MetricSource>) -> Result<Self> {
        let engine = PressureEngine::new(&config)?;
        Ok(Self {
            config,
            source,
            engine,
            store: None,
            health: HealthStatus::default(),
            consecutive_failures: 0,
            samples_collected: 0,
            last_prune: None,
        })
    }

    /// Persist into `store`, pruning expired history right away.
    pub fn with_store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self.health.persistence = ComponentHealth::Ok;
        self.prune_expired();
        self
    }

    /// Keep sampling without persistence after the store could not be opened.
    pub fn store_unavailable(mut self, reason: impl Into<String>) -> Self {
        self.store = None;
        self.health.persistence = ComponentHealth::Failed(reason.into());
        self
    }

    pub fn run_once(&mut self) -> CycleReport {
        let raw = match self.source.sample() {
            Ok(raw) => raw,
            Err(e) => {
                self.record_collection_failure(e.to_string());
                return CycleReport::default();
            }
        };

        self.consecutive_failures = 0;
        self.health.collection = if raw.is_degraded() {
            ComponentHealth::Degraded(format!(
                "unavailable: {}",
                raw.unavailable_fields().join(", ")
            ))
        } else {
            ComponentHealth::Ok
        };

        let outcome = self.engine.process(raw);
        self.samples_collected += 1;

        let stored_id = self.persist(&outcome.sample);
        if self
            .last_prune
            .map_or(false, |at| at.elapsed() >= PRUNE_INTERVAL)
        {
            self.prune_expired();
        }

        CycleReport {
            sample: Some(outcome.sample),
            transition: outcome.transition,
            stored_id,
        }
    }

    fn record_collection_failure(&mut self, reason: String) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
            log::error!(
                "Collection failed {} times in a row: {}",
                self.consecutive_failures,
                reason
            );
            self.health.collection = ComponentHealth::Failed(reason);
        } else {
            log::warn!("Collection failed: {}", reason);
            self.health.collection = ComponentHealth::Degraded(reason);
        }
    }

    fn persist(&mut self, sample: &DerivedSample) -> Option<i64> {
        let store = self.store.as_mut()?;
        match store.append(sample) {
            Ok(id) => {
                self.health.persistence = ComponentHealth::Ok;
                Some(id)
            }
            Err(e) => {
                log::error!("Failed to store sample: {}", e);
                self.health.persistence = ComponentHealth::Degraded(e.to_string());
                None
            }
        }
    }

    /// Apply the retention policy now; returns how many records were removed.
    pub fn prune_expired(&mut self) -> usize {
        self.last_prune = Some(Instant::now());
        let retention = self.config.retention();
        let Some(store) = self.store.as_mut() else {
            return 0;
        };
        match store.prune(retention) {
            Ok(deleted) => deleted,
            Err(e) => {
                log::error!("Retention cleanup failed: {}", e);
                self.health.persistence = ComponentHealth::Degraded(e.to_string());
                0
            }
        }
    }

    /// Swap in a new configuration.
    ///
    /// Invalid configuration is rejected and the running one kept. The
    /// smoothing window restarts under the new settings; an open event is
    /// closed at the latest sample and that closing transition returned.
    pub fn apply_config(&mut self, config: Config) -> Result<Option<EventTransition>> {
        if config == self.config {
            return Ok(None);
        }
        let engine = PressureEngine::new(&config)?;
        log::info!(
            "Configuration applied: every {}s, window {}m, thresholds {}/{}",
            config.sampling_frequency_seconds,
            config.smoothing_window_minutes,
            config.thresholds.yellow,
            config.thresholds.red
        );
        let closed = self.engine.close_open_event();
        self.engine = engine;
        self.config = config;
        Ok(closed)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &PressureEngine {
        &self.engine
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn health(&self) -> &HealthStatus {
        &self.health
    }

    pub fn snapshot(&self) -> MonitorSnapshot {
        MonitorSnapshot {
            latest: self.engine.latest(),
            open_event: self.engine.open_event(),
            level: self.engine.level(),
            health: self.health.clone(),
            samples_collected: self.samples_collected,
        }
    }
}
