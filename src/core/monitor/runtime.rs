//! Background collection thread.
//!
//! Sampling can block on platform calls, so it gets its own OS thread with a
//! single-threaded Tokio runtime for the timer and channels. Consumers only
//! ever see cloned snapshots.

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{broadcast, watch};
use tokio::time::{interval, MissedTickBehavior};

use crate::core::config::Config;
use crate::core::pressure::EventTransition;
use crate::core::sampling::MetricSource;
use crate::core::store::Store;
use crate::error::{BwError, Result};

use super::cycle::CollectionCycle;
use super::MonitorSnapshot;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Handle to the running collector.
///
/// Dropping the handle stops the collector and waits for the thread.
pub struct CollectionRuntime {
    /// Latest state, replaced after every cycle
    pub snapshot_rx: watch::Receiver<Arc<MonitorSnapshot>>,
    events_tx: broadcast::Sender<EventTransition>,
    config_tx: watch::Sender<Config>,
    shutdown_tx: broadcast::Sender<()>,
    thread: Option<JoinHandle<()>>,
}

impl CollectionRuntime {
    /// Validate `config` and start collecting.
    ///
    /// With `store_path` set, samples are persisted; a store that cannot be
    /// opened is reported through health and sampling carries on.
    pub fn start(
        config: Config,
        source: Box<dyn MetricSource>,
        store_path: Option<PathBuf>,
    ) -> Result<Self> {
        let cycle = CollectionCycle::new(config.clone(), source)?;

        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(cycle.snapshot()));
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (config_tx, config_rx) = watch::channel(config);
        let (shutdown_tx, _) = broadcast::channel::<()>(1);

        let events_for_thread = events_tx.clone();
        let shutdown_rx = shutdown_tx.subscribe();

        let thread = std::thread::Builder::new()
            .name("bwatch-collector".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        log::error!("Failed to build collector runtime: {}", e);
                        return;
                    }
                };

                let cycle = match store_path {
                    Some(path) => match Store::open(&path) {
                        Ok(store) => cycle.with_store(store),
                        Err(e) => {
                            log::error!("History unavailable, sampling without persistence: {}", e);
                            cycle.store_unavailable(e.to_string())
                        }
                    },
                    None => cycle,
                };

                runtime.block_on(collection_loop(
                    cycle,
                    snapshot_tx,
                    events_for_thread,
                    config_rx,
                    shutdown_rx,
                ));
            })?;

        log::info!("Collector started");

        Ok(Self {
            snapshot_rx,
            events_tx,
            config_tx,
            shutdown_tx,
            thread: Some(thread),
        })
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<MonitorSnapshot> {
        self.snapshot_rx.borrow().clone()
    }

    /// Receive event open/close transitions from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<EventTransition> {
        self.events_tx.subscribe()
    }

    /// Queue a new configuration, applied between cycles.
    pub fn reconfigure(&self, config: Config) -> Result<()> {
        config.validate()?;
        self.config_tx
            .send(config)
            .map_err(|_| BwError::other("collector is not running"))
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Stop after the current cycle and wait for the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Collector thread panicked");
            } else {
                log::info!("Collector stopped");
            }
        }
    }
}

impl Drop for CollectionRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn collection_loop(
    mut cycle: CollectionCycle,
    snapshot_tx: watch::Sender<Arc<MonitorSnapshot>>,
    events_tx: broadcast::Sender<EventTransition>,
    mut config_rx: watch::Receiver<Config>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut ticker = interval(cycle.config().sampling_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            _ = shutdown.recv() => {
                break;
            }
            changed = config_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let config = config_rx.borrow_and_update().clone();
                let interval_changed = config.sampling_interval() != cycle.config().sampling_interval();
                match cycle.apply_config(config) {
                    Ok(closed) => {
                        if let Some(transition) = closed {
                            let _ = events_tx.send(transition);
                            let _ = snapshot_tx.send(Arc::new(cycle.snapshot()));
                        }
                        if interval_changed {
                            ticker = interval(cycle.config().sampling_interval());
                            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                        }
                    }
                    Err(e) => log::warn!("Rejected configuration update: {}", e),
                }
            }
            _ = ticker.tick() => {
                let report = cycle.run_once();
                if let Some(transition) = report.transition {
                    // No subscribers is fine
                    let _ = events_tx.send(transition);
                }
                let _ = snapshot_tx.send(Arc::new(cycle.snapshot()));
            }
        }
    }

    log::debug!(
        "Collection loop exiting after {} samples",
        cycle.snapshot().samples_collected
    );
}
