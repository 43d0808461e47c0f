//! Metric source abstraction.
//!
//! Normalizes platform memory and disk counters into a flat [`RawSample`].
//! A counter the platform could not deliver is `None`, never a silent zero.

mod time;

pub use time::SampleTime;

use serde::{Deserialize, Serialize};

use crate::error::{BwError, Result};

/// One observation of the memory and disk counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub timestamp: SampleTime,
    /// Hard page faults (reads from disk) per second
    pub page_faults_per_sec: Option<f64>,
    pub available_ram_bytes: Option<u64>,
    /// 0-100
    pub available_ram_percent: Option<f64>,
    pub committed_bytes: Option<u64>,
    /// Committed / commit limit; above 1.0 when overcommitted
    pub committed_ratio: Option<f64>,
    /// Disk I/O caused by paging
    pub page_io_bytes_per_sec: Option<f64>,
    pub disk_read_bytes_per_sec: Option<f64>,
    pub disk_write_bytes_per_sec: Option<f64>,
    /// 0-100
    pub disk_percent_busy: Option<f64>,
}

impl RawSample {
    /// Empty sample stamped with `timestamp`; every metric unavailable.
    pub fn at(timestamp: SampleTime) -> Self {
        Self {
            timestamp,
            ..Default::default()
        }
    }

    fn fields(&self) -> [(&'static str, bool); 9] {
        [
            ("page_faults_per_sec", self.page_faults_per_sec.is_some()),
            ("available_ram_bytes", self.available_ram_bytes.is_some()),
            ("available_ram_percent", self.available_ram_percent.is_some()),
            ("committed_bytes", self.committed_bytes.is_some()),
            ("committed_ratio", self.committed_ratio.is_some()),
            ("page_io_bytes_per_sec", self.page_io_bytes_per_sec.is_some()),
            ("disk_read_bytes_per_sec", self.disk_read_bytes_per_sec.is_some()),
            ("disk_write_bytes_per_sec", self.disk_write_bytes_per_sec.is_some()),
            ("disk_percent_busy", self.disk_percent_busy.is_some()),
        ]
    }

    /// Names of the metrics that were unavailable in this sample
    pub fn unavailable_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, present)| !present)
            .map(|(name, _)| name)
            .collect()
    }

    /// At least one metric is missing but the sample is still usable
    pub fn is_degraded(&self) -> bool {
        self.fields().iter().any(|(_, present)| !present)
    }

    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, present)| !present)
    }

    /// Total disk I/O (reads + writes)
    pub fn total_disk_io_bytes_per_sec(&self) -> Option<f64> {
        match (self.disk_read_bytes_per_sec, self.disk_write_bytes_per_sec) {
            (Some(r), Some(w)) => Some(r + w),
            _ => None,
        }
    }

    /// Disk I/O not attributable to paging
    pub fn regular_io_bytes_per_sec(&self) -> Option<f64> {
        let total = self.total_disk_io_bytes_per_sec()?;
        let paging = self.page_io_bytes_per_sec?;
        Some((total - paging).max(0.0))
    }

    /// Share of disk I/O caused by paging, 0-100
    pub fn page_io_percent(&self) -> Option<f64> {
        let total = self.total_disk_io_bytes_per_sec()?;
        let paging = self.page_io_bytes_per_sec?;
        if total <= 0.0 {
            return Some(0.0);
        }
        Some((paging / total * 100.0).min(100.0))
    }

    /// Replace negative or non-finite readings with "unavailable".
    pub(crate) fn sanitized(mut self) -> Self {
        fn clean(value: Option<f64>) -> Option<f64> {
            value.filter(|v| v.is_finite() && *v >= 0.0)
        }
        self.page_faults_per_sec = clean(self.page_faults_per_sec);
        self.available_ram_percent = clean(self.available_ram_percent).map(|v| v.min(100.0));
        self.committed_ratio = clean(self.committed_ratio);
        self.page_io_bytes_per_sec = clean(self.page_io_bytes_per_sec);
        self.disk_read_bytes_per_sec = clean(self.disk_read_bytes_per_sec);
        self.disk_write_bytes_per_sec = clean(self.disk_write_bytes_per_sec);
        self.disk_percent_busy = clean(self.disk_percent_busy).map(|v| v.min(100.0));
        self
    }
}

/// Anything that can produce a [`RawSample`] on demand.
///
/// `sample` may block on platform calls and must only be called from the
/// collection thread.
pub trait MetricSource: Send {
    /// Take one sample. Partial samples are successful; only a sample with
    /// every metric unavailable fails with [`BwError::Collection`].
    fn sample(&mut self) -> Result<RawSample>;
}

/// Turn a backend reading into the adapter contract.
pub(crate) fn finish_sample(sample: RawSample) -> Result<RawSample> {
    let sample = sample.sanitized();
    if sample.is_empty() {
        return Err(BwError::collection("all metrics unavailable"));
    }
    if sample.is_degraded() {
        log::debug!(
            "Degraded sample, unavailable: {}",
            sample.unavailable_fields().join(", ")
        );
    }
    Ok(sample)
}

/// Metric source backed by the host operating system.
pub struct SystemMetricSource {
    backend: Backend,
}

#[cfg(target_os = "linux")]
type Backend = crate::platform::procfs::ProcfsCounters;

#[cfg(windows)]
type Backend = crate::platform::wmi_counters::WmiCounters;

#[cfg(not(any(target_os = "linux", windows)))]
type Backend = crate::platform::fallback::SysinfoCounters;

impl SystemMetricSource {
    pub fn new() -> Self {
        Self {
            backend: Backend::new(),
        }
    }
}

impl Default for SystemMetricSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SystemMetricSource {
    fn sample(&mut self) -> Result<RawSample> {
        let reading = self.backend.read(SampleTime::now());
        finish_sample(reading)
    }
}
