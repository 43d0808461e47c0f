//! Mapping of raw counters onto 0-100 sub-scores.

use crate::core::config::MetricWeights;

/// Hard page faults per second that map to full pressure
pub const PAGE_FAULT_CEILING: f64 = 1000.0;

/// Logarithmic page-fault score.
///
/// `100 * asinh(x / 2) / ln(1000)`: 0 at rest, one third of the scale per
/// decade above that (10/s -> 33, 100/s -> 67, 1000/s -> 100). Unlike
/// `log10(1 + x)` it stays on the decade marks while remaining strictly
/// increasing from zero.
pub fn page_fault_score(faults_per_sec: f64) -> f64 {
    if faults_per_sec.is_nan() || faults_per_sec <= 0.0 {
        return 0.0;
    }
    let score = 100.0 * (faults_per_sec / 2.0).asinh() / PAGE_FAULT_CEILING.ln();
    score.clamp(0.0, 100.0)
}

/// Inverse-linear: 100% available is no pressure, 0% available is full pressure.
pub fn available_ram_score(available_percent: f64) -> f64 {
    if available_percent.is_nan() {
        return 0.0;
    }
    (100.0 - available_percent).clamp(0.0, 100.0)
}

/// Linear in the commit ratio, saturating at the commit limit.
pub fn committed_ratio_score(committed_ratio: f64) -> f64 {
    if committed_ratio.is_nan() {
        return 0.0;
    }
    (committed_ratio * 100.0).clamp(0.0, 100.0)
}

/// Per-metric scores; `None` where the input was unavailable.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubScores {
    pub page_faults: Option<f64>,
    pub available_ram: Option<f64>,
    pub committed_ratio: Option<f64>,
}

impl SubScores {
    pub fn from_inputs(
        page_faults_per_sec: Option<f64>,
        available_ram_percent: Option<f64>,
        committed_ratio: Option<f64>,
    ) -> Self {
        Self {
            page_faults: page_faults_per_sec.map(page_fault_score),
            available_ram: available_ram_percent.map(available_ram_score),
            committed_ratio: committed_ratio.map(committed_ratio_score),
        }
    }
}

/// Weighted sum of fully-resolved sub-scores, clamped to 0-100.
pub fn combine(weights: &MetricWeights, page_faults: f64, available_ram: f64, committed: f64) -> f64 {
    let pressure = weights.page_faults * page_faults
        + weights.available_ram * available_ram
        + weights.committed_ratio * committed;
    pressure.clamp(0.0, 100.0)
}
