use chrono::{DateTime, Local};
use colored::{ColoredString, Colorize};
use humansize::{format_size, BINARY};

use crate::core::monitor::ComponentHealth;
use crate::core::pressure::{DerivedSample, PressureLevel};
use crate::core::sampling::SampleTime;

const UNAVAILABLE: &str = "n/a";

/// Format byte count (1.5 GiB)
pub fn format_bytes(bytes: u64) -> String {
    format_size(bytes, BINARY)
}

/// Format a throughput (12.0 MiB/s)
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_size(bytes_per_sec.max(0.0) as u64, BINARY))
}

/// Local time as YYYY-MM-DD HH:MM:SS
pub fn format_timestamp(time: &SampleTime) -> String {
    let local: DateTime<Local> = time.as_datetime().into();
    local.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Human duration: 45s, 3m 05s, 2h 10m
pub fn format_duration(secs: f64) -> String {
    let secs = secs.max(0.0).round() as u64;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

pub fn format_optional<T>(value: Option<T>, format: impl Fn(T) -> String) -> String {
    value.map(format).unwrap_or_else(|| UNAVAILABLE.to_string())
}

pub fn format_percent(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Pressure value colored by its level
pub fn colorize_pressure(pressure: f64, level: PressureLevel) -> ColoredString {
    let text = format_percent(pressure);
    match level {
        PressureLevel::Normal => text.green(),
        PressureLevel::Elevated => text.yellow(),
        PressureLevel::Critical => text.red().bold(),
    }
}

pub fn colorize_level(level: PressureLevel) -> ColoredString {
    let text = level.to_string().to_uppercase();
    match level {
        PressureLevel::Normal => text.green(),
        PressureLevel::Elevated => text.yellow().bold(),
        PressureLevel::Critical => text.red().bold(),
    }
}

pub fn colorize_health(health: &ComponentHealth) -> ColoredString {
    let text = health.to_string();
    match health {
        ComponentHealth::Ok => text.green(),
        ComponentHealth::Degraded(_) => text.yellow(),
        ComponentHealth::Failed(_) => text.red(),
        ComponentHealth::Disabled => text.dimmed(),
    }
}

/// One-line status: time, pressure, RAM, commit, faults
pub fn format_sample_line(sample: &DerivedSample, level: PressureLevel) -> String {
    let raw = &sample.raw;
    format!(
        "{}  pressure {} (raw {})  ram free {}  commit {}  faults {}",
        format_timestamp(&raw.timestamp).dimmed(),
        colorize_pressure(sample.pressure_smoothed, level),
        format_percent(sample.pressure_raw),
        format_optional(raw.available_ram_percent, format_percent),
        format_optional(raw.committed_ratio, |r| format_percent(r * 100.0)),
        format_optional(raw.page_faults_per_sec, |f| format!("{:.0}/s", f)),
    )
}
