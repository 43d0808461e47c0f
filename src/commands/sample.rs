use anyhow::Result;
use colored::Colorize;
use std::time::Duration;

use crate::core::pressure::{DerivedSample, PressureEngine, PressureLevel};
use crate::core::sampling::{MetricSource, SystemMetricSource};
use crate::ui::{colorize_level, colorize_pressure, format_bytes, format_optional, format_percent, format_rate};

/// Rate counters need two readings; this is the gap between them.
const MEASUREMENT_GAP: Duration = Duration::from_secs(1);

/// Take one measurement and print it
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let config = super::load_config()?;
    let mut source = SystemMetricSource::new();
    let mut engine = PressureEngine::new(&config)?;

    std::thread::sleep(MEASUREMENT_GAP);
    let raw = source.sample()?;
    let sample = engine.process(raw).sample;
    let level = engine.level_for(sample.pressure_raw);

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&sample)?);
        return Ok(());
    }

    print_sample(&sample, level);
    Ok(())
}

fn print_sample(sample: &DerivedSample, level: PressureLevel) {
    let raw = &sample.raw;

    println!("{}", "Memory pressure".bold());
    println!(
        "  {:<22} {} {}",
        "Pressure:",
        colorize_pressure(sample.pressure_raw, level),
        colorize_level(level)
    );
    println!();
    println!("{}", "Memory".bold());
    println!(
        "  {:<22} {}",
        "Hard page faults:",
        format_optional(raw.page_faults_per_sec, |f| format!("{:.1}/s", f))
    );
    println!(
        "  {:<22} {} ({})",
        "Available RAM:",
        format_optional(raw.available_ram_bytes, format_bytes),
        format_optional(raw.available_ram_percent, format_percent)
    );
    println!(
        "  {:<22} {} ({})",
        "Committed:",
        format_optional(raw.committed_bytes, format_bytes),
        format_optional(raw.committed_ratio, |r| format_percent(r * 100.0))
    );
    println!();
    println!("{}", "Disk".bold());
    println!(
        "  {:<22} {}",
        "Read:",
        format_optional(raw.disk_read_bytes_per_sec, format_rate)
    );
    println!(
        "  {:<22} {}",
        "Write:",
        format_optional(raw.disk_write_bytes_per_sec, format_rate)
    );
    println!(
        "  {:<22} {} ({} of disk I/O)",
        "Paging I/O:",
        format_optional(raw.page_io_bytes_per_sec, format_rate),
        format_optional(raw.page_io_percent(), format_percent)
    );
    println!(
        "  {:<22} {}",
        "Busy:",
        format_optional(raw.disk_percent_busy, format_percent)
    );

    let missing = raw.unavailable_fields();
    if !missing.is_empty() {
        println!();
        println!(
            "{}",
            format!("Unavailable on this system: {}", missing.join(", ")).yellow()
        );
    }
}
