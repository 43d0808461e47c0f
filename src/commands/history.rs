use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::export;
use crate::core::pressure::{EventDetector, EventTransition, PressureEvent, PressureLevel};
use crate::core::sampling::SampleTime;
use crate::core::store::{RecordCursor, StoreReader, StoredRecord};
use crate::ui::{colorize_pressure, format_duration, format_optional, format_percent, format_timestamp};

use super::{database_path, load_config};

/// Sampling intervals without a record before the collector counts as stopped
const GAP_FACTOR: f64 = 3.0;

fn hours_span(matches: &clap::ArgMatches) -> Option<Duration> {
    matches
        .get_one::<u64>("hours")
        .map(|&hours| Duration::from_secs(hours * 3600))
}

fn open_reader(matches: &clap::ArgMatches) -> Result<StoreReader> {
    let path = database_path(matches)?;
    StoreReader::open(&path).with_context(|| format!("Cannot read history at {}", path.display()))
}

fn query_span<'r>(reader: &'r StoreReader, span: Option<Duration>) -> RecordCursor<'r> {
    match span {
        Some(span) => reader.query_last(span),
        None => reader.query(f64::MIN, f64::MAX),
    }
}

/// Print stored samples and the pressure events they contain
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let config = load_config()?;
    let reader = open_reader(matches)?;
    let span = hours_span(matches).unwrap_or(Duration::from_secs(3600));

    let records: Vec<StoredRecord> = query_span(&reader, Some(span)).collect::<crate::Result<_>>()?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!(
            "{}",
            format!("No samples in the last {}.", format_duration(span.as_secs_f64())).yellow()
        );
        return Ok(());
    }

    println!(
        "{}",
        format!(
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
            "Time", "Smoothed", "Raw", "RAM free", "Commit", "Faults/s"
        )
        .bold()
    );
    for record in &records {
        let sample = &record.sample;
        let level = PressureLevel::classify(sample.pressure_smoothed, &config.thresholds);
        println!(
            "{:<20} {:>10} {:>10} {:>10} {:>10} {:>10}",
            format_timestamp(&sample.raw.timestamp),
            colorize_pressure(sample.pressure_smoothed, level),
            format_percent(sample.pressure_raw),
            format_optional(sample.raw.available_ram_percent, format_percent),
            format_optional(sample.raw.committed_ratio, |r| format_percent(r * 100.0)),
            format_optional(sample.raw.page_faults_per_sec, |f| format!("{:.0}", f)),
        );
    }

    print_summary(&records, &config);
    Ok(())
}

fn print_summary(records: &[StoredRecord], config: &crate::Config) {
    let smoothed: Vec<f64> = records.iter().map(|r| r.sample.pressure_smoothed).collect();
    let peak = smoothed.iter().copied().fold(0.0, f64::max);
    let average = smoothed.iter().sum::<f64>() / smoothed.len() as f64;

    let events = replay_events(records, config);

    println!();
    println!(
        "{} samples, average {}, peak {}",
        records.len(),
        format_percent(average),
        format_percent(peak)
    );
    if events.is_empty() {
        println!("{}", "No sustained pressure events.".green());
        return;
    }

    println!("{}", format!("{} pressure event(s):", events.len()).yellow().bold());
    for event in events {
        let until = event
            .end_timestamp
            .or_else(|| records.last().map(wall_time))
            .unwrap_or(event.start_timestamp);
        println!(
            "  {}  {:>8}  peak {}  avg {}{}",
            format_timestamp(&event.start_timestamp),
            format_duration(event.duration(until).as_secs_f64()),
            format_percent(event.peak_pressure),
            format_percent(event.average_pressure),
            if event.is_open() { "  (ongoing)" } else { "" }
        );
    }
}

fn wall_time(record: &StoredRecord) -> SampleTime {
    SampleTime::from_secs(record.sample.raw.timestamp.wall)
}

/// Rebuild pressure events from stored samples.
///
/// Runs on wall time since monotonic stamps restart with each collector run.
/// A gap longer than [`GAP_FACTOR`] sampling intervals means the collector
/// was stopped, so any event open before it ends at the last record.
fn replay_events(records: &[StoredRecord], config: &crate::Config) -> Vec<PressureEvent> {
    let max_gap = config.sampling_interval().as_secs_f64() * GAP_FACTOR;
    let mut detector = EventDetector::new(
        config.thresholds.yellow,
        config.minimum_pressure_duration(),
    );
    let mut events = Vec::new();
    let mut previous: Option<SampleTime> = None;

    for record in records {
        let at = wall_time(record);
        if let Some(prev) = previous {
            if at.wall - prev.wall > max_gap {
                events.extend(detector.close(prev));
                detector.reset();
            }
        }
        if let Some(EventTransition::Closed(event)) =
            detector.observe(at, record.sample.pressure_smoothed)
        {
            events.push(event);
        }
        previous = Some(at);
    }
    events.extend(detector.current());
    events
}

/// Write stored samples to a CSV file
pub fn export(matches: &clap::ArgMatches) -> Result<()> {
    let reader = open_reader(matches)?;
    let output = matches
        .get_one::<String>("output")
        .map(PathBuf::from)
        .context("Output file is required")?;

    let rows = export::export_to_file(&output, query_span(&reader, hours_span(matches)))?;
    println!(
        "{}",
        format!("✓ Exported {} samples to {}", rows, output.display()).green()
    );
    Ok(())
}
