use anyhow::Result;
use colored::Colorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

use crate::core::monitor::CollectionRuntime;
use crate::core::pressure::EventTransition;
use crate::core::sampling::SystemMetricSource;
use crate::ui::{colorize_health, format_duration, format_percent, format_sample_line};

use super::{database_path, load_config};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Run the collector in the foreground until Ctrl+C
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let mut config = load_config()?;
    if let Some(&secs) = matches.get_one::<u64>("interval") {
        config.sampling_frequency_seconds = secs;
        config.validate()?;
    }

    let store_path = if matches.get_flag("no-store") {
        None
    } else {
        Some(database_path(matches)?)
    };

    println!("{}", "bwatch - memory pressure monitor".bold());
    println!(
        "{}",
        format!(
            "Sampling every {}s, {}m smoothing, thresholds {:.0}/{:.0}",
            config.sampling_frequency_seconds,
            config.smoothing_window_minutes,
            config.thresholds.yellow,
            config.thresholds.red
        )
        .dimmed()
    );
    match &store_path {
        Some(path) => println!("{}", format!("History: {}", path.display()).dimmed()),
        None => println!("{}", "History: disabled".dimmed()),
    }
    println!("{}", "Press Ctrl+C to stop.".dimmed());
    println!();

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::Relaxed);
    })
    .map_err(|e| anyhow::anyhow!("Failed to set Ctrl+C handler: {}", e))?;

    let runtime = CollectionRuntime::start(
        config,
        Box::new(SystemMetricSource::new()),
        store_path,
    )?;
    let mut snapshots = runtime.snapshot_rx.clone();
    let mut events = runtime.subscribe_events();
    let mut last_health = runtime.snapshot().health.clone();

    while running.load(Ordering::Relaxed) {
        if snapshots.has_changed().unwrap_or(false) {
            let snapshot = snapshots.borrow_and_update().clone();

            if let Some(sample) = &snapshot.latest {
                println!("{}", format_sample_line(sample, snapshot.level));
            }
            if snapshot.health != last_health {
                println!(
                    "{} collection {}, persistence {}",
                    "health:".bold(),
                    colorize_health(&snapshot.health.collection),
                    colorize_health(&snapshot.health.persistence)
                );
                last_health = snapshot.health.clone();
            }
        }

        loop {
            match events.try_recv() {
                Ok(transition) => print_transition(&transition),
                Err(TryRecvError::Lagged(missed)) => {
                    log::warn!("Missed {} pressure event notifications", missed);
                }
                Err(_) => break,
            }
        }

        if !runtime.is_running() {
            println!("{}", "Collector stopped unexpectedly.".red());
            break;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    println!();
    println!("{}", "Stopping collector...".yellow());
    let collected = runtime.snapshot().samples_collected;
    runtime.shutdown();
    println!("{}", format!("Done. {} samples collected.", collected).green());
    Ok(())
}

fn print_transition(transition: &EventTransition) {
    match transition {
        EventTransition::Opened(event) => println!(
            "{} sustained pressure since {} (peak {})",
            ">> EVENT START".red().bold(),
            crate::ui::format_timestamp(&event.start_timestamp),
            format_percent(event.peak_pressure)
        ),
        EventTransition::Closed(event) => {
            let duration = event
                .end_timestamp
                .map(|end| end.monotonic - event.start_timestamp.monotonic)
                .unwrap_or(0.0);
            println!(
                "{} lasted {}, peak {}, average {}",
                "<< EVENT END".green().bold(),
                format_duration(duration),
                format_percent(event.peak_pressure),
                format_percent(event.average_pressure)
            );
        }
    }
}
