use anyhow::Result;
use colored::Colorize;

use crate::core::pressure::PressureLevel;
use crate::core::sampling::SampleTime;
use crate::core::store::{StoreReader, CURRENT_VERSION};
use crate::core::Config;
use crate::ui::{colorize_level, colorize_pressure, format_duration, format_timestamp};

use super::database_path;

/// Show where things live and what the history holds
pub fn execute(matches: &clap::ArgMatches) -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::get_config_path()?;
    let db_path = database_path(matches)?;

    println!("{}", "bwatch status".bold());
    println!("  {:<16} {}", "Config:", config_path.display());
    match config.validate() {
        Ok(()) => println!("  {:<16} {}", "", "valid".green()),
        Err(e) => println!("  {:<16} {}", "", e.to_string().red()),
    }
    println!("  {:<16} {}", "History:", db_path.display());

    let reader = match StoreReader::open(&db_path) {
        Ok(reader) => reader,
        Err(e) => {
            println!("  {:<16} {}", "", e.to_string().yellow());
            return Ok(());
        }
    };

    println!(
        "  {:<16} {} (supported: {})",
        "Schema:",
        reader.schema_version()?,
        CURRENT_VERSION
    );
    println!("  {:<16} {}", "Samples:", reader.count()?);

    if let Some(latest) = reader.latest()? {
        let sample = &latest.sample;
        let level = PressureLevel::classify(sample.pressure_smoothed, &config.thresholds);
        let age = SampleTime::now().wall - sample.raw.timestamp.wall;
        println!(
            "  {:<16} {} ({} ago)",
            "Last sample:",
            format_timestamp(&sample.raw.timestamp),
            format_duration(age)
        );
        println!(
            "  {:<16} {} {}",
            "Last pressure:",
            colorize_pressure(sample.pressure_smoothed, level),
            colorize_level(level)
        );
    }

    Ok(())
}
