use anyhow::{Context, Result};
use colored::Colorize;

use crate::core::config::retention_days;
use crate::core::store::Store;

use super::{database_path, load_config};

fn open_store(matches: &clap::ArgMatches) -> Result<Store> {
    let path = database_path(matches)?;
    Store::open(&path).with_context(|| format!("Cannot open history at {}", path.display()))
}

/// Delete samples older than the retention period (or `--days`)
pub fn prune(matches: &clap::ArgMatches) -> Result<()> {
    let config = load_config()?;
    let days = matches
        .get_one::<u64>("days")
        .copied()
        .unwrap_or(config.data_retention_days);
    if days == 0 {
        anyhow::bail!("--days must be greater than 0; use 'bwatch clear' to delete everything");
    }

    let mut store = open_store(matches)?;
    let deleted = store.prune(retention_days(days))?;
    let remaining = store.count()?;

    if deleted == 0 {
        println!("{}", format!("Nothing older than {} days.", days).dimmed());
    } else {
        println!(
            "{}",
            format!("✓ Deleted {} samples older than {} days", deleted, days).green()
        );
    }
    println!("{}", format!("{} samples remain.", remaining).dimmed());
    Ok(())
}

/// Delete the whole history after confirmation
pub fn clear(matches: &clap::ArgMatches) -> Result<()> {
    let mut store = open_store(matches)?;
    let count = store.count()?;

    if count == 0 {
        println!("{}", "History is already empty.".dimmed());
        return Ok(());
    }

    if !matches.get_flag("yes") {
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(format!(
                "Delete all {} samples in {}?",
                count,
                store.path().display()
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
    }

    let deleted = store.clear_all()?;
    println!("{}", format!("✓ Deleted {} samples", deleted).green());
    Ok(())
}
