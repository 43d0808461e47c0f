use crate::core::Config;
use anyhow::Result;
use colored::Colorize;

pub fn handle_config(matches: &clap::ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("show", _)) => show(),
        Some(("path", _)) => path(),
        Some(("reset", sub_matches)) => reset(sub_matches),
        Some(("validate", _)) => validate(),
        _ => {
            println!("Use 'bwatch config --help' for more information.");
            Ok(())
        }
    }
}

fn show() -> Result<()> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn path() -> Result<()> {
    println!("{}", Config::get_config_path()?.display());
    Ok(())
}

fn reset(matches: &clap::ArgMatches) -> Result<()> {
    if !matches.get_flag("yes")
        && !dialoguer::Confirm::new()
            .with_prompt("Reset configuration to defaults?")
            .default(false)
            .interact()?
    {
        println!("{}", "Cancelled.".yellow());
        return Ok(());
    }

    Config::default().save()?;
    println!(
        "{}",
        format!(
            "✓ Configuration reset: {}",
            Config::get_config_path()?.display()
        )
        .green()
    );
    Ok(())
}

fn validate() -> Result<()> {
    let config = Config::load()?;
    match config.validate() {
        Ok(()) => {
            println!("{}", "✓ Configuration is valid".green());
            Ok(())
        }
        Err(e) => {
            println!("{}", format!("✗ {}", e).red());
            Err(e.into())
        }
    }
}
