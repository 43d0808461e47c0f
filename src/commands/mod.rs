// Command handlers module
pub mod config;
pub mod history;
pub mod maintenance;
pub mod run;
pub mod sample;
pub mod status;

use anyhow::Result;
use std::path::PathBuf;

use crate::core::Config;

/// `--db` if given, otherwise the default history location
pub(crate) fn database_path(matches: &clap::ArgMatches) -> Result<PathBuf> {
    match matches.try_get_one::<String>("db").ok().flatten() {
        Some(path) => Ok(PathBuf::from(path)),
        None => Config::get_database_path(),
    }
}

/// Load the configuration and refuse to continue on invalid values
pub(crate) fn load_config() -> Result<Config> {
    let config = Config::load()?;
    config.validate()?;
    Ok(config)
}
