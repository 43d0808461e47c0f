use anyhow::Result;
use clap::{Arg, ArgAction, Command};

use bwatch::commands;
use bwatch::core::config::{Config, MAX_DATA_RETENTION_DAYS};

fn db_arg() -> Arg {
    Arg::new("db")
        .long("db")
        .value_name("PATH")
        .help("History database (defaults to the user data directory)")
}

fn hours_arg(help: &'static str) -> Arg {
    Arg::new("hours")
        .long("hours")
        .value_name("HOURS")
        .help(help)
        .value_parser(clap::value_parser!(u64).range(1..))
}

fn yes_arg() -> Arg {
    Arg::new("yes")
        .short('y')
        .long("yes")
        .help("Skip the confirmation prompt")
        .action(ArgAction::SetTrue)
}

fn main() -> Result<()> {
    let matches = Command::new("bwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Memory pressure monitor with a queryable history")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .global(true)
                .action(ArgAction::SetTrue),
        )
        .subcommand(
            Command::new("run")
                .about("Collect samples in the foreground until Ctrl+C")
                .arg(db_arg())
                .arg(
                    Arg::new("interval")
                        .short('i')
                        .long("interval")
                        .value_name("SECONDS")
                        .help("Override the sampling frequency")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("no-store")
                        .long("no-store")
                        .help("Do not write samples to the history database")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("sample")
                .about("Take a single measurement")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print the sample as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("Show stored samples and pressure events")
                .arg(db_arg())
                .arg(hours_arg("How far back to look (default: 1)"))
                .arg(
                    Arg::new("json")
                        .long("json")
                        .help("Print records as JSON")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("export")
                .about("Export stored samples to CSV")
                .arg(
                    Arg::new("output")
                        .help("Destination CSV file")
                        .required(true)
                        .index(1),
                )
                .arg(db_arg())
                .arg(hours_arg("Only export the last HOURS (default: everything)")),
        )
        .subcommand(
            Command::new("prune")
                .about("Delete samples older than the retention period")
                .arg(db_arg())
                .arg(
                    Arg::new("days")
                        .long("days")
                        .value_name("DAYS")
                        .help("Override data_retention_days")
                        .value_parser(clap::value_parser!(u64).range(1..=MAX_DATA_RETENTION_DAYS)),
                ),
        )
        .subcommand(
            Command::new("clear")
                .about("Delete all stored samples")
                .arg(db_arg())
                .arg(yes_arg()),
        )
        .subcommand(
            Command::new("status")
                .about("Show configuration and history status")
                .arg(db_arg()),
        )
        .subcommand(
            Command::new("config")
                .about("Manage configuration (use 'bwatch config --help' for subcommands)")
                .subcommand_required(true)
                .arg_required_else_help(true)
                .subcommand(Command::new("show").about("Print the current configuration"))
                .subcommand(Command::new("path").about("Print the configuration file path"))
                .subcommand(
                    Command::new("reset")
                        .about("Restore default configuration")
                        .arg(yes_arg()),
                )
                .subcommand(Command::new("validate").about("Check the configuration")),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose")
        || Config::load()
            .map(|config| config.verbose_logging)
            .unwrap_or(false);
    bwatch::init_logging(verbose);

    match matches.subcommand() {
        Some(("run", sub_matches)) => commands::run::execute(sub_matches)?,
        Some(("sample", sub_matches)) => commands::sample::execute(sub_matches)?,
        Some(("history", sub_matches)) => commands::history::execute(sub_matches)?,
        Some(("export", sub_matches)) => commands::history::export(sub_matches)?,
        Some(("prune", sub_matches)) => commands::maintenance::prune(sub_matches)?,
        Some(("clear", sub_matches)) => commands::maintenance::clear(sub_matches)?,
        Some(("status", sub_matches)) => commands::status::execute(sub_matches)?,
        Some(("config", sub_matches)) => commands::config::handle_config(sub_matches)?,
        _ => {
            println!("bwatch {}", env!("CARGO_PKG_VERSION"));
            println!("Use 'bwatch --help' for more information.");
        }
    }

    Ok(())
}
