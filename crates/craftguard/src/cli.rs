//! Command-line interface handling for the craftguard replay harness.
//!
//! Parses the options that override the configuration file using the
//! `clap` builder API.

use clap::{Arg, ArgAction, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
///
/// Every option except the config path is an override of a configuration
/// file setting and is `None` when not supplied.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the recipe table
    pub recipes_path: Option<PathBuf>,
    /// Optional override for the event batch file
    pub events_path: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for tick pacing in milliseconds
    pub tick_interval_ms: Option<u64>,
}

impl CliArgs {
    /// Parses command line arguments using clap.
    pub fn parse() -> Self {
        Self::from_matches(Self::command().get_matches())
    }

    fn command() -> Command {
        Command::new("craftguard")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Replays crafting event batches through the crafting ledger engine")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("craftguard.toml"),
            )
            .arg(
                Arg::new("recipes")
                    .short('r')
                    .long("recipes")
                    .value_name("FILE")
                    .help("Recipe table (JSON array)"),
            )
            .arg(
                Arg::new("events")
                    .short('e')
                    .long("events")
                    .value_name("FILE")
                    .help("Event batches (one JSON object per line)"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("tick-interval")
                    .short('t')
                    .long("tick-interval")
                    .value_name("MS")
                    .help("Delay between replayed ticks (0 replays as fast as possible)")
                    .value_parser(clap::value_parser!(u64)),
            )
    }

    fn from_matches(matches: clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("craftguard.toml")),
            recipes_path: matches.get_one::<String>("recipes").map(PathBuf::from),
            events_path: matches.get_one::<String>("events").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            tick_interval_ms: matches.get_one::<u64>("tick-interval").copied(),
        }
    }
}
