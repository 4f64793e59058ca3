//! Command-line interface handling for the echo server.
//!
//! Uses the `clap` builder API. Every flag is optional and only overrides
//! the corresponding configuration file value when given.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for bind address
    pub bind_address: Option<String>,
    /// Optional override for the listening port
    pub port: Option<u16>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Optional override for the event pump interval
    pub tick_ms: Option<u64>,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::try_parse_from(std::env::args_os()).unwrap_or_else(|e| e.exit())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        command().try_get_matches_from(args).map(|m| Self::from_matches(&m))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<PathBuf>("config")
                .cloned()
                .unwrap_or_else(|| PathBuf::from("dwebble_echo.toml")),
            bind_address: matches.get_one::<String>("bind").cloned(),
            port: matches.get_one::<u16>("port").copied(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            tick_ms: matches.get_one::<u64>("tick-ms").copied(),
        }
    }
}

fn command() -> Command {
    Command::new("Dwebble Echo Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("WebSocket echo server built on the Dwebble facade")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .value_parser(clap::value_parser!(PathBuf))
                .default_value("dwebble_echo.toml"),
        )
        .arg(
            Arg::new("bind")
                .short('b')
                .long("bind")
                .value_name("ADDRESS")
                .help("Bind address (e.g., 127.0.0.1)"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Port to listen on (0 picks a free port)")
                .value_parser(clap::value_parser!(u16)),
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
            Arg::new("tick-ms")
                .long("tick-ms")
                .value_name("MILLIS")
                .help("Event pump interval in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["dwebble_echo"]).expect("parse");
        assert_eq!(args.config_path, PathBuf::from("dwebble_echo.toml"));
        assert!(args.bind_address.is_none());
        assert!(args.port.is_none());
        assert!(!args.json_logs);
    }

    #[test]
    fn test_all_flags() {
        let args = CliArgs::try_parse_from([
            "dwebble_echo",
            "--config",
            "prod.toml",
            "--bind",
            "0.0.0.0",
            "--port",
            "8080",
            "--log-level",
            "debug",
            "--json-logs",
            "--tick-ms",
            "5",
        ])
        .expect("parse");

        assert_eq!(args.config_path, PathBuf::from("prod.toml"));
        assert_eq!(args.bind_address.as_deref(), Some("0.0.0.0"));
        assert_eq!(args.port, Some(8080));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert!(args.json_logs);
        assert_eq!(args.tick_ms, Some(5));
    }

    #[test]
    fn test_rejects_out_of_range_port() {
        assert!(CliArgs::try_parse_from(["dwebble_echo", "--port", "70000"]).is_err());
    }
}
