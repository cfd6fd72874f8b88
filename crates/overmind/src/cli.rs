//! Command-line interface for the Overmind server.

use crate::config::AppConfig;
use clap::{Arg, Command};
use std::path::PathBuf;

/// Parsed command-line arguments. Every override is optional; unset
/// values keep what the config file and environment provided.
#[derive(Debug, Clone, PartialEq)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the WebSocket port
    pub port: Option<u16>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
}

impl CliArgs {
    /// Parses the process arguments, exiting with usage on error.
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parses an explicit argument list.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &clap::ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("config.toml")),
            port: matches.get_one::<u16>("port").copied(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
        }
    }

    /// Writes the command-line overrides into `config`.
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(log_level) = &self.log_level {
            config.logging.level = log_level.clone();
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
    }
}

fn command() -> Command {
    Command::new("Overmind Server")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Edge gateway and actor backend for the Overmind game protocol")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("WebSocket port; TCP listens on PORT + 1")
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
                .action(clap::ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = CliArgs::try_parse_from(["overmind"]).unwrap();
        assert_eq!(args.config_path, PathBuf::from("config.toml"));
        assert_eq!(args.port, None);
        assert_eq!(args.log_level, None);
        assert!(!args.json_logs);
    }

    #[test]
    fn test_overrides_reach_config() {
        let args = CliArgs::try_parse_from([
            "overmind", "-c", "prod.toml", "--port", "9000", "-l", "warn", "--json-logs",
        ])
        .unwrap();
        assert_eq!(args.config_path, PathBuf::from("prod.toml"));

        let mut config = AppConfig::default();
        args.apply_overrides(&mut config);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.logging.level, "warn");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(CliArgs::try_parse_from(["overmind", "--port", "70000"]).is_err());
    }
}
