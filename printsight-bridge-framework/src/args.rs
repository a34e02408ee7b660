//! CLI argument parsing for bridges.

use std::path::PathBuf;

use clap::Parser;
use printsight_common::LoggingConfig;

/// Common CLI arguments for all bridges.
///
/// Can be used standalone or flattened into a bridge-specific parser.
#[derive(Parser, Debug, Clone, Default)]
#[command(about = "PrintSight MQTT bridge")]
pub struct BridgeArgs {
    /// Path to configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long, global = true)]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Configuration path, falling back to the given default.
    pub fn config_path(&self, default_config: &str) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(default_config))
    }

    /// Whether `--config` was given explicitly.
    pub fn has_explicit_config(&self) -> bool {
        self.config.is_some()
    }

    /// Logging configuration with the `--log-level` override applied.
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        match &self.log_level {
            Some(level) => LoggingConfig {
                level: level.clone(),
                ..base.clone()
            },
            None => base.clone(),
        }
    }

    /// Parse CLI arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}
