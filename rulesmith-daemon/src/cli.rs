//! CLI argument definitions for rulesmith-daemon.

use std::path::PathBuf;

use clap::Parser;

use rulesmith_core::config::RulesmithConfig;

/// IDS alert-driven rule generation daemon.
///
/// Tails the sensor alert log, analyzes alerts in batches, and deploys
/// generated rules back to the sensor.
#[derive(Parser, Debug)]
#[command(name = "rulesmith-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to rulesmith.toml configuration file.
    #[arg(short, long, default_value = "/etc/rulesmith/rulesmith.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,

    /// Override the analysis backend (remote, local).
    #[arg(long)]
    pub backend: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of file and environment values.
    pub fn apply_overrides(&self, config: &mut RulesmithConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(backend) = &self.backend {
            config.analysis.backend = backend.clone();
        }
    }
}
