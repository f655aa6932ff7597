//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// convstats - conversation statistics for conversational-AI desks
///
/// Fetches the conversations of a desk over a trailing time window,
/// reports engagement, funnel and ERV statistics, and saves the
/// filtered conversations as JSON.
///
/// Examples:
///   convstats --desk-id <DESK> --account-slug acme --api-key <KEY>
///   convstats --client smart-compass --period month
///   convstats --days 14 --stats-output stats.json
///   convstats --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .convstats.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Client profile to use ([clients.<SLUG>] in the config file)
    #[arg(long, value_name = "SLUG")]
    pub client: Option<String>,

    /// API base URL
    #[arg(long, value_name = "URL", env = "CONVSTATS_BASE_URL")]
    pub base_url: Option<String>,

    /// Desk whose conversations are fetched
    #[arg(long, value_name = "ID", env = "CONVSTATS_DESK_ID")]
    pub desk_id: Option<String>,

    /// Account slug used to scope the request
    #[arg(long, value_name = "SLUG", env = "CONVSTATS_ACCOUNT_SLUG")]
    pub account_slug: Option<String>,

    /// API key
    #[arg(long, value_name = "KEY", env = "CONVSTATS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Time window preset
    #[arg(long, value_name = "PERIOD")]
    pub period: Option<Period>,

    /// Time window length in days (overrides --period)
    #[arg(long, value_name = "DAYS")]
    pub days: Option<u32>,

    /// Conversations requested per page
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// Stop after this many pages
    #[arg(long, value_name = "COUNT")]
    pub max_pages: Option<u32>,

    /// Drop conversations whose creation time is missing or unparseable
    ///
    /// By default they are kept, since they cannot be placed outside the window.
    #[arg(long)]
    pub strict_timestamps: bool,

    /// Do not assume the API returns newest conversations first
    ///
    /// Every page is read and out-of-window conversations are skipped,
    /// instead of stopping at the first conversation older than the window.
    #[arg(long)]
    pub unordered: bool,

    /// Output file for the filtered conversations
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Also write the statistics as JSON to this file
    #[arg(long, value_name = "FILE")]
    pub stats_output: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .convstats.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Time window presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Period {
    /// Last 7 days
    Week,
    /// Last 30 days
    Month,
    /// Last 90 days
    Quarter,
    /// Same as quarter: the longest window the report covers
    All,
}

impl Period {
    pub fn days(self) -> u32 {
        match self {
            Period::Week => 7,
            Period::Month => 30,
            Period::Quarter | Period::All => 90,
        }
    }
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref url) = self.base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Base URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(page_size) = self.page_size {
            if page_size == 0 || page_size > crate::config::MAX_PAGE_SIZE {
                return Err(format!(
                    "Page size must be between 1 and {}",
                    crate::config::MAX_PAGE_SIZE
                ));
            }
        }

        if self.days == Some(0) {
            return Err("Days must be at least 1".to_string());
        }

        if self.max_pages == Some(0) {
            return Err("Max pages must be at least 1".to_string());
        }

        if let Some(ref config_path) = self.config {
            if !config_path.is_file() {
                return Err(format!(
                    "Config file does not exist: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
