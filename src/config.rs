//! Configuration file handling.
//!
//! This module handles loading `.convstats.toml`, selecting a client
//! profile, and merging command-line overrides on top.

use crate::cli::Args;
use crate::models::{ErvSource, PageOrdering, TimestampPolicy};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".convstats.toml";

/// Largest page size the API accepts.
pub const MAX_PAGE_SIZE: u32 = 400;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// API endpoint and credentials.
    #[serde(default)]
    pub api: ApiConfig,

    /// Time window and record filtering.
    #[serde(default)]
    pub window: WindowConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// Output files.
    #[serde(default)]
    pub output: OutputConfig,

    /// Named client profiles, selected with `--client`.
    #[serde(default)]
    pub clients: BTreeMap<String, ClientProfile>,
}

/// API endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Desk whose conversations are fetched.
    #[serde(default)]
    pub desk_id: String,

    /// API key sent as `Authorization: apikey <key>`.
    #[serde(default)]
    pub api_key: String,

    /// Account scope passed as the `account_slug` query parameter.
    #[serde(default)]
    pub account_slug: String,

    /// Name shown in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Conversations requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Request timeout in seconds (none by default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    /// Stop after this many pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_pages: Option<u32>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            desk_id: String::new(),
            api_key: String::new(),
            account_slug: String::new(),
            display_name: None,
            page_size: default_page_size(),
            timeout_seconds: None,
            max_pages: None,
        }
    }
}

fn default_base_url() -> String {
    "https://api.moveo.ai/api/v1".to_string()
}

fn default_page_size() -> u32 {
    50
}

/// Time window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Length of the trailing window in days.
    #[serde(default = "default_days")]
    pub days: u32,

    /// Handling of conversations without a usable creation time.
    #[serde(default)]
    pub timestamp_policy: TimestampPolicy,

    /// Order the API returns conversations in.
    #[serde(default)]
    pub ordering: PageOrdering,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            timestamp_policy: TimestampPolicy::default(),
            ordering: PageOrdering::default(),
        }
    }
}

fn default_days() -> u32 {
    90
}

/// Aggregation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Key holding the monetary value.
    #[serde(default = "default_erv_variable")]
    pub erv_variable: String,

    /// Whether the ERV key lives under `context.live_instructions` or `context`.
    #[serde(default)]
    pub erv_source: ErvSource,

    /// Tag whose conversations get their own interaction curve.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_key: Option<String>,

    /// Funnel stage tags, in report order.
    #[serde(default = "default_funnel_tags")]
    pub funnel_tags: Vec<String>,

    /// Currency symbol stripped when parsing and shown when formatting.
    #[serde(default = "default_currency_symbol")]
    pub currency_symbol: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            erv_variable: default_erv_variable(),
            erv_source: ErvSource::default(),
            tag_key: None,
            funnel_tags: default_funnel_tags(),
            currency_symbol: default_currency_symbol(),
        }
    }
}

fn default_erv_variable() -> String {
    "ERV".to_string()
}

fn default_funnel_tags() -> Vec<String> {
    vec!["nao_conheco", "sou_eu", "bloquear"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_currency_symbol() -> String {
    crate::analysis::erv::DEFAULT_CURRENCY_SYMBOL.to_string()
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Where the filtered conversations are written.
    #[serde(default = "default_conversations_file")]
    pub conversations_file: String,

    /// Optional JSON statistics report.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_file: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            conversations_file: default_conversations_file(),
            stats_file: None,
        }
    }
}

fn default_conversations_file() -> String {
    "conversations_last_3_months.json".to_string()
}

/// Per-client overrides. Unset fields keep the base configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Defaults to the profile's key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erv_variable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub erv_source: Option<ErvSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funnel_tags: Option<Vec<String>>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Overlay the named client profile onto the base settings.
    pub fn apply_profile(&mut self, slug: &str) -> Result<()> {
        let profile = match self.clients.get(slug) {
            Some(profile) => profile.clone(),
            None => {
                let known: Vec<&str> = self.clients.keys().map(String::as_str).collect();
                bail!(
                    "Unknown client profile '{}' (configured: {})",
                    slug,
                    if known.is_empty() {
                        "none".to_string()
                    } else {
                        known.join(", ")
                    }
                );
            }
        };

        self.api.account_slug = profile.account_slug.unwrap_or_else(|| slug.to_string());
        if let Some(base_url) = profile.base_url {
            self.api.base_url = base_url;
        }
        if let Some(desk_id) = profile.desk_id {
            self.api.desk_id = desk_id;
        }
        if let Some(api_key) = profile.api_key {
            self.api.api_key = api_key;
        }
        if profile.display_name.is_some() {
            self.api.display_name = profile.display_name;
        }
        if let Some(erv_variable) = profile.erv_variable {
            self.analysis.erv_variable = erv_variable;
        }
        if let Some(erv_source) = profile.erv_source {
            self.analysis.erv_source = erv_source;
        }
        if profile.tag_key.is_some() {
            self.analysis.tag_key = profile.tag_key;
        }
        if let Some(funnel_tags) = profile.funnel_tags {
            self.analysis.funnel_tags = funnel_tags;
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings; only
    /// values given explicitly on the command line (or via env) override.
    pub fn merge_with_args(&mut self, args: &Args) {
        if let Some(ref base_url) = args.base_url {
            self.api.base_url = base_url.clone();
        }
        if let Some(ref desk_id) = args.desk_id {
            self.api.desk_id = desk_id.clone();
        }
        if let Some(ref api_key) = args.api_key {
            self.api.api_key = api_key.clone();
        }
        if let Some(ref account_slug) = args.account_slug {
            self.api.account_slug = account_slug.clone();
        }
        if let Some(page_size) = args.page_size {
            self.api.page_size = page_size;
        }
        if let Some(max_pages) = args.max_pages {
            self.api.max_pages = Some(max_pages);
        }

        // An explicit day count wins over a period preset
        if let Some(days) = args.days {
            self.window.days = days;
        } else if let Some(period) = args.period {
            self.window.days = period.days();
        }

        if args.strict_timestamps {
            self.window.timestamp_policy = TimestampPolicy::Strict;
        }
        if args.unordered {
            self.window.ordering = PageOrdering::Unordered;
        }

        if let Some(ref output) = args.output {
            self.output.conversations_file = output.display().to_string();
        }
        if let Some(ref stats) = args.stats_output {
            self.output.stats_file = Some(stats.display().to_string());
        }
    }

    /// Check that the merged configuration can drive a run.
    pub fn validate(&self) -> Result<()> {
        let api = &self.api;

        if api.desk_id.trim().is_empty() {
            bail!("No desk id configured (set [api].desk_id or pass --desk-id)");
        }
        if api.api_key.trim().is_empty() {
            bail!("No API key configured (set [api].api_key, CONVSTATS_API_KEY or --api-key)");
        }
        if api.account_slug.trim().is_empty() {
            bail!("No account slug configured (set [api].account_slug or pass --account-slug)");
        }
        if !api.base_url.starts_with("http://") && !api.base_url.starts_with("https://") {
            bail!("Base URL must start with 'http://' or 'https://'");
        }
        if api.page_size == 0 || api.page_size > MAX_PAGE_SIZE {
            bail!("Page size must be between 1 and {}", MAX_PAGE_SIZE);
        }
        if self.window.days == 0 {
            bail!("Window must be at least 1 day");
        }
        if self.output.conversations_file.trim().is_empty() {
            bail!("Output file path is empty");
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let mut config = Config::default();
        config.clients.insert(
            "example-account".to_string(),
            ClientProfile {
                display_name: Some("Example Account".to_string()),
                desk_id: Some("00000000-0000-0000-0000-000000000000".to_string()),
                api_key: Some("replace-me".to_string()),
                tag_key: Some("sou_eu".to_string()),
                ..ClientProfile::default()
            },
        );
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
