//! convstats - conversation statistics for conversational-AI desks
//!
//! Pulls every conversation of a desk created within a trailing time
//! window, prints engagement, funnel and ERV statistics, and saves the
//! filtered conversations as JSON.
//!
//! Exit codes:
//!   0 - Success (including partial results after a failed request)
//!   1 - Configuration error or failure to write output

mod analysis;
mod cli;
mod config;
mod fetch;
mod models;
mod output;
mod report;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, DEFAULT_CONFIG_FILE};
use fetch::{ApiClient, ClientSettings, FetchConfig, Fetcher, StopReason};
use models::{ReportMetadata, StatsReport, TimeWindow};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("convstats v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    if let Err(e) = run(args).await {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle --init-config: generate a default .convstats.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", DEFAULT_CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", DEFAULT_CONFIG_FILE);
    println!("   Fill in desk_id, api_key and account_slug, or add client profiles.");
    Ok(())
}

/// Initialize logging. `RUST_LOG` wins over the verbosity flags.
fn init_logging(args: &Args) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level().to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Fetch, analyze and persist one desk's conversations.
async fn run(args: Args) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    if let Some(ref slug) = args.client {
        config.apply_profile(slug)?;
        info!("Using client profile: {}", slug);
    }
    config.merge_with_args(&args);
    config.validate()?;

    let window = TimeWindow::trailing(Utc::now(), config.window.days);
    let currency = config.analysis.currency_symbol.clone();

    if let Some(ref name) = config.api.display_name {
        println!("🏢 Account: {} ({})", name, config.api.account_slug);
    }
    println!("📥 Fetching conversations from {}", window);

    // Step 1: pull the conversations inside the window
    let client = ApiClient::new(&ClientSettings::from(&config.api))
        .context("Failed to build HTTP client")?;
    debug!("Endpoint: {}", client.url());

    let fetch_config = FetchConfig {
        window,
        timestamp_policy: config.window.timestamp_policy,
        ordering: config.window.ordering,
        max_pages: config.api.max_pages,
        show_progress: !args.quiet,
    };
    let outcome = Fetcher::new(client, fetch_config).fetch_all().await;

    println!(
        "\n📦 Total conversations fetched from the last {} days: {}",
        window.days(),
        outcome.conversations.len()
    );
    match outcome.stop_reason {
        StopReason::RequestFailed => {
            println!("   ⚠️  A request failed; results are partial.");
        }
        StopReason::PageLimit => {
            println!(
                "   ⚠️  Stopped after {} pages; older conversations were not fetched.",
                outcome.pages_fetched
            );
        }
        _ => {}
    }

    // Step 2: statistics
    let settings = analysis::AggregationSettings::from(&config.analysis);
    let statistics = analysis::analyze(&outcome.conversations, &settings);
    print!("{}", report::generate_text_report(&statistics, &currency));

    // Step 3: persist the filtered conversations (even when empty or
    // partial), then the optional statistics report
    let stats_report = config.output.stats_file.as_ref().map(|path| {
        let metadata = ReportMetadata {
            generated_at: Utc::now(),
            account_slug: config.api.account_slug.clone(),
            display_name: config.api.display_name.clone(),
            window,
            partial: outcome.is_partial(),
        };
        (Path::new(path), StatsReport::new(metadata, statistics))
    });

    let conversations_file = Path::new(&config.output.conversations_file);
    let stats_written = output::persist(
        conversations_file,
        &outcome.conversations,
        stats_report.as_ref().map(|(path, report)| (*path, report)),
    )?;

    if outcome.conversations.is_empty() {
        warn!("No conversations in the window; wrote an empty list");
    }
    println!(
        "\n✅ Conversations saved to: {} ({:.1}s)",
        conversations_file.display(),
        start_time.elapsed().as_secs_f64()
    );
    match (&stats_report, stats_written) {
        (Some((path, _)), true) => println!("📊 Statistics saved to: {}", path.display()),
        (Some((path, _)), false) => {
            eprintln!("⚠️  Could not write statistics to {}", path.display())
        }
        (None, _) => {}
    }

    Ok(())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
