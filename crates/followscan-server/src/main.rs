//! Followscan Server - HTTP surface for the followscan pipeline.
//!
//! Exposes run triggering, status and the merged result snapshot to a
//! dashboard. `--once` runs a single pass and exits instead.

mod handler;
mod server;

use anyhow::{bail, Result};
use clap::Parser;
use followscan_core::{FetchOptions, Orchestrator, PipelineConfig, PipelineDefaults, RunState};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "followscan-server")]
#[command(about = "Listing to follower-count pipeline with an HTTP dashboard API")]
struct Args {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "8000")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Listing page to discover projects from
    #[arg(long, default_value = PipelineDefaults::LISTING_URL)]
    listing_url: String,

    /// Maximum number of projects per run
    #[arg(long, default_value_t = PipelineDefaults::LIMIT)]
    limit: usize,

    /// Maximum listing pages to follow (1 disables pagination)
    #[arg(long, default_value_t = PipelineDefaults::MAX_PAGES)]
    max_pages: u32,

    /// Minimum spacing between requests to one host, in milliseconds
    #[arg(long, default_value_t = PipelineDefaults::MIN_INTERVAL.as_millis() as u64)]
    min_interval_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 15)]
    timeout_secs: u64,

    /// Retries after a transient fetch failure
    #[arg(long, default_value_t = 3)]
    retries: u32,

    /// Profile URL template; `{handle}` is substituted
    #[arg(long, default_value = PipelineDefaults::PROFILE_URL_TEMPLATE)]
    profile_url_template: String,

    /// Directory for snapshot exports (also loaded at startup)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Trigger a run every N seconds
    #[arg(long)]
    interval_secs: Option<u64>,

    /// Refresh prices and market caps every N seconds (0 disables)
    #[arg(long, default_value_t = PipelineDefaults::MARKET_REFRESH_INTERVAL.as_secs())]
    market_refresh_secs: u64,

    /// Bearer token required by POST /results
    #[arg(long, env = "FOLLOWSCAN_INGEST_TOKEN")]
    ingest_token: Option<String>,

    /// Run the pipeline once, print the outcome and exit
    #[arg(long)]
    once: bool,
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        let page_param = (self.max_pages > 1).then(|| PipelineDefaults::PAGE_PARAM.to_string());
        PipelineConfig::new(&self.listing_url)
            .with_limit(self.limit)
            .with_page_param(page_param)
            .with_max_pages(self.max_pages)
            .with_min_interval(Duration::from_millis(self.min_interval_ms))
            .with_profile_url_template(&self.profile_url_template)
            .with_fetch_options(
                FetchOptions::default()
                    .with_timeout(Duration::from_secs(self.timeout_secs))
                    .with_max_retries(self.retries),
            )
            .with_data_dir(self.data_dir.clone())
    }
}

fn init_logging(debug: bool, json: bool) {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false);
    if json {
        builder.json().init();
    } else {
        builder.compact().init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.debug, args.json_logs);

    info!("Starting followscan server");

    let config = args.pipeline_config();
    info!(
        "Listing {} (limit {}, {} ms between requests per host)",
        config.listing_url,
        config.limit,
        config.min_interval.as_millis()
    );
    let orchestrator = Orchestrator::with_reqwest(config)?;

    if args.once {
        let status = orchestrator.run_to_completion().await?;
        println!("{}: {}", status.state, status.message);
        if status.state != RunState::Succeeded {
            bail!("run ended in state {}", status.state);
        }
        return Ok(());
    }

    if let Some(secs) = args.interval_secs.filter(|secs| *secs > 0) {
        info!("Scheduling a run every {} seconds", secs);
        orchestrator.spawn_schedule(Duration::from_secs(secs));
    }
    if args.market_refresh_secs > 0 {
        info!("Refreshing market data every {} seconds", args.market_refresh_secs);
        orchestrator.spawn_market_refresh(Duration::from_secs(args.market_refresh_secs));
    }

    let addr = server::start_server(orchestrator, args.ingest_token, &args.host, args.port).await?;
    info!("Followscan server running on http://{}", addr);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
