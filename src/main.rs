mod app;
mod config;
mod economics;
mod estimator;
mod finder;
mod gate;
mod report;
mod requote;
mod shared;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "Two-stage opportunity validation pipeline for Solana circular arbitrage")]
struct Args {
    /// Path to config file
    #[arg(long, default_value = "Config.toml")]
    config: String,

    /// Scan workers (overrides config)
    #[arg(long)]
    workers: Option<usize>,

    /// Scan interval in milliseconds (overrides config)
    #[arg(long)]
    scan_interval_ms: Option<u64>,

    /// Minimum net profit in lamports (overrides config)
    #[arg(long)]
    min_profit_lamports: Option<u64>,

    /// Concurrent re-quotes in flight (overrides config)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Quote API base URL (overrides config)
    #[arg(long)]
    quote_url: Option<String>,

    /// Seconds between statistics summaries
    #[arg(long, default_value = "60")]
    stats_interval: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut config = config::Config::from_file(&args.config)?;

    // CLI args > config file > defaults
    if let Some(workers) = args.workers {
        config.finder.worker_count = workers;
    }
    if let Some(interval) = args.scan_interval_ms {
        config.finder.scan_interval_ms = interval;
    }
    if let Some(min_profit) = args.min_profit_lamports {
        config.finder.min_profit_lamports = min_profit;
    }
    if let Some(in_flight) = args.max_in_flight {
        config.requote.max_in_flight = in_flight;
    }
    if let Some(url) = args.quote_url {
        config.quote_source.url = url;
    }

    let mut app_cfg = app::AppCfg::from_config(config)?;
    app_cfg.stats_interval_secs = args.stats_interval;

    app::run(app_cfg).await
}
