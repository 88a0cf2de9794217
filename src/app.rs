use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::config::Config;
use crate::economics::FeeSchedule;
use crate::estimator::UnitPriceEstimator;
use crate::finder::OpportunityFinder;
use crate::gate::DecisionGate;
use crate::report::PipelineStats;
use crate::requote::jupiter::JupiterQuoteSource;
use crate::requote::{QuoteSource, RequoteStage};
use crate::shared::types::ValidatedOpportunity;
use crate::shared::utils::{format_roi, format_sol_signed};

/// Everything the pipeline needs at startup, resolved from the config file
/// and CLI overrides.
#[derive(Debug, Clone)]
pub struct AppCfg {
    pub config: Config,
    /// Seconds between periodic statistics summaries.
    pub stats_interval_secs: u64,
}

impl AppCfg {
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, stats_interval_secs: 60 })
    }
}

pub async fn run(app_cfg: AppCfg) -> Result<()> {
    let cfg = &app_cfg.config;
    info!("Starting two-stage opportunity validation pipeline");
    info!(
        "   {} markets, {} scan workers, quote source {}",
        cfg.markets.len(),
        cfg.finder.worker_count,
        cfg.quote_source.url,
    );

    let stats = Arc::new(PipelineStats::new());
    let estimator = Arc::new(UnitPriceEstimator::new(cfg.estimator));
    let markets = cfg.market_pairs()?;

    // Seed histories so scanning produces estimates before the first
    // authoritative quote lands.
    for (market, pair) in cfg.markets.iter().zip(markets.iter()) {
        if let Some(seed) = &market.seed_ratio {
            estimator.record(pair, seed.in_amount, seed.out_amount).await;
            info!(
                "🌱 Seeded {} with ratio {} -> {}",
                pair.symbol, seed.in_amount, seed.out_amount
            );
        }
    }

    let source: Arc<dyn QuoteSource> = Arc::new(JupiterQuoteSource::new(&cfg.quote_source)?);

    // Candidate channel sized so a short re-quote stall does not immediately
    // drop fresh candidates, while a real stall sheds load at the finder.
    let (candidate_tx, candidate_rx) = mpsc::channel(cfg.requote.max_in_flight * 4);
    let (outcome_tx, outcome_rx) = mpsc::channel(cfg.requote.max_in_flight * 4);
    let (exec_tx, exec_rx) = mpsc::channel(64);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let finder = Arc::new(OpportunityFinder::new(
        cfg.finder,
        cfg.economics,
        FeeSchedule::default(),
        Arc::clone(&estimator),
        markets,
        Arc::clone(&stats),
    ));
    let finder_handles = finder.spawn(candidate_tx, shutdown_rx.clone());

    let requote = Arc::new(RequoteStage::new(
        cfg.requote,
        cfg.economics,
        FeeSchedule::default(),
        source,
        Arc::clone(&estimator),
        Arc::clone(&stats),
    ));
    let requote_handle = tokio::spawn(requote.run(candidate_rx, outcome_tx));

    let gate = DecisionGate::new(cfg.finder.min_profit_lamports, Arc::clone(&stats));
    let gate_handle = tokio::spawn(gate.run(outcome_rx, exec_tx));

    let sink_handle = tokio::spawn(execution_sink(exec_rx));

    // Periodic stats until Ctrl-C.
    let mut stats_ticker =
        tokio::time::interval(Duration::from_secs(app_cfg.stats_interval_secs.max(1)));
    stats_ticker.tick().await; // first tick is immediate, skip it
    loop {
        tokio::select! {
            _ = stats_ticker.tick() => {
                stats.print_summary();
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!("Ctrl-C handler failed: {}", e);
                }
                info!("🛑 Shutdown requested");
                break;
            }
        }
    }

    // Ordered teardown: finder workers stop ticking and drop the candidate
    // sender, the re-quote stage drains and closes outcomes, the gate and
    // sink exit when their channels empty.
    let _ = shutdown_tx.send(true);
    for handle in finder_handles {
        let _ = handle.await;
    }
    let _ = requote_handle.await;
    let _ = gate_handle.await;
    let _ = sink_handle.await;

    stats.print_summary();
    info!("Pipeline stopped");
    Ok(())
}

/// Dry-run execution collaborator: logs every validated opportunity it
/// receives instead of building a transaction.
async fn execution_sink(mut validated: mpsc::Receiver<ValidatedOpportunity>) {
    while let Some(opportunity) = validated.recv().await {
        let net = opportunity.authoritative_net_profit.unwrap_or_default();
        info!(
            "🚀 Execution handoff: {} {:?} net {} ({}) route {:?}",
            opportunity.candidate.pair.symbol,
            opportunity.classification,
            format_sol_signed(net),
            format_roi(net, opportunity.candidate.pair.amount_in),
            opportunity.authoritative_out,
        );
    }
    info!("Execution sink stopped");
}
