//! Opportunity finder worker pool
//!
//! A fixed pool of workers, each on its own timer, scanning a disjoint
//! partition of the configured market pairs through the unit-price
//! estimator. Pairs whose estimated net profit clears the minimum-profit
//! threshold become candidates for the authoritative re-quote stage.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::economics::{net_profit, EconomicsConfig, FeeSchedule};
use crate::estimator::UnitPriceEstimator;
use crate::report::PipelineStats;
use crate::shared::errors::EngineError;
use crate::shared::types::{CandidateOpportunity, MarketPair};
use crate::shared::utils::{format_sol_signed, generate_id, now_unix_ms};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FinderConfig {
    /// Scan workers; each owns a disjoint partition of the market pairs.
    pub worker_count: usize,
    pub scan_interval_ms: u64,
    /// Admission threshold in smallest units; a candidate's estimated net
    /// profit must strictly exceed this to reach the re-quote stage.
    pub min_profit_lamports: u64,
    /// Every N ticks a worker re-checks its best sub-threshold pair through
    /// stage 2 anyway, to recover drifted pairs and recalibrate history.
    /// 0 disables forced rechecks.
    pub force_recheck_ticks: u64,
}

impl Default for FinderConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            scan_interval_ms: 200,
            min_profit_lamports: 1_000_000,
            force_recheck_ticks: 50,
        }
    }
}

impl FinderConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

/// Split pairs into `worker_count` disjoint chunks. Every pair lands in
/// exactly one partition, which is what guarantees no pair is ever scanned
/// by two workers.
pub fn partition_pairs(pairs: &[MarketPair], worker_count: usize) -> Vec<Vec<MarketPair>> {
    let worker_count = worker_count.max(1);
    let chunk = pairs.len().div_ceil(worker_count);
    if chunk == 0 {
        return Vec::new();
    }
    pairs.chunks(chunk).map(|c| c.to_vec()).collect()
}

pub struct OpportunityFinder {
    config: FinderConfig,
    economics: EconomicsConfig,
    fees: FeeSchedule,
    estimator: Arc<UnitPriceEstimator>,
    markets: Vec<MarketPair>,
    stats: Arc<PipelineStats>,
}

impl OpportunityFinder {
    pub fn new(
        config: FinderConfig,
        economics: EconomicsConfig,
        fees: FeeSchedule,
        estimator: Arc<UnitPriceEstimator>,
        markets: Vec<MarketPair>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { config, economics, fees, estimator, markets, stats }
    }

    /// Spawn the worker pool. Returns one handle per worker; all workers
    /// exit once `shutdown` flips or the candidate channel closes.
    pub fn spawn(
        self: Arc<Self>,
        candidates: mpsc::Sender<CandidateOpportunity>,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        let partitions = partition_pairs(&self.markets, self.config.worker_count);
        info!(
            "🔍 Opportunity finder: {} workers over {} pairs, interval {}ms, min profit {} lamports",
            partitions.len(),
            self.markets.len(),
            self.config.scan_interval_ms,
            self.config.min_profit_lamports,
        );

        partitions
            .into_iter()
            .enumerate()
            .map(|(worker_id, partition)| {
                let finder = Arc::clone(&self);
                let tx = candidates.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    finder.scan_worker(worker_id, partition, tx, shutdown).await;
                })
            })
            .collect()
    }

    async fn scan_worker(
        &self,
        worker_id: usize,
        partition: Vec<MarketPair>,
        tx: mpsc::Sender<CandidateOpportunity>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        // Stagger worker start times so the pool does not tick in lockstep
        // and burst the estimator locks and the candidate channel.
        let stagger = self.config.scan_interval() * worker_id as u32
            / self.config.worker_count.max(1) as u32;
        if !stagger.is_zero() {
            tokio::time::sleep(stagger).await;
        }

        info!("⚙️ Scan worker {} started with {} pairs", worker_id, partition.len());
        let mut ticker = tokio::time::interval(self.config.scan_interval());
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut tick: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("⚙️ Scan worker {} stopping", worker_id);
                        return;
                    }
                    continue;
                }
            }
            tick += 1;

            let force_this_tick = self.config.force_recheck_ticks > 0
                && tick % self.config.force_recheck_ticks == 0;
            // Best pair that missed the threshold this tick, kept around in
            // case this is a forced-recheck tick.
            let mut best_miss: Option<CandidateOpportunity> = None;

            for pair in &partition {
                PipelineStats::bump(&self.stats.pairs_scanned);
                match self.evaluate_pair(pair).await {
                    Ok(candidate) if candidate.estimated_net_profit
                        > self.config.min_profit_lamports as i64 =>
                    {
                        self.emit(&tx, candidate, worker_id).await;
                    }
                    Ok(candidate) => {
                        if force_this_tick {
                            let better = best_miss
                                .as_ref()
                                .map(|b| candidate.estimated_net_profit > b.estimated_net_profit)
                                .unwrap_or(true);
                            if better {
                                best_miss = Some(candidate);
                            }
                        }
                    }
                    Err(EngineError::EstimationUnavailable { pair }) => {
                        debug!("Worker {}: no history yet for {}, skipped", worker_id, pair);
                    }
                    Err(err) => {
                        // A single pair's failure never aborts the worker.
                        warn!("Worker {}: evaluation failed for {}: {}", worker_id, pair.symbol, err);
                    }
                }
            }

            if let Some(mut candidate) = best_miss {
                candidate.forced = true;
                PipelineStats::bump(&self.stats.forced_rechecks);
                debug!(
                    "Worker {}: forced recheck of {} (estimated {})",
                    worker_id,
                    candidate.pair.symbol,
                    format_sol_signed(candidate.estimated_net_profit),
                );
                self.emit(&tx, candidate, worker_id).await;
            }

            if tx.is_closed() {
                warn!("Worker {}: candidate channel closed, exiting", worker_id);
                return;
            }
        }
    }

    /// Evaluate one pair through the estimator and the economics model.
    async fn evaluate_pair(&self, pair: &MarketPair) -> Result<CandidateOpportunity, EngineError> {
        let estimated_out = self.estimator.estimate_out(pair).await?;
        let costs = self.fees.total_cost(&self.economics, pair.amount_in);
        let estimated_net = net_profit(pair.amount_in, estimated_out, &costs);

        Ok(CandidateOpportunity {
            id: generate_id(),
            pair: pair.clone(),
            estimated_out,
            estimated_costs: costs,
            estimated_net_profit: estimated_net,
            forced: false,
            discovered_at: std::time::Instant::now(),
            discovered_at_ms: now_unix_ms(),
        })
    }

    /// Hand a candidate to the re-quote stage without blocking the scan.
    /// A full channel means stage 2 is saturated; freshness beats
    /// completeness, so the candidate is dropped and counted.
    async fn emit(
        &self,
        tx: &mpsc::Sender<CandidateOpportunity>,
        candidate: CandidateOpportunity,
        worker_id: usize,
    ) {
        match tx.try_send(candidate) {
            Ok(()) => {
                PipelineStats::bump(&self.stats.candidates_emitted);
            }
            Err(mpsc::error::TrySendError::Full(candidate)) => {
                PipelineStats::bump(&self.stats.candidates_dropped);
                debug!(
                    "Worker {}: re-quote stage saturated, dropped candidate for {}",
                    worker_id, candidate.pair.symbol
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::EstimatorConfig;
    use solana_sdk::pubkey::Pubkey;
    use std::collections::HashSet;

    fn pairs(n: usize) -> Vec<MarketPair> {
        (0..n)
            .map(|i| MarketPair {
                input_mint: Pubkey::new_unique(),
                output_mint: Pubkey::new_unique(),
                symbol: format!("PAIR-{}", i),
                amount_in: 1_000_000_000,
            })
            .collect()
    }

    #[test]
    fn partitions_are_disjoint_and_complete() {
        for worker_count in 1..=8 {
            for pair_count in 0..=17 {
                let all = pairs(pair_count);
                let parts = partition_pairs(&all, worker_count);
                let mut seen = HashSet::new();
                for part in &parts {
                    for pair in part {
                        assert!(seen.insert(pair.key()), "pair assigned twice");
                    }
                }
                assert_eq!(seen.len(), pair_count, "pair missing from partitions");
                assert!(parts.len() <= worker_count);
            }
        }
    }

    fn finder_with(
        markets: Vec<MarketPair>,
        min_profit: u64,
    ) -> (Arc<OpportunityFinder>, Arc<UnitPriceEstimator>, Arc<PipelineStats>) {
        let estimator = Arc::new(UnitPriceEstimator::new(EstimatorConfig::default()));
        let stats = Arc::new(PipelineStats::new());
        let finder = Arc::new(OpportunityFinder::new(
            FinderConfig {
                worker_count: 2,
                scan_interval_ms: 10,
                min_profit_lamports: min_profit,
                force_recheck_ticks: 0,
            },
            EconomicsConfig { signature_count: 2, use_flash_loan: false },
            FeeSchedule::default(),
            Arc::clone(&estimator),
            markets,
            Arc::clone(&stats),
        ));
        (finder, estimator, stats)
    }

    #[tokio::test]
    async fn evaluate_pair_computes_net_profit() {
        let markets = pairs(1);
        let (finder, estimator, _stats) = finder_with(markets.clone(), 1_000_000);
        // ratio makes the round trip return 1.005 SOL on 1 SOL
        estimator.record(&markets[0], 1_000_000_000, 1_005_000_000).await;

        let candidate = finder.evaluate_pair(&markets[0]).await.unwrap();
        assert_eq!(candidate.estimated_out, 1_005_000_000);
        // 5_000_000 gross minus 10_000 base fee (2 signatures, no flash loan)
        assert_eq!(candidate.estimated_net_profit, 4_990_000);
        assert!(!candidate.forced);
    }

    #[tokio::test]
    async fn sub_threshold_pairs_never_reach_the_channel() {
        let markets = pairs(4);
        let (finder, estimator, _stats) = finder_with(markets.clone(), 1_000_000);
        // All pairs estimate at 500_000 gross profit: below threshold.
        for pair in &markets {
            estimator.record(pair, 1_000_000_000, 1_000_500_000).await;
        }

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = Arc::clone(&finder).spawn(tx, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(rx.try_recv().is_err(), "sub-threshold candidate was emitted");
    }

    #[tokio::test]
    async fn profitable_pairs_are_emitted_with_strict_threshold() {
        let markets = pairs(2);
        let (finder, estimator, _stats) = finder_with(markets.clone(), 1_000_000);
        // Pair 0 estimates 2_000_000 gross profit: admitted.
        estimator.record(&markets[0], 1_000_000_000, 1_002_000_000).await;
        // Pair 1 estimates exactly threshold + fees: not strictly above.
        estimator.record(&markets[1], 1_000_000_000, 1_001_010_000).await;

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = Arc::clone(&finder).spawn(tx, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        let mut symbols = HashSet::new();
        while let Ok(candidate) = rx.try_recv() {
            assert!(candidate.estimated_net_profit > 1_000_000);
            symbols.insert(candidate.pair.symbol.clone());
        }
        assert!(symbols.contains("PAIR-0"));
        assert!(!symbols.contains("PAIR-1"));
    }

    #[tokio::test]
    async fn forced_recheck_emits_best_sub_threshold_pair() {
        let markets = pairs(2);
        let estimator = Arc::new(UnitPriceEstimator::new(EstimatorConfig::default()));
        let stats = Arc::new(PipelineStats::new());
        let finder = Arc::new(OpportunityFinder::new(
            FinderConfig {
                worker_count: 1,
                scan_interval_ms: 10,
                min_profit_lamports: 1_000_000,
                force_recheck_ticks: 1, // force every tick
            },
            EconomicsConfig { signature_count: 2, use_flash_loan: false },
            FeeSchedule::default(),
            Arc::clone(&estimator),
            markets.clone(),
            stats,
        ));
        estimator.record(&markets[0], 1_000_000_000, 1_000_100_000).await;
        estimator.record(&markets[1], 1_000_000_000, 1_000_400_000).await;

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = Arc::clone(&finder).spawn(tx, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        let candidate = rx.try_recv().expect("forced candidate expected");
        assert!(candidate.forced);
        assert_eq!(candidate.pair.symbol, "PAIR-1");
        assert!(candidate.estimated_net_profit <= 1_000_000);
    }

    #[tokio::test]
    async fn missing_history_is_skipped_not_fatal() {
        let markets = pairs(3);
        let (finder, estimator, _stats) = finder_with(markets.clone(), 1_000_000);
        // Only one pair has history; the other two must be skipped quietly.
        estimator.record(&markets[2], 1_000_000_000, 1_005_000_000).await;

        let (tx, mut rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = Arc::clone(&finder).spawn(tx, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        let candidate = rx.try_recv().expect("the pair with history should emit");
        assert_eq!(candidate.pair.symbol, "PAIR-2");
    }

    #[tokio::test]
    async fn full_channel_drops_instead_of_blocking() {
        let markets = pairs(4);
        let (finder, estimator, stats) = finder_with(markets.clone(), 1_000_000);
        for pair in &markets {
            estimator.record(pair, 1_000_000_000, 1_010_000_000).await;
        }

        // Capacity 1 and no consumer: everything past the first try_send
        // must be dropped, and the workers must keep ticking.
        let (tx, _rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handles = Arc::clone(&finder).spawn(tx, shutdown_rx);

        tokio::time::sleep(Duration::from_millis(80)).await;
        shutdown_tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }

        use std::sync::atomic::Ordering;
        assert!(stats.candidates_dropped.load(Ordering::Relaxed) > 0);
    }
}
