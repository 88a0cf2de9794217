//! Unit-price estimator
//!
//! Keeps a small per-pair history of observed exchange ratios and projects
//! a gross output for a trade size without touching the network. Every
//! successful authoritative re-quote feeds back into the history, so the
//! fast path stays calibrated against ground truth. The estimate is allowed
//! to be wrong in both directions — the re-quote stage is the correctness
//! backstop.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::shared::errors::EngineError;
use crate::shared::types::{MarketPair, PairKey};

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EstimatorConfig {
    /// Observations kept per pair.
    pub history_size: usize,
    /// Observations older than this are evicted and ignored.
    pub stale_horizon_ms: u64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self { history_size: 8, stale_horizon_ms: 30_000 }
    }
}

impl EstimatorConfig {
    pub fn stale_horizon(&self) -> Duration {
        Duration::from_millis(self.stale_horizon_ms)
    }
}

/// One observed exchange: `in_amount` of the input token bought
/// `out_amount` of the output token. The ratio is kept as the exact pair,
/// never collapsed to a float.
#[derive(Debug, Clone, Copy)]
struct RatioObservation {
    in_amount: u64,
    out_amount: u64,
    at: Instant,
}

/// Bounded, time-limited window of recent observations for one pair.
#[derive(Debug)]
pub struct RatioHistory {
    window: VecDeque<RatioObservation>,
    capacity: usize,
    horizon: Duration,
}

impl RatioHistory {
    fn new(capacity: usize, horizon: Duration) -> Self {
        Self { window: VecDeque::with_capacity(capacity), capacity, horizon }
    }

    fn push(&mut self, in_amount: u64, out_amount: u64) {
        if in_amount == 0 {
            return; // a zero-input observation carries no ratio
        }
        self.evict(Instant::now());
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(RatioObservation { in_amount, out_amount, at: Instant::now() });
    }

    fn evict(&mut self, now: Instant) {
        while let Some(front) = self.window.front() {
            if now.duration_since(front.at) > self.horizon {
                self.window.pop_front();
            } else {
                break;
            }
        }
    }

    /// Project the output for `amount_in` as a linearly-weighted mean over
    /// the non-stale window, newest observation weighted heaviest. All
    /// arithmetic in u128; returns None with no usable history.
    fn projected_out(&self, amount_in: u64) -> Option<u64> {
        let now = Instant::now();
        let mut weighted_sum: u128 = 0;
        let mut weight_total: u128 = 0;
        let mut weight: u128 = 0;

        for obs in self.window.iter() {
            if now.duration_since(obs.at) > self.horizon {
                continue;
            }
            weight += 1;
            let projected = amount_in as u128 * obs.out_amount as u128 / obs.in_amount as u128;
            weighted_sum += projected * weight;
            weight_total += weight;
        }

        if weight_total == 0 {
            return None;
        }
        u64::try_from(weighted_sum / weight_total).ok()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}

/// Per-pair price-ratio histories behind per-pair locks.
///
/// The outer map is append-only (a pair's slot is created on first
/// observation and never removed), so scans contend only on the lock of
/// the pair they are reading — never on a process-wide lock.
pub struct UnitPriceEstimator {
    config: EstimatorConfig,
    pairs: RwLock<HashMap<PairKey, Arc<RwLock<RatioHistory>>>>,
}

impl UnitPriceEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config, pairs: RwLock::new(HashMap::new()) }
    }

    /// Fast profitability input: estimated gross output for the pair's
    /// trade size. `EstimationUnavailable` when the pair has no usable
    /// history — callers skip the pair rather than invent a zero.
    pub async fn estimate_out(&self, pair: &MarketPair) -> Result<u64, EngineError> {
        let history = {
            let pairs = self.pairs.read().await;
            pairs.get(&pair.key()).cloned()
        };
        let Some(history) = history else {
            return Err(EngineError::EstimationUnavailable { pair: pair.symbol.clone() });
        };
        let out = history
            .read()
            .await
            .projected_out(pair.amount_in)
            .ok_or_else(|| EngineError::EstimationUnavailable { pair: pair.symbol.clone() });
        out
    }

    /// Feed back an authoritative observation. Called on every successful
    /// re-quote completion; the per-pair write lock is taken at completion
    /// time, so concurrent re-quotes land last-writer-wins in completion
    /// order.
    pub async fn record(&self, pair: &MarketPair, in_amount: u64, out_amount: u64) {
        let history = self.history_slot(pair).await;
        history.write().await.push(in_amount, out_amount);
        debug!(
            "📈 Ratio recorded for {}: {} -> {}",
            pair.symbol, in_amount, out_amount
        );
    }

    /// Number of non-evicted observations for a pair, for stats/tests.
    pub async fn history_len(&self, pair: &MarketPair) -> usize {
        let history = {
            let pairs = self.pairs.read().await;
            pairs.get(&pair.key()).cloned()
        };
        match history {
            Some(h) => h.read().await.len(),
            None => 0,
        }
    }

    async fn history_slot(&self, pair: &MarketPair) -> Arc<RwLock<RatioHistory>> {
        {
            let pairs = self.pairs.read().await;
            if let Some(existing) = pairs.get(&pair.key()) {
                return existing.clone();
            }
        }
        let mut pairs = self.pairs.write().await;
        pairs
            .entry(pair.key())
            .or_insert_with(|| {
                Arc::new(RwLock::new(RatioHistory::new(
                    self.config.history_size.max(1),
                    self.config.stale_horizon(),
                )))
            })
            .clone()
    }
}
