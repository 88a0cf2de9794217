//! Authoritative re-quote stage
//!
//! Stage 2 of the validation pipeline. Consumes candidates from the finder,
//! re-prices each one against the live quote source under a concurrency
//! cap, and hands the outcome to the decision gate. The authoritative quote
//! always wins over the stage-1 estimate.

pub mod jupiter;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::economics::{net_profit, EconomicsConfig, FeeSchedule};
use crate::estimator::UnitPriceEstimator;
use crate::report::PipelineStats;
use crate::shared::errors::EngineError;
use crate::shared::types::{AuthoritativeQuote, CandidateOpportunity};

/// Live price oracle behind stage 2. One real implementation talks HTTP;
/// tests plug in deterministic mocks.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_in: u64,
    ) -> Result<AuthoritativeQuote, EngineError>;
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RequoteConfig {
    /// Concurrent re-quotes in flight at once.
    pub max_in_flight: usize,
    /// Staleness window: a candidate older than this is worthless.
    pub max_wait_ms: u64,
    /// Total quote attempts per candidate, first try included.
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    /// How long shutdown waits for in-flight re-quotes before aborting.
    pub drain_grace_ms: u64,
}

impl Default for RequoteConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            max_wait_ms: 2_000,
            max_attempts: 3,
            retry_base_delay_ms: 100,
            drain_grace_ms: 3_000,
        }
    }
}

impl RequoteConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn drain_grace(&self) -> Duration {
        Duration::from_millis(self.drain_grace_ms)
    }
}

/// What stage 2 learned about one candidate.
#[derive(Debug)]
pub enum RequoteOutcome {
    Quoted {
        candidate: CandidateOpportunity,
        quote: AuthoritativeQuote,
        net_profit: i64,
        costs: crate::economics::CostBreakdown,
    },
    Failed {
        candidate: CandidateOpportunity,
        error: EngineError,
    },
}

pub struct RequoteStage {
    config: RequoteConfig,
    economics: EconomicsConfig,
    fees: FeeSchedule,
    source: Arc<dyn QuoteSource>,
    estimator: Arc<UnitPriceEstimator>,
    stats: Arc<PipelineStats>,
}

impl RequoteStage {
    pub fn new(
        config: RequoteConfig,
        economics: EconomicsConfig,
        fees: FeeSchedule,
        source: Arc<dyn QuoteSource>,
        estimator: Arc<UnitPriceEstimator>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self { config, economics, fees, source, estimator, stats }
    }

    /// Main stage loop: runs until the candidate channel closes, then
    /// drains in-flight re-quotes within the grace window.
    pub async fn run(
        self: Arc<Self>,
        mut candidates: mpsc::Receiver<CandidateOpportunity>,
        outcomes: mpsc::Sender<RequoteOutcome>,
    ) {
        info!(
            "🎯 Re-quote stage up: {} in flight max, {}ms staleness window, {} attempts",
            self.config.max_in_flight, self.config.max_wait_ms, self.config.max_attempts,
        );

        let permits = Arc::new(Semaphore::new(self.config.max_in_flight));
        let mut in_flight: JoinSet<()> = JoinSet::new();

        while let Some(candidate) = candidates.recv().await {
            // Reap finished tasks so the set does not grow unbounded.
            while in_flight.try_join_next().is_some() {}

            let age = candidate.age_ms();
            if age > self.config.max_wait_ms {
                self.reject_stale(&outcomes, candidate, age).await;
                continue;
            }

            // Wait for a permit only as long as the candidate's remaining
            // staleness budget allows; past that it is dead anyway.
            let budget = Duration::from_millis(self.config.max_wait_ms.saturating_sub(age));
            let permit = match tokio::time::timeout(
                budget,
                Arc::clone(&permits).acquire_owned(),
            )
            .await
            {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return, // semaphore closed, stage shutting down
                Err(_) => {
                    let age = candidate.age_ms();
                    self.reject_stale(&outcomes, candidate, age).await;
                    continue;
                }
            };

            let stage = Arc::clone(&self);
            let tx = outcomes.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                stage.requote_one(candidate, tx).await;
            });
        }

        // Channel closed: drain what is still running, then cut losses.
        debug!("Re-quote stage draining {} in-flight tasks", in_flight.len());
        let drained = tokio::time::timeout(self.config.drain_grace(), async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                "⚠️ Re-quote drain grace expired, aborting {} tasks",
                in_flight.len()
            );
            in_flight.abort_all();
        }
        info!("🎯 Re-quote stage stopped");
    }

    async fn reject_stale(
        &self,
        outcomes: &mpsc::Sender<RequoteOutcome>,
        candidate: CandidateOpportunity,
        age_ms: u64,
    ) {
        PipelineStats::bump(&self.stats.stale_drops);
        debug!(
            "Candidate {} for {} stale at {}ms, skipping re-quote",
            candidate.id, candidate.pair.symbol, age_ms
        );
        let error = EngineError::StaleCandidate { age_ms, max_ms: self.config.max_wait_ms };
        let _ = outcomes.send(RequoteOutcome::Failed { candidate, error }).await;
    }

    /// Re-quote a single candidate with bounded retries, then compute the
    /// authoritative economics and ship the outcome to the gate.
    async fn requote_one(
        &self,
        candidate: CandidateOpportunity,
        outcomes: mpsc::Sender<RequoteOutcome>,
    ) {
        let result = self.quote_with_retry(&candidate).await;

        let outcome = match result {
            Ok(quote) => {
                PipelineStats::bump(&self.stats.requotes_completed);
                // Calibration feedback: the authoritative ratio sharpens
                // every later stage-1 estimate for this pair.
                self.estimator
                    .record(&candidate.pair, candidate.pair.amount_in, quote.out_amount)
                    .await;

                let costs = self.fees.total_cost(&self.economics, candidate.pair.amount_in);
                let net = net_profit(candidate.pair.amount_in, quote.out_amount, &costs);
                RequoteOutcome::Quoted { candidate, quote, net_profit: net, costs }
            }
            Err(error) => {
                PipelineStats::bump(&self.stats.requote_failures);
                RequoteOutcome::Failed { candidate, error }
            }
        };

        let _ = outcomes.send(outcome).await;
    }

    async fn quote_with_retry(
        &self,
        candidate: &CandidateOpportunity,
    ) -> Result<AuthoritativeQuote, EngineError> {
        let input_mint = candidate.pair.input_mint.to_string();
        let output_mint = candidate.pair.output_mint.to_string();
        let mut delay = self.config.retry_base_delay();
        let mut last_error = None;

        for attempt in 1..=self.config.max_attempts.max(1) {
            match self
                .source
                .quote(&input_mint, &output_mint, candidate.pair.amount_in)
                .await
            {
                Ok(quote) => return Ok(quote),
                Err(err) if err.is_transient() && attempt < self.config.max_attempts => {
                    debug!(
                        "Re-quote attempt {}/{} for {} failed: {}, retrying in {:?}",
                        attempt, self.config.max_attempts, candidate.pair.symbol, err, delay
                    );
                    tokio::time::sleep(jittered(delay)).await;
                    delay *= 2;
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }

        Err(last_error
            .unwrap_or_else(|| EngineError::RequotePermanent("no attempts made".to_string())))
    }
}

/// ±50% jitter on a backoff delay so retrying tasks spread out instead of
/// hammering the quote source in waves.
fn jittered(delay: Duration) -> Duration {
    let millis = delay.as_millis().max(1) as u64;
    let half = (millis / 2).max(1);
    let offset = rand::thread_rng().gen_range(0..=millis) as i64 - half as i64;
    Duration::from_millis(millis.saturating_add_signed(offset))
}
