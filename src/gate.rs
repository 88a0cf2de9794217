//! Decision gate: final arbiter between the two stages.
//!
//! Stage 2 always wins. Whatever the cheap estimate claimed, only the
//! authoritative quote's net profit decides whether an opportunity is
//! forwarded to execution, and nothing with non-positive authoritative
//! net ever passes.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::report::PipelineStats;
use crate::requote::RequoteOutcome;
use crate::shared::errors::{EngineError, RejectReason};
use crate::shared::types::{Classification, ValidatedOpportunity};
use crate::shared::utils::{format_roi, format_sol_signed};

pub struct DecisionGate {
    min_profit_lamports: u64,
    stats: Arc<PipelineStats>,
}

impl DecisionGate {
    pub fn new(min_profit_lamports: u64, stats: Arc<PipelineStats>) -> Self {
        Self { min_profit_lamports, stats }
    }

    /// Classify one re-quote outcome into a terminal validation result.
    pub fn classify(&self, outcome: RequoteOutcome) -> ValidatedOpportunity {
        match outcome {
            RequoteOutcome::Quoted { candidate, quote, net_profit, costs } => {
                let clears = net_profit > 0 && net_profit >= self.min_profit_lamports as i64;
                let classification = match (clears, candidate.forced) {
                    (true, false) => Classification::Confirmed,
                    (true, true) => Classification::Recovered,
                    (false, _) => Classification::FalsePositive,
                };
                let reject_reason = if clears {
                    None
                } else {
                    Some(RejectReason::BelowThreshold { authoritative_net: net_profit })
                };
                ValidatedOpportunity {
                    candidate,
                    classification,
                    authoritative_out: Some(quote.out_amount),
                    authoritative_costs: Some(costs),
                    authoritative_net_profit: Some(net_profit),
                    reject_reason,
                }
            }
            RequoteOutcome::Failed { candidate, error } => {
                let reject_reason = match &error {
                    EngineError::StaleCandidate { age_ms, .. } => {
                        RejectReason::Stale { age_ms: *age_ms }
                    }
                    other => RejectReason::RequoteFailed(other.to_string()),
                };
                ValidatedOpportunity {
                    candidate,
                    classification: Classification::RejectedStale,
                    authoritative_out: None,
                    authoritative_costs: None,
                    authoritative_net_profit: None,
                    reject_reason: Some(reject_reason),
                }
            }
        }
    }

    /// Gate loop: classify every outcome, forward the winners, record the
    /// rest. Exits when the outcome channel closes.
    pub async fn run(
        self,
        mut outcomes: mpsc::Receiver<RequoteOutcome>,
        execution: mpsc::Sender<ValidatedOpportunity>,
    ) {
        info!(
            "🚦 Decision gate up, min profit {} lamports",
            self.min_profit_lamports
        );

        while let Some(outcome) = outcomes.recv().await {
            let validated = self.classify(outcome);
            match validated.classification {
                Classification::Confirmed => {
                    PipelineStats::bump(&self.stats.confirmed);
                    let net = validated.authoritative_net_profit.unwrap_or_default();
                    info!(
                        "✅ Confirmed {}: net {} ({})",
                        validated.candidate.pair.symbol,
                        format_sol_signed(net),
                        format_roi(net, validated.candidate.pair.amount_in),
                    );
                    let _ = execution.send(validated).await;
                }
                Classification::Recovered => {
                    PipelineStats::bump(&self.stats.recovered);
                    let net = validated.authoritative_net_profit.unwrap_or_default();
                    info!(
                        "💰 Recovered {} from forced recheck: net {}",
                        validated.candidate.pair.symbol,
                        format_sol_signed(net),
                    );
                    let _ = execution.send(validated).await;
                }
                Classification::FalsePositive => {
                    PipelineStats::bump(&self.stats.false_positives);
                    debug!(
                        "❌ False positive {}: estimated {}, {}",
                        validated.candidate.pair.symbol,
                        format_sol_signed(validated.candidate.estimated_net_profit),
                        validated
                            .reject_reason
                            .as_ref()
                            .map(|r| r.to_string())
                            .unwrap_or_default(),
                    );
                }
                Classification::RejectedStale => {
                    debug!(
                        "⚠️ Rejected {}: {}",
                        validated.candidate.pair.symbol,
                        validated
                            .reject_reason
                            .as_ref()
                            .map(|r| r.to_string())
                            .unwrap_or_default(),
                    );
                }
            }
        }
        info!("🚦 Decision gate stopped");
    }
}
