//! Common types used across the pipeline

use std::time::Instant;

use solana_sdk::pubkey::Pubkey;

use crate::economics::CostBreakdown;
use crate::shared::errors::RejectReason;

/// A tradable market: input token, output token and the trade size used
/// when scanning it. Owned by the finder configuration; read-only during
/// a scan cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketPair {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    /// Human-readable label, e.g. "SOL-USDC". Display only.
    pub symbol: String,
    /// Trade size in the input token's smallest unit (lamports for SOL).
    pub amount_in: u64,
}

impl MarketPair {
    /// Key for per-pair state (price history, partitioning).
    pub fn key(&self) -> PairKey {
        (self.input_mint, self.output_mint)
    }
}

pub type PairKey = (Pubkey, Pubkey);

/// An unverified opportunity produced by a finder worker from the cheap
/// unit-price estimate. Immutable once created; consumed exactly once by
/// the re-quote stage.
#[derive(Debug, Clone)]
pub struct CandidateOpportunity {
    pub id: String,
    pub pair: MarketPair,
    /// Estimated gross output for `pair.amount_in`, in smallest units.
    pub estimated_out: u64,
    pub estimated_costs: CostBreakdown,
    /// Estimated net profit in smallest units; negative means a loss.
    pub estimated_net_profit: i64,
    /// Set when this candidate was emitted below the admission threshold on
    /// purpose (periodic recheck), so the gate can classify a recovery.
    pub forced: bool,
    /// Monotonic discovery instant, used for staleness accounting.
    pub discovered_at: Instant,
    /// Wall-clock discovery time (unix ms), for logs and handoff records.
    pub discovered_at_ms: i64,
}

impl CandidateOpportunity {
    pub fn age_ms(&self) -> u64 {
        self.discovered_at.elapsed().as_millis() as u64
    }
}

/// Authoritative response from the external quote source, validated at the
/// boundary. Only fields the pipeline actually depends on survive parsing.
#[derive(Debug, Clone)]
pub struct AuthoritativeQuote {
    /// Gross output amount in smallest units. Always > 0; a zero-output
    /// quote is rejected at the boundary as "no route".
    pub out_amount: u64,
    /// Route hints: DEX labels along the quoted path, for logs/records.
    pub route_labels: Vec<String>,
    /// Quoted price impact in percent, when the source reports it.
    /// Display only, never used in profit arithmetic.
    pub price_impact_pct: Option<f64>,
}

/// Final classification assigned by the decision gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Stage-1 admitted, stage-2 confirmed at or above threshold. Forwarded.
    Confirmed,
    /// Stage-1 was below threshold (forced recheck) but stage-2 cleared the
    /// threshold anyway. Forwarded.
    Recovered,
    /// Stage-2 did not confirm the estimated profitability. Discarded.
    FalsePositive,
    /// Re-quote failed or the candidate exceeded its staleness window.
    RejectedStale,
}

impl Classification {
    pub fn is_forwarded(&self) -> bool {
        matches!(self, Classification::Confirmed | Classification::Recovered)
    }
}

/// Terminal result of the two-stage validation for one candidate: either
/// forwarded to the execution collaborator or discarded with a reason.
#[derive(Debug, Clone)]
pub struct ValidatedOpportunity {
    pub candidate: CandidateOpportunity,
    pub classification: Classification,
    /// Authoritative numbers; absent when the re-quote never produced one.
    pub authoritative_out: Option<u64>,
    pub authoritative_costs: Option<CostBreakdown>,
    pub authoritative_net_profit: Option<i64>,
    /// Present exactly when the opportunity was discarded.
    pub reject_reason: Option<RejectReason>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pair() -> MarketPair {
        MarketPair {
            input_mint: Pubkey::new_unique(),
            output_mint: Pubkey::new_unique(),
            symbol: "SOL-USDC".to_string(),
            amount_in: 1_000_000_000,
        }
    }

    #[test]
    fn pair_key_is_mint_ordered() {
        let pair = test_pair();
        assert_eq!(pair.key(), (pair.input_mint, pair.output_mint));
    }

    #[test]
    fn forwarded_classifications() {
        assert!(Classification::Confirmed.is_forwarded());
        assert!(Classification::Recovered.is_forwarded());
        assert!(!Classification::FalsePositive.is_forwarded());
        assert!(!Classification::RejectedStale.is_forwarded());
    }
}
