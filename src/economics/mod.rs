//! Trade economics: fee schedule and net-profit arithmetic
//!
//! All amount math is exact integer arithmetic in smallest units (lamports).
//! The only floating point in this module lives in display helpers that are
//! never fed back into comparisons.

use std::str::FromStr;

use serde::Deserialize;

use crate::shared::errors::EngineError;

/// Base fee charged per transaction signature, in lamports.
pub const BASE_FEE_PER_SIGNATURE: u64 = 5_000;

/// Flash-loan fee rate in basis points (0.09%, Solend).
pub const FLASH_LOAN_FEE_BPS: u64 = 9;

/// Fee categories the schedule knows how to price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeKind {
    Signature,
    FlashLoan,
}

impl FromStr for FeeKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signature" => Ok(FeeKind::Signature),
            "flash-loan" => Ok(FeeKind::FlashLoan),
            other => Err(EngineError::UnknownFeeKind(other.to_string())),
        }
    }
}

/// Per-trade cost parameters, fixed at startup from config.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EconomicsConfig {
    /// Signatures the eventual transaction will carry.
    pub signature_count: u32,
    /// Whether trades borrow their principal via flash loan.
    pub use_flash_loan: bool,
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        // Flash-loan arbitrage tx: payer + borrow/repay signatures.
        Self { signature_count: 2, use_flash_loan: true }
    }
}

/// Immutable process-wide fee constants, loaded once at startup.
#[derive(Debug, Clone, Copy)]
pub struct FeeSchedule {
    pub base_fee_per_signature: u64,
    pub flash_loan_fee_bps: u64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            base_fee_per_signature: BASE_FEE_PER_SIGNATURE,
            flash_loan_fee_bps: FLASH_LOAN_FEE_BPS,
        }
    }
}

/// Full cost breakdown for one trade, in lamports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CostBreakdown {
    pub base_fee: u64,
    pub flash_loan_fee: u64,
    pub total: u64,
}

impl FeeSchedule {
    pub fn base_fee(&self, signature_count: u32) -> u64 {
        self.base_fee_per_signature * signature_count as u64
    }

    /// Flash-loan fee on the borrowed principal, rounded up — the lender
    /// always rounds in its own favor.
    pub fn flash_loan_fee(&self, borrowed: u64) -> u64 {
        let fee = borrowed as u128 * self.flash_loan_fee_bps as u128;
        ((fee + 9_999) / 10_000) as u64
    }

    /// Price a single fee category.
    pub fn fee(&self, kind: FeeKind, config: &EconomicsConfig, borrowed: u64) -> u64 {
        match kind {
            FeeKind::Signature => self.base_fee(config.signature_count),
            FeeKind::FlashLoan => {
                if config.use_flash_loan {
                    self.flash_loan_fee(borrowed)
                } else {
                    0
                }
            }
        }
    }

    /// Total cost of a trade of size `amount_in` under `config`.
    pub fn total_cost(&self, config: &EconomicsConfig, amount_in: u64) -> CostBreakdown {
        let base_fee = self.base_fee(config.signature_count);
        let flash_loan_fee = if config.use_flash_loan {
            self.flash_loan_fee(amount_in)
        } else {
            0
        };
        CostBreakdown {
            base_fee,
            flash_loan_fee,
            total: base_fee + flash_loan_fee,
        }
    }
}

/// Net profit = gross output − gross input − total cost.
///
/// Computed in i128 so no intermediate step can wrap; the result saturates
/// at the i64 range (a loss or gain beyond ±9.2e18 lamports is not a real
/// trade).
pub fn net_profit(gross_in: u64, gross_out: u64, costs: &CostBreakdown) -> i64 {
    let net = gross_out as i128 - gross_in as i128 - costs.total as i128;
    net.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule() -> FeeSchedule {
        FeeSchedule::default()
    }

    #[test]
    fn base_fee_scales_with_signatures() {
        assert_eq!(schedule().base_fee(1), 5_000);
        assert_eq!(schedule().base_fee(2), 10_000);
        assert_eq!(schedule().base_fee(0), 0);
    }

    #[test]
    fn flash_loan_fee_rounds_up() {
        // 9 bps of 10 SOL = 0.009 SOL
        assert_eq!(schedule().flash_loan_fee(10_000_000_000), 9_000_000);
        // 1 lamport borrowed still costs 1 lamport
        assert_eq!(schedule().flash_loan_fee(1), 1);
        assert_eq!(schedule().flash_loan_fee(0), 0);
        // exact multiple: no rounding
        assert_eq!(schedule().flash_loan_fee(10_000), 9);
        // one above the multiple rounds up
        assert_eq!(schedule().flash_loan_fee(10_001), 10);
    }

    #[test]
    fn total_cost_with_and_without_flash_loan() {
        let with = schedule().total_cost(
            &EconomicsConfig { signature_count: 2, use_flash_loan: true },
            10_000_000_000,
        );
        assert_eq!(with.base_fee, 10_000);
        assert_eq!(with.flash_loan_fee, 9_000_000);
        assert_eq!(with.total, 9_010_000);

        let without = schedule().total_cost(
            &EconomicsConfig { signature_count: 2, use_flash_loan: false },
            10_000_000_000,
        );
        assert_eq!(without.flash_loan_fee, 0);
        assert_eq!(without.total, 10_000);
    }

    #[test]
    fn net_profit_is_exact_and_repeatable() {
        let costs = schedule().total_cost(
            &EconomicsConfig { signature_count: 2, use_flash_loan: true },
            10_000_000_000,
        );
        let expected = 10_050_000_000i64 - 10_000_000_000i64 - costs.total as i64;
        for _ in 0..1_000 {
            assert_eq!(net_profit(10_000_000_000, 10_050_000_000, &costs), expected);
        }
    }

    #[test]
    fn net_profit_can_be_negative() {
        let costs = schedule().total_cost(
            &EconomicsConfig { signature_count: 2, use_flash_loan: true },
            10_000_000_000,
        );
        let net = net_profit(10_000_000_000, 10_000_000_000, &costs);
        assert_eq!(net, -(costs.total as i64));
    }

    #[test]
    fn net_profit_does_not_wrap_at_extremes() {
        let costs = CostBreakdown { base_fee: u64::MAX, flash_loan_fee: 0, total: u64::MAX };
        assert_eq!(net_profit(u64::MAX, 0, &costs), i64::MIN);
        let zero_costs = CostBreakdown { base_fee: 0, flash_loan_fee: 0, total: 0 };
        assert_eq!(net_profit(0, u64::MAX, &zero_costs), i64::MAX);
    }

    #[test]
    fn fee_kind_parsing() {
        assert_eq!("signature".parse::<FeeKind>().unwrap(), FeeKind::Signature);
        assert_eq!("flash-loan".parse::<FeeKind>().unwrap(), FeeKind::FlashLoan);
        assert!(matches!(
            "priority".parse::<FeeKind>(),
            Err(EngineError::UnknownFeeKind(_))
        ));
    }

    #[test]
    fn fee_by_kind_respects_flash_loan_flag() {
        let cfg = EconomicsConfig { signature_count: 3, use_flash_loan: false };
        assert_eq!(schedule().fee(FeeKind::Signature, &cfg, 0), 15_000);
        assert_eq!(schedule().fee(FeeKind::FlashLoan, &cfg, 10_000_000_000), 0);
    }
}
