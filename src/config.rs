use anyhow::{bail, Context, Result};
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::{fs, path::Path, str::FromStr};

use crate::economics::EconomicsConfig;
use crate::estimator::EstimatorConfig;
use crate::finder::FinderConfig;
use crate::requote::jupiter::QuoteSourceConfig;
use crate::requote::RequoteConfig;
use crate::shared::types::MarketPair;

/// One `[[markets]]` entry. Mints stay as strings here and are parsed into
/// `Pubkey`s during validation, so a typo fails at startup and not mid-scan.
#[derive(Debug, Clone, Deserialize)]
pub struct MarketCfg {
    pub input_mint: String,
    pub output_mint: String,
    pub symbol: String,
    /// Trade size in the input token's smallest unit.
    pub amount_lamports: u64,
    /// Optional seed observation (in, out) so scanning starts with a usable
    /// history instead of waiting for the first authoritative quote.
    pub seed_ratio: Option<SeedRatio>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SeedRatio {
    pub in_amount: u64,
    pub out_amount: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub quote_source: QuoteSourceConfig,
    #[serde(default)]
    pub finder: FinderConfig,
    #[serde(default)]
    pub requote: RequoteConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub economics: EconomicsConfig,
    pub markets: Vec<MarketCfg>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let s = fs::read_to_string(path.as_ref())
            .with_context(|| format!("read config {}", path.as_ref().display()))?;
        let cfg: Self = toml::from_str(&s).context("parse config file")?;
        Ok(cfg)
    }

    /// Startup-time validation. An invalid configuration never starts the
    /// pipeline; every problem is reported with the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.finder.worker_count == 0 {
            bail!("finder.worker_count must be at least 1");
        }
        if self.finder.scan_interval_ms == 0 {
            bail!("finder.scan_interval_ms must be at least 1");
        }
        if self.requote.max_in_flight == 0 {
            bail!("requote.max_in_flight must be at least 1");
        }
        if self.requote.max_attempts == 0 {
            bail!("requote.max_attempts must be at least 1");
        }
        if self.quote_source.url.is_empty() {
            bail!("quote_source.url must not be empty");
        }
        if self.markets.is_empty() {
            bail!("at least one [[markets]] entry is required");
        }
        for market in &self.markets {
            if market.amount_lamports == 0 {
                bail!("market {}: amount_lamports must be positive", market.symbol);
            }
            Pubkey::from_str(&market.input_mint)
                .with_context(|| format!("market {}: bad input_mint", market.symbol))?;
            Pubkey::from_str(&market.output_mint)
                .with_context(|| format!("market {}: bad output_mint", market.symbol))?;
            if let Some(seed) = &market.seed_ratio {
                if seed.in_amount == 0 {
                    bail!("market {}: seed_ratio.in_amount must be positive", market.symbol);
                }
            }
        }
        Ok(())
    }

    /// Market pairs with mints parsed. Call after `validate()`.
    pub fn market_pairs(&self) -> Result<Vec<MarketPair>> {
        self.markets
            .iter()
            .map(|m| {
                Ok(MarketPair {
                    input_mint: Pubkey::from_str(&m.input_mint)
                        .with_context(|| format!("market {}: bad input_mint", m.symbol))?,
                    output_mint: Pubkey::from_str(&m.output_mint)
                        .with_context(|| format!("market {}: bad output_mint", m.symbol))?,
                    symbol: m.symbol.clone(),
                    amount_in: m.amount_lamports,
                })
            })
            .collect()
    }
}
