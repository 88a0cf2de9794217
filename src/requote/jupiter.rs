//! HTTP quote source for a Jupiter-style aggregator `/quote` endpoint.
//!
//! All fields of the upstream response are treated as hostile until
//! validated: amounts arrive as strings (sometimes in scientific notation),
//! and any of them can be missing. Validation happens here at the boundary
//! so the rest of the pipeline only ever sees checked integers.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use super::QuoteSource;
use crate::shared::errors::EngineError;
use crate::shared::types::AuthoritativeQuote;
use crate::shared::utils::parse_lamports;

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSourceConfig {
    pub url: String,
    pub timeout_ms: u64,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for QuoteSourceConfig {
    fn default() -> Self {
        Self {
            url: "https://quote-api.jup.ag/v6".to_string(),
            timeout_ms: 1_500,
            api_key: None,
        }
    }
}

/// Raw wire shape of the aggregator response. Everything optional; the
/// conversion below decides what is actually required.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    out_amount: Option<String>,
    price_impact_pct: Option<String>,
    #[serde(default)]
    route_plan: Vec<RoutePlanStep>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoutePlanStep {
    swap_info: Option<SwapInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwapInfo {
    label: Option<String>,
}

pub struct JupiterQuoteSource {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl JupiterQuoteSource {
    pub fn new(config: &QuoteSourceConfig) -> Result<Self, EngineError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| EngineError::RequotePermanent(format!("http client: {}", e)))?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }
}

/// Validate the dynamic response into the one shape the pipeline accepts.
fn validate_response(raw: QuoteResponse) -> Result<AuthoritativeQuote, EngineError> {
    let out_field = raw
        .out_amount
        .ok_or_else(|| EngineError::RequotePermanent("response missing outAmount".to_string()))?;
    let out_amount = parse_lamports(&out_field)?;
    if out_amount == 0 {
        return Err(EngineError::RequotePermanent("no route".to_string()));
    }

    let route_labels = raw
        .route_plan
        .into_iter()
        .filter_map(|step| step.swap_info.and_then(|info| info.label))
        .collect();
    let price_impact_pct = raw.price_impact_pct.and_then(|s| s.parse::<f64>().ok());

    Ok(AuthoritativeQuote { out_amount, route_labels, price_impact_pct })
}

fn classify_status(status: StatusCode, body: String) -> EngineError {
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        EngineError::RequoteTransient(format!("quote API returned {}: {}", status, body))
    } else {
        EngineError::RequotePermanent(format!("quote API returned {}: {}", status, body))
    }
}

#[async_trait]
impl QuoteSource for JupiterQuoteSource {
    async fn quote(
        &self,
        input_mint: &str,
        output_mint: &str,
        amount_in: u64,
    ) -> Result<AuthoritativeQuote, EngineError> {
        let url = format!("{}/quote", self.base_url);
        debug!("🔍 Quoting {} -> {} for {}", input_mint, output_mint, amount_in);

        let mut request = self.client.get(&url).query(&[
            ("inputMint", input_mint),
            ("outputMint", output_mint),
            ("amount", &amount_in.to_string()),
        ]);
        if let Some(key) = &self.api_key {
            request = request.header("X-API-Key", key);
        }

        let response = request.send().await.map_err(|e| {
            // Network-level failures (timeouts, refused connections) are the
            // retryable class.
            if e.is_timeout() || e.is_connect() {
                EngineError::RequoteTransient(format!("quote request failed: {}", e))
            } else {
                EngineError::RequotePermanent(format!("quote request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let raw: QuoteResponse = response
            .json()
            .await
            .map_err(|e| EngineError::RequotePermanent(format!("malformed quote body: {}", e)))?;
        validate_response(raw)
    }
}
