//! Upstream supply fetcher
//!
//! Performs exactly one live request per call. Retry and caching policy
//! belong to the callers (`SupplyCache`, the frame image fallback).

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::time::Duration;

use super::types::{Provider, SupplyReading};
use crate::error::{SupplyError, SupplyResult};

const USER_AGENT: &str = "Mozilla/5.0 supply-tracker/0.1";

/// Anything that can produce a fresh supply reading
#[async_trait]
pub trait SupplySource: Send + Sync {
    async fn fetch_supply(&self) -> SupplyResult<SupplyReading>;
}

/// Live HTTP source for one provider endpoint
pub struct HttpSupplyFetcher {
    client: Client,
    provider: Provider,
    url: String,
}

impl HttpSupplyFetcher {
    pub fn new(provider: Provider, url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            provider,
            url: url.into(),
        })
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SupplySource for HttpSupplyFetcher {
    async fn fetch_supply(&self) -> SupplyResult<SupplyReading> {
        tracing::debug!("Fetching Bitcoin supply from {}", self.url);

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| SupplyError::UpstreamUnavailable(format!("request to {} failed: {}", self.url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupplyError::UpstreamUnavailable(format!(
                "HTTP error {} from {}",
                status, self.url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SupplyError::UpstreamUnavailable(format!("failed to read response body: {}", e)))?;

        let base_units = parse_supply_body(self.provider, &body)?;
        let reading = SupplyReading::new(base_units, Utc::now());

        tracing::debug!(
            "Upstream supply: {} sats ({} BTC)",
            reading.base_units,
            reading.display_units
        );
        Ok(reading)
    }
}

/// Extract circulating satoshis from a provider payload.
pub fn parse_supply_body(provider: Provider, body: &str) -> SupplyResult<u64> {
    match provider {
        Provider::BlockchainInfo => {
            let text = body.trim();
            text.parse::<u64>().map_err(|_| {
                SupplyError::UpstreamMalformed(format!(
                    "expected integer satoshis, got {:?}",
                    text.chars().take(40).collect::<String>()
                ))
            })
        }
        Provider::Blockchair => {
            let json: serde_json::Value = serde_json::from_str(body)
                .map_err(|e| SupplyError::UpstreamMalformed(format!("invalid JSON: {}", e)))?;

            let circulation = json
                .get("data")
                .and_then(|data| data.get("circulation"))
                .ok_or_else(|| SupplyError::UpstreamMalformed("missing data.circulation".to_string()))?;

            // Large integers sometimes arrive in float notation
            circulation
                .as_u64()
                .or_else(|| {
                    circulation
                        .as_f64()
                        .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v < u64::MAX as f64)
                        .map(|v| v as u64)
                })
                .ok_or_else(|| {
                    SupplyError::UpstreamMalformed(format!(
                        "data.circulation is not a non-negative integer: {}",
                        circulation
                    ))
                })
        }
    }
}
