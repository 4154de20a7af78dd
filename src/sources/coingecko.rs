//! CoinGecko spot-price and market-chart client for the BTC threshold model

use reqwest::Client;
use serde_json::Value;
use std::time::Duration as StdDuration;
use tracing::instrument;

use crate::common::errors::{EngineError, Result};

const COINGECKO_API: &str = "https://api.coingecko.com/api/v3";

/// Free-tier CoinGecko client; endpoints work without a key but are
/// rate-limited.
#[derive(Debug, Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(COINGECKO_API)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// USD spot price for a coin id (e.g. "bitcoin")
    #[instrument(skip(self))]
    pub async fn spot_usd(&self, coin_id: &str) -> Result<Option<f64>> {
        let url = format!(
            "{}/simple/price?ids={}&vs_currencies=usd",
            self.base_url, coin_id
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "CoinGecko simple/price returned {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        Ok(body
            .get(coin_id)
            .and_then(|row| row.get("usd"))
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p > 0.0))
    }

    /// Close-price series from the market chart endpoint (hourly granularity
    /// for lookbacks up to 90 days)
    #[instrument(skip(self))]
    pub async fn market_chart_prices(&self, coin_id: &str, days: u32) -> Result<Vec<f64>> {
        let interval = if days <= 90 { "hourly" } else { "daily" };
        let url = format!(
            "{}/coins/{}/market_chart?vs_currency=usd&days={}&interval={}",
            self.base_url, coin_id, days, interval
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "CoinGecko market_chart returned {}",
                response.status()
            )));
        }
        let body: Value = response.json().await?;
        Ok(parse_chart_prices(&body))
    }
}

/// Extract finite positive prices from a market-chart payload
/// (`{"prices": [[ts_ms, price], ...]}`)
pub fn parse_chart_prices(body: &Value) -> Vec<f64> {
    let Some(rows) = body.get("prices").and_then(Value::as_array) else {
        return Vec::new();
    };
    rows.iter()
        .filter_map(|row| row.as_array())
        .filter(|row| row.len() >= 2)
        .filter_map(|row| row[1].as_f64())
        .filter(|p| p.is_finite() && *p > 0.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_chart_prices() {
        let body = json!({
            "prices": [
                [1700000000000i64, 42000.5],
                [1700003600000i64, 42100.0],
                [1700007200000i64, "bad"],
            ]
        });
        assert_eq!(parse_chart_prices(&body), vec![42000.5, 42100.0]);
    }

    #[test]
    fn test_parse_chart_prices_missing_key() {
        assert!(parse_chart_prices(&json!({})).is_empty());
    }
}
