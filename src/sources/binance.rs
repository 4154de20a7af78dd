//! Binance public market-data client, used as a price feed for the BTC models

use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration as StdDuration;
use tracing::instrument;

use crate::common::errors::{EngineError, Result};

const BINANCE_API: &str = "https://api.binance.com";

/// One OHLCV candle
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Free public Binance market data client (no auth)
#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
}

impl BinanceClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(BINANCE_API)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(20))
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch raw kline rows for a symbol/interval
    #[instrument(skip(self))]
    pub async fn klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Value>> {
        let url = format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url, symbol, interval, limit
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "Binance klines returned {}",
                response.status()
            )));
        }
        let rows: Value = response.json().await?;
        match rows {
            Value::Array(rows) => Ok(rows),
            _ => Ok(Vec::new()),
        }
    }
}

fn value_as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Parse kline rows, dropping malformed or non-finite entries
pub fn parse_klines(rows: &[Value]) -> Vec<Candle> {
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let Value::Array(fields) = row else { continue };
        if fields.len() < 6 {
            continue;
        }
        let Some(open_ms) = value_as_f64(&fields[0]) else {
            continue;
        };
        let Some(open_time) = Utc.timestamp_millis_opt(open_ms as i64).single() else {
            continue;
        };
        let parsed: Option<Vec<f64>> = fields[1..6].iter().map(value_as_f64).collect();
        let Some(values) = parsed else { continue };
        let (open, high, low, close, volume) =
            (values[0], values[1], values[2], values[3], values[4]);
        if [open, high, low, close].iter().all(|x| x.is_finite()) && close > 0.0 {
            out.push(Candle {
                open_time,
                open,
                high,
                low,
                close,
                volume,
            });
        }
    }
    out
}

/// Annualized realized volatility from a close-price series
pub fn realized_vol_from_closes(closes: &[f64], periods_per_year: f64) -> Option<f64> {
    if closes.len() < 3 {
        return None;
    }
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] > 0.0 && w[1] > 0.0)
        .map(|w| (w[1] / w[0]).ln())
        .collect();
    if returns.len() < 2 {
        return None;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    if var <= 0.0 {
        return None;
    }
    Some(var.sqrt() * periods_per_year.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_klines_drops_malformed_rows() {
        let rows = vec![
            json!([1700000000000i64, "42000.1", "42100.0", "41900.0", "42050.5", "12.5"]),
            json!(["not a row"]),
            json!([1700000060000i64, "0", "0", "0", "0", "0"]),
        ];
        let candles = parse_klines(&rows);
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 42050.5);
    }

    #[test]
    fn test_realized_vol_needs_enough_points() {
        assert!(realized_vol_from_closes(&[100.0, 101.0], 525_600.0).is_none());
        assert!(realized_vol_from_closes(&[100.0, 100.0, 100.0, 100.0], 525_600.0).is_none());
    }

    #[test]
    fn test_realized_vol_positive_for_moving_series() {
        let closes = [100.0, 101.0, 99.5, 100.8, 100.2, 101.5];
        let vol = realized_vol_from_closes(&closes, 60.0 * 24.0 * 365.0).unwrap();
        assert!(vol > 0.0);
    }
}
