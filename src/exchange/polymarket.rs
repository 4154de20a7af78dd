//! Read-only Polymarket adapter using Gamma + public CLOB endpoints
//!
//! Supports dry-run paper decisions against real markets without
//! authenticated order placement.
//!
//! Sources:
//! - Gamma events/markets: https://gamma-api.polymarket.com
//! - CLOB price (public): https://clob.polymarket.com
//!
//! Limitations: the "buy" price of each outcome token is treated as the
//! implied probability; fills are not simulated from the order book.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration as StdDuration;
use tracing::{debug, instrument, warn};

use super::Exchange;
use crate::common::errors::{EngineError, Result};
use crate::common::types::{Fill, Market, MarketSnapshot, SizedOrder};

const GAMMA_URL: &str = "https://gamma-api.polymarket.com";
const CLOB_URL: &str = "https://clob.polymarket.com";

#[derive(Debug, Clone)]
struct TokenMeta {
    yes_token_id: String,
    no_token_id: String,
    liquidity_usd: Option<Decimal>,
}

impl TokenMeta {
    /// Synthetic ids mark markets whose CLOB tokens are unknown; they can be
    /// listed but not quoted.
    fn is_quotable(&self) -> bool {
        !self.yes_token_id.starts_with("gamma:")
    }
}

#[derive(Debug, Deserialize)]
struct GammaTag {
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GammaMarket {
    id: String,
    #[serde(default)]
    question: Option<String>,
    #[serde(rename = "clobTokenIds", default)]
    clob_token_ids: Option<Value>,
    #[serde(default)]
    liquidity: Option<Value>,
    #[serde(rename = "liquidityNum", default)]
    liquidity_num: Option<Value>,
    #[serde(rename = "startDate", default)]
    start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    end_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GammaEvent {
    #[serde(default)]
    tags: Option<Vec<GammaTag>>,
    #[serde(default)]
    markets: Option<Vec<GammaMarket>>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: String,
}

/// Token ids arrive either as a JSON array or as a JSON-encoded string of one
fn parse_token_ids(raw: &Value) -> Option<(String, String)> {
    let arr: Vec<String> = match raw {
        Value::Array(items) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        Value::String(s) => serde_json::from_str(s).ok()?,
        _ => return None,
    };
    if arr.len() >= 2 {
        Some((arr[0].clone(), arr[1].clone()))
    } else {
        None
    }
}

/// Liquidity arrives as a number or a numeric string depending on the field
fn parse_liquidity(market: &GammaMarket) -> Option<Decimal> {
    for raw in [&market.liquidity_num, &market.liquidity].into_iter().flatten() {
        let parsed = match raw {
            Value::Number(n) => n.as_f64().and_then(Decimal::from_f64),
            Value::String(s) => Decimal::from_str(s).ok(),
            _ => None,
        };
        if parsed.is_some() {
            return parsed;
        }
    }
    None
}

fn parse_rfc3339(raw: &Option<String>) -> Option<DateTime<Utc>> {
    raw.as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Read-only Gamma + CLOB adapter
pub struct PolymarketPublicExchange {
    client: Client,
    gamma_url: String,
    clob_url: String,
    meta: HashMap<String, TokenMeta>,
}

impl PolymarketPublicExchange {
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_base_urls(user_agent, GAMMA_URL, CLOB_URL)
    }

    /// Custom base URLs, for tests against a mock server
    pub fn with_base_urls(user_agent: &str, gamma_url: &str, clob_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(25))
            .user_agent(user_agent)
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            gamma_url: gamma_url.trim_end_matches('/').to_string(),
            clob_url: clob_url.trim_end_matches('/').to_string(),
            meta: HashMap::new(),
        })
    }

    #[instrument(skip(self))]
    async fn fetch_events(&self, limit: usize) -> Result<Vec<GammaEvent>> {
        let url = format!(
            "{}/events?active=true&closed=false&limit={}",
            self.gamma_url, limit
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "Gamma events returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Buy price for one outcome token, treated as its implied probability
    async fn clob_price(&self, token_id: &str) -> Result<Option<Decimal>> {
        let url = format!(
            "{}/price?token_id={}&side=buy",
            self.clob_url, token_id
        );
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            debug!(token_id, status = %response.status(), "no CLOB price");
            return Ok(None);
        }
        let body: PriceResponse = response.json().await?;
        Ok(Decimal::from_str(&body.price).ok())
    }
}

#[async_trait]
impl Exchange for PolymarketPublicExchange {
    fn name(&self) -> &'static str {
        "polymarket-public"
    }

    async fn list_markets(&mut self, limit: usize) -> Result<Vec<Market>> {
        let events = self.fetch_events(limit).await?;

        self.meta.clear();
        let mut out = Vec::new();

        for event in events {
            let category = event.tags.as_ref().and_then(|tags| {
                tags.first()
                    .and_then(|t| t.label.clone().or_else(|| t.slug.clone()))
            });
            for market in event.markets.unwrap_or_default() {
                let Some(question) = market.question.clone() else {
                    continue;
                };

                let (yes_id, no_id) = market
                    .clob_token_ids
                    .as_ref()
                    .and_then(parse_token_ids)
                    .unwrap_or_else(|| {
                        // Still listable; quoting is skipped for these.
                        (
                            format!("gamma:{}:YES", market.id),
                            format!("gamma:{}:NO", market.id),
                        )
                    });

                self.meta.insert(
                    market.id.clone(),
                    TokenMeta {
                        yes_token_id: yes_id,
                        no_token_id: no_id,
                        liquidity_usd: parse_liquidity(&market),
                    },
                );

                out.push(Market {
                    id: market.id.clone(),
                    question,
                    category: category.clone(),
                    start_time: parse_rfc3339(&market.start_date),
                    close_time: parse_rfc3339(&market.end_date),
                });
            }
        }

        out.truncate(limit);
        Ok(out)
    }

    async fn get_quotes(&self, market_ids: &[String]) -> Result<Vec<MarketSnapshot>> {
        let mut out = Vec::new();
        let ts = Utc::now();

        for market_id in market_ids {
            let Some(meta) = self.meta.get(market_id) else {
                continue;
            };
            if !meta.is_quotable() {
                continue;
            }

            let yes = self.clob_price(&meta.yes_token_id).await?;
            let no = self.clob_price(&meta.no_token_id).await?;
            let (Some(yes), Some(no)) = (yes, no) else {
                warn!(%market_id, "skipping market without both CLOB prices");
                continue;
            };

            // yes+no ~= 1 in theory; keep as-is but clamp into range.
            out.push(MarketSnapshot {
                market_id: market_id.clone(),
                question: String::new(),
                yes_price: yes.clamp(Decimal::ZERO, Decimal::ONE),
                no_price: no.clamp(Decimal::ZERO, Decimal::ONE),
                liquidity_usd: meta.liquidity_usd,
                timestamp: ts,
            });
        }

        Ok(out)
    }

    async fn place_order(
        &self,
        _order: &SizedOrder,
        _snapshot: &MarketSnapshot,
    ) -> Result<Option<Fill>> {
        Err(EngineError::SourceUnavailable(
            "polymarket-public is read-only; order placement needs a live adapter".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_token_ids_from_array() {
        let raw = json!(["tok-yes", "tok-no"]);
        assert_eq!(
            parse_token_ids(&raw),
            Some(("tok-yes".to_string(), "tok-no".to_string()))
        );
    }

    #[test]
    fn test_parse_token_ids_from_encoded_string() {
        let raw = json!("[\"tok-yes\", \"tok-no\"]");
        assert_eq!(
            parse_token_ids(&raw),
            Some(("tok-yes".to_string(), "tok-no".to_string()))
        );
    }

    #[test]
    fn test_parse_token_ids_rejects_short_arrays() {
        assert_eq!(parse_token_ids(&json!(["only-one"])), None);
        assert_eq!(parse_token_ids(&json!(42)), None);
    }

    #[test]
    fn test_parse_liquidity_prefers_numeric_field() {
        let market = GammaMarket {
            id: "1".to_string(),
            question: None,
            clob_token_ids: None,
            liquidity: Some(json!("250.5")),
            liquidity_num: Some(json!(300.0)),
            start_date: None,
            end_date: None,
        };
        assert_eq!(parse_liquidity(&market), Decimal::from_str("300").ok());
    }
}
