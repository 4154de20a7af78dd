//! Stub exchange used for end-to-end paper runs and tests

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::collections::HashMap;

use super::Exchange;
use crate::common::errors::Result;
use crate::common::types::{Fill, Market, MarketSnapshot, SizedOrder};

/// In-memory exchange with a couple of demo markets.
///
/// Fills are all-or-nothing at the quoted price: no partial fills, no
/// slippage model, no liquidity-based rejection.
pub struct PaperExchange {
    markets: Vec<Market>,
    quotes: HashMap<String, MarketSnapshot>,
}

impl PaperExchange {
    pub fn new() -> Self {
        let markets = vec![
            Market::new("demo-1", "Will it rain tomorrow in New York City?"),
            Market::new("demo-2", "Will Team A win the championship?"),
        ];
        let quotes = [
            snapshot("demo-1", "Will it rain tomorrow in New York City?", dec!(0.40), dec!(0.60)),
            snapshot("demo-2", "Will Team A win the championship?", dec!(0.55), dec!(0.45)),
        ]
        .into_iter()
        .map(|q| (q.market_id.clone(), q))
        .collect();
        Self { markets, quotes }
    }

    /// Replace the demo universe, for tests
    pub fn with_markets(markets: Vec<Market>, quotes: Vec<MarketSnapshot>) -> Self {
        Self {
            markets,
            quotes: quotes.into_iter().map(|q| (q.market_id.clone(), q)).collect(),
        }
    }
}

impl Default for PaperExchange {
    fn default() -> Self {
        Self::new()
    }
}

fn snapshot(
    id: &str,
    question: &str,
    yes: rust_decimal::Decimal,
    no: rust_decimal::Decimal,
) -> MarketSnapshot {
    MarketSnapshot {
        market_id: id.to_string(),
        question: question.to_string(),
        yes_price: yes,
        no_price: no,
        liquidity_usd: Some(dec!(1000)),
        timestamp: Utc::now(),
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    fn name(&self) -> &'static str {
        "paper"
    }

    async fn list_markets(&mut self, limit: usize) -> Result<Vec<Market>> {
        Ok(self.markets.iter().take(limit).cloned().collect())
    }

    async fn get_quotes(&self, market_ids: &[String]) -> Result<Vec<MarketSnapshot>> {
        Ok(market_ids
            .iter()
            .filter_map(|id| self.quotes.get(id).cloned())
            .collect())
    }

    async fn place_order(
        &self,
        order: &SizedOrder,
        snapshot: &MarketSnapshot,
    ) -> Result<Option<Fill>> {
        if !order.is_trade() {
            return Ok(None);
        }
        Ok(Some(Fill {
            market_id: order.market_id.clone(),
            side: order.side,
            stake: order.stake,
            fill_price: snapshot.price_for(order.side),
            timestamp: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Side;

    #[tokio::test]
    async fn test_list_respects_limit() {
        let mut ex = PaperExchange::new();
        assert_eq!(ex.list_markets(1).await.unwrap().len(), 1);
        assert_eq!(ex.list_markets(10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_quotes_skip_unknown_markets() {
        let ex = PaperExchange::new();
        let quotes = ex
            .get_quotes(&["demo-1".to_string(), "missing".to_string()])
            .await
            .unwrap();
        assert_eq!(quotes.len(), 1);
        assert_eq!(quotes[0].market_id, "demo-1");
    }

    #[tokio::test]
    async fn test_fill_is_all_or_nothing_at_quote() {
        let ex = PaperExchange::new();
        let snap = ex.get_quotes(&["demo-1".to_string()]).await.unwrap().remove(0);
        let order = SizedOrder {
            market_id: "demo-1".to_string(),
            side: Side::No,
            stake: dec!(25),
        };
        let fill = ex.place_order(&order, &snap).await.unwrap().unwrap();
        assert_eq!(fill.stake, dec!(25));
        assert_eq!(fill.fill_price, dec!(0.60));
    }

    #[tokio::test]
    async fn test_zero_stake_produces_no_fill() {
        let ex = PaperExchange::new();
        let snap = ex.get_quotes(&["demo-1".to_string()]).await.unwrap().remove(0);
        let order = SizedOrder {
            market_id: "demo-1".to_string(),
            side: Side::Yes,
            stake: rust_decimal::Decimal::ZERO,
        };
        assert!(ex.place_order(&order, &snap).await.unwrap().is_none());
    }
}
