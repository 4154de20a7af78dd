//! End-to-end tests for the evaluation cycle: paper exchange -> fair value
//! -> detector -> sizer -> fill -> decision log.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use polyscout::common::errors::{EngineError, Result};
use polyscout::common::types::{FairValueEstimate, Market, MarketSnapshot, Side};
use polyscout::config::AppConfig;
use polyscout::exchange::PaperExchange;
use polyscout::models::FairValueModel;
use polyscout::runner::Runner;
use polyscout::storage::DecisionStore;

/// Model that answers every market with a fixed probability
struct FixedModel(Decimal);

#[async_trait]
impl FairValueModel for FixedModel {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn recognizes(&self, _market: &Market) -> bool {
        true
    }

    async fn estimate(&self, _market: &Market) -> Result<FairValueEstimate> {
        Ok(FairValueEstimate::new(self.0).with_rationale("fixed"))
    }
}

/// Model that fails for one market id and answers 0.55 for the rest
struct FlakyModel {
    failing_id: String,
}

#[async_trait]
impl FairValueModel for FlakyModel {
    fn name(&self) -> &'static str {
        "flaky"
    }

    fn recognizes(&self, _market: &Market) -> bool {
        true
    }

    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate> {
        if market.id == self.failing_id {
            return Err(EngineError::SourceUnavailable("signal feed down".to_string()));
        }
        Ok(FairValueEstimate::new(dec!(0.55)))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        min_edge: 0.08,
        bankroll_usd: 1000.0,
        kelly_multiplier: 0.25,
        max_stake_usd: 1000.0,
        max_market_exposure_usd: 1000.0,
        max_portfolio_exposure_usd: 1000.0,
        min_liquidity_usd: 0.0,
        ..AppConfig::default()
    }
}

fn snapshot(id: &str, yes: Decimal) -> MarketSnapshot {
    MarketSnapshot {
        market_id: id.to_string(),
        question: format!("question for {}", id),
        yes_price: yes,
        no_price: Decimal::ONE - yes,
        liquidity_usd: Some(dec!(1000)),
        timestamp: Utc::now(),
    }
}

async fn runner_with(
    exchange: PaperExchange,
    model: Box<dyn FairValueModel>,
    config: AppConfig,
) -> Runner {
    let store = DecisionStore::in_memory().await.unwrap();
    Runner::new(config, Box::new(exchange), model, store).unwrap()
}

#[tokio::test]
async fn test_cycle_detects_sizes_and_fills() {
    // demo-1 quotes YES at 0.40; fair value 0.55 gives edge 0.15.
    // demo-2 quotes YES at 0.55; fair value 0.55 gives zero edge on both sides.
    let mut runner = runner_with(
        PaperExchange::new(),
        Box::new(FixedModel(dec!(0.55))),
        test_config(),
    )
    .await;

    let report = runner.run_once().await.unwrap();
    assert_eq!(report.markets_evaluated, 2);
    assert_eq!(report.markets_skipped, 0);
    assert_eq!(report.opportunities, 1);
    assert_eq!(report.fills, 1);

    let record = runner
        .store()
        .fetch("demo-1", report.cycle_ts)
        .await
        .unwrap()
        .expect("demo-1 decision should be recorded");

    let opp = record.opportunity.expect("edge of 0.15 beats min_edge 0.08");
    assert_eq!(opp.side, Side::Yes);
    assert_eq!(opp.edge, dec!(0.15));

    // b = 0.60/0.40 = 1.5, f* = (1.5*0.55 - 0.45)/1.5 = 0.25,
    // stake = 0.25 * 0.25 * 1000 = 62.5
    let order = record.order.expect("opportunity should be sized");
    assert_eq!(order.stake, dec!(62.5));

    let fill = record.fill.expect("paper exchange fills the full stake");
    assert_eq!(fill.stake, dec!(62.5));
    assert_eq!(fill.fill_price, dec!(0.40));
}

#[tokio::test]
async fn test_no_trade_cycles_are_still_logged() {
    let mut runner = runner_with(
        PaperExchange::new(),
        Box::new(FixedModel(dec!(0.5))),
        test_config(),
    )
    .await;

    let report = runner.run_once().await.unwrap();
    assert_eq!(report.opportunities, 0);
    assert_eq!(report.fills, 0);

    // Both markets get an audit row even though nothing traded.
    assert_eq!(runner.store().count().await.unwrap(), 2);
    let record = runner
        .store()
        .fetch("demo-2", report.cycle_ts)
        .await
        .unwrap()
        .unwrap();
    assert!(record.opportunity.is_none());
    assert!(record.order.is_none());
    assert!(record.fill.is_none());
}

#[tokio::test]
async fn test_consecutive_cycles_append_new_rows() {
    let mut runner = runner_with(
        PaperExchange::new(),
        Box::new(FixedModel(dec!(0.5))),
        test_config(),
    )
    .await;

    let first = runner.run_once().await.unwrap();
    let second = runner.run_once().await.unwrap();
    assert_eq!(first.cycle, 1);
    assert_eq!(second.cycle, 2);
    assert_eq!(runner.store().count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_stale_quotes_are_skipped_not_traded() {
    let market = Market::new("old-1", "stale market");
    let mut quote = snapshot("old-1", dec!(0.40));
    quote.timestamp = Utc::now() - Duration::seconds(600);
    let exchange = PaperExchange::with_markets(vec![market], vec![quote]);

    let mut runner = runner_with(
        exchange,
        Box::new(FixedModel(dec!(0.55))),
        test_config(),
    )
    .await;

    let report = runner.run_once().await.unwrap();
    assert_eq!(report.markets_evaluated, 0);
    assert_eq!(report.markets_skipped, 1);
    assert_eq!(runner.store().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_one_failing_market_does_not_abort_the_cycle() {
    let markets = vec![
        Market::new("ok-1", "healthy market"),
        Market::new("bad-1", "market with a broken signal source"),
    ];
    let quotes = vec![snapshot("ok-1", dec!(0.40)), snapshot("bad-1", dec!(0.40))];
    let exchange = PaperExchange::with_markets(markets, quotes);

    let mut runner = runner_with(
        exchange,
        Box::new(FlakyModel {
            failing_id: "bad-1".to_string(),
        }),
        test_config(),
    )
    .await;

    let report = runner.run_once().await.unwrap();
    assert_eq!(report.markets_evaluated, 1);
    assert_eq!(report.markets_skipped, 1);
    assert!(runner
        .store()
        .fetch("ok-1", report.cycle_ts)
        .await
        .unwrap()
        .is_some());
    assert!(runner
        .store()
        .fetch("bad-1", report.cycle_ts)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_portfolio_cap_is_not_overcommitted_within_a_cycle() {
    // Two identical markets, each wanting a 62.5 stake; the portfolio cap of
    // 80 leaves only 17.5 of headroom for the second.
    let markets = vec![
        Market::new("m1", "first market"),
        Market::new("m2", "second market"),
    ];
    let quotes = vec![snapshot("m1", dec!(0.40)), snapshot("m2", dec!(0.40))];
    let exchange = PaperExchange::with_markets(markets, quotes);

    let config = AppConfig {
        max_portfolio_exposure_usd: 80.0,
        ..test_config()
    };
    let mut runner = runner_with(exchange, Box::new(FixedModel(dec!(0.55))), config).await;

    let report = runner.run_once().await.unwrap();
    assert_eq!(report.fills, 2);

    let first = runner
        .store()
        .fetch("m1", report.cycle_ts)
        .await
        .unwrap()
        .unwrap();
    let second = runner
        .store()
        .fetch("m2", report.cycle_ts)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.order.unwrap().stake, dec!(62.5));
    assert_eq!(second.order.unwrap().stake, dec!(17.5));
}

#[tokio::test]
async fn test_liquidity_floor_suppresses_opportunity_but_logs_decision() {
    let market = Market::new("thin-1", "thin market");
    let mut quote = snapshot("thin-1", dec!(0.40));
    quote.liquidity_usd = Some(dec!(50));
    let exchange = PaperExchange::with_markets(vec![market], vec![quote]);

    let config = AppConfig {
        min_liquidity_usd: 200.0,
        ..test_config()
    };
    let mut runner = runner_with(exchange, Box::new(FixedModel(dec!(0.55))), config).await;

    let report = runner.run_once().await.unwrap();
    assert_eq!(report.markets_evaluated, 1);
    assert_eq!(report.opportunities, 0);

    let record = runner
        .store()
        .fetch("thin-1", report.cycle_ts)
        .await
        .unwrap()
        .unwrap();
    assert!(record.opportunity.is_none());
}
