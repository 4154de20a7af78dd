//! Run loop: drives the detect -> size -> place -> log pipeline over all
//! known markets, once or on a fixed interval

use chrono::{DateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::common::errors::{EngineError, Result};
use crate::common::types::{DecisionRecord, Market, MarketSnapshot};
use crate::config::{AppConfig, ExchangeKind};
use crate::engine::{
    detect, passes_liquidity_gate, size, CycleExposure, SizingCaps, SizingParams,
};
use crate::exchange::{BoxedExchange, PaperExchange, PolymarketPublicExchange};
use crate::models::{FairValueModel, FairValueRouter};
use crate::storage::DecisionStore;

/// Explicit per-cycle state; nothing here is process-global, so concurrent
/// tests can instantiate independent runs.
pub struct CycleContext {
    pub cycle: u64,
    pub cycle_ts: DateTime<Utc>,
    pub exposure: CycleExposure,
}

impl CycleContext {
    fn new(cycle: u64) -> Self {
        Self {
            cycle,
            cycle_ts: Utc::now(),
            exposure: CycleExposure::new(),
        }
    }
}

/// Summary of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub cycle_ts: DateTime<Utc>,
    pub markets_evaluated: usize,
    pub markets_skipped: usize,
    pub opportunities: usize,
    pub fills: usize,
}

fn decimal_setting(value: f64, name: &str) -> Result<Decimal> {
    Decimal::from_f64(value)
        .ok_or_else(|| EngineError::Configuration(format!("{} is not representable: {}", name, value)))
}

/// Orchestrates evaluation cycles over the configured exchange, model router
/// and decision store
pub struct Runner {
    config: AppConfig,
    min_edge: Decimal,
    min_liquidity_usd: Decimal,
    sizing: SizingParams,
    exchange: BoxedExchange,
    model: Box<dyn FairValueModel>,
    store: DecisionStore,
    cycle: u64,
}

/// Wire a runner from configuration: adapter by `exchange`, the default
/// model router, and the sqlite decision store.
pub async fn build_runner(config: AppConfig) -> Result<Runner> {
    let exchange: BoxedExchange = match config.exchange {
        ExchangeKind::Paper => Box::new(PaperExchange::new()),
        ExchangeKind::PolymarketPublic => {
            Box::new(PolymarketPublicExchange::new(&config.nws_user_agent)?)
        }
    };
    let model = Box::new(FairValueRouter::with_default_models(&config)?);
    let store = DecisionStore::open(&config.database_path).await?;
    Runner::new(config, exchange, model, store)
}

impl Runner {
    pub fn new(
        config: AppConfig,
        exchange: BoxedExchange,
        model: Box<dyn FairValueModel>,
        store: DecisionStore,
    ) -> Result<Self> {
        config.validate()?;
        let sizing = SizingParams {
            bankroll_usd: decimal_setting(config.bankroll_usd, "bankroll_usd")?,
            kelly_multiplier: decimal_setting(config.kelly_multiplier, "kelly_multiplier")?,
            caps: SizingCaps {
                per_trade_usd: decimal_setting(config.max_stake_usd, "max_stake_usd")?,
                per_market_usd: decimal_setting(
                    config.max_market_exposure_usd,
                    "max_market_exposure_usd",
                )?,
                portfolio_usd: decimal_setting(
                    config.max_portfolio_exposure_usd,
                    "max_portfolio_exposure_usd",
                )?,
            },
        };
        Ok(Self {
            min_edge: decimal_setting(config.min_edge, "min_edge")?,
            min_liquidity_usd: decimal_setting(config.min_liquidity_usd, "min_liquidity_usd")?,
            sizing,
            exchange,
            model,
            store,
            config,
            cycle: 0,
        })
    }

    /// The decision store this runner writes to
    pub fn store(&self) -> &DecisionStore {
        &self.store
    }

    /// Run one evaluation cycle over all currently known markets.
    ///
    /// Failing to fetch the market listing (or the quote batch) is
    /// cycle-fatal; everything else is isolated per market. Each market's
    /// size+place+log sequence completes against the shared cycle exposure
    /// before the next market is sized.
    pub async fn run_once(&mut self) -> Result<CycleReport> {
        self.cycle += 1;
        let mut ctx = CycleContext::new(self.cycle);

        let markets = self.exchange.list_markets(self.config.max_markets).await?;
        let ids: Vec<String> = markets.iter().map(|m| m.id.clone()).collect();
        let quotes = self.exchange.get_quotes(&ids).await?;
        let quotes_by_id: HashMap<String, MarketSnapshot> = quotes
            .into_iter()
            .map(|q| (q.market_id.clone(), q))
            .collect();

        info!(
            cycle = ctx.cycle,
            markets = markets.len(),
            quoted = quotes_by_id.len(),
            exchange = self.exchange.name(),
            "cycle started"
        );

        let mut report = CycleReport {
            cycle: ctx.cycle,
            cycle_ts: ctx.cycle_ts,
            markets_evaluated: 0,
            markets_skipped: 0,
            opportunities: 0,
            fills: 0,
        };

        for market in &markets {
            let Some(snapshot) = quotes_by_id.get(&market.id) else {
                debug!(market_id = %market.id, "no quote, skipping");
                report.markets_skipped += 1;
                continue;
            };

            match self.evaluate_market(market, snapshot, &mut ctx).await {
                Ok(record) => {
                    report.markets_evaluated += 1;
                    if record.opportunity.is_some() {
                        report.opportunities += 1;
                    }
                    if record.fill.is_some() {
                        report.fills += 1;
                    }
                }
                Err(e) if e.is_cycle_fatal() => return Err(e),
                Err(e) => {
                    warn!(market_id = %market.id, error = %e, "market skipped");
                    report.markets_skipped += 1;
                }
            }
        }

        info!(
            cycle = report.cycle,
            evaluated = report.markets_evaluated,
            skipped = report.markets_skipped,
            opportunities = report.opportunities,
            fills = report.fills,
            "cycle complete"
        );
        Ok(report)
    }

    /// Full pipeline for one market; the decision is durably recorded before
    /// this returns Ok.
    async fn evaluate_market(
        &self,
        market: &Market,
        snapshot: &MarketSnapshot,
        ctx: &mut CycleContext,
    ) -> Result<DecisionRecord> {
        if snapshot.is_stale(ctx.cycle_ts, self.config.max_quote_age_seconds) {
            return Err(EngineError::InvalidMarketData(format!(
                "snapshot for {} is older than {}s",
                market.id, self.config.max_quote_age_seconds
            )));
        }

        // Some adapters quote without repeating the question text.
        let mut snapshot = snapshot.clone();
        if snapshot.question.is_empty() {
            snapshot.question = market.question.clone();
        }

        let fair_value = self.model.estimate(market).await?;

        let opportunity = if passes_liquidity_gate(&snapshot, self.min_liquidity_usd) {
            detect(&snapshot, &fair_value, self.min_edge)?
        } else {
            debug!(market_id = %market.id, "below liquidity floor");
            None
        };

        let order = opportunity
            .as_ref()
            .map(|opp| size(opp, &snapshot, &fair_value, &self.sizing, &ctx.exposure));

        // Only the stub exchange supports placement; other adapters log the
        // sized decision without a fill.
        let fill = match &order {
            Some(order) if order.is_trade() && self.config.exchange == ExchangeKind::Paper => {
                self.exchange.place_order(order, &snapshot).await?
            }
            _ => None,
        };

        if let Some(fill) = &fill {
            ctx.exposure.commit(&fill.market_id, fill.stake);
            info!(
                market_id = %fill.market_id,
                side = %fill.side,
                stake = %fill.stake,
                price = %fill.fill_price,
                "filled"
            );
        } else if let Some(opp) = &opportunity {
            info!(
                market_id = %opp.market_id,
                side = %opp.side,
                edge = %opp.edge,
                "opportunity (no fill)"
            );
        }

        let record = DecisionRecord {
            market_id: market.id.clone(),
            cycle_ts: ctx.cycle_ts,
            snapshot,
            fair_value,
            opportunity,
            order,
            fill,
        };
        self.store.record(&record).await?;
        Ok(record)
    }

    /// Repeat `run_once` on a fixed wall-clock interval until the process is
    /// stopped. A failed cycle is logged and retried on the next tick; ticks
    /// never overlap a running cycle.
    pub async fn run_forever(&mut self) -> Result<()> {
        info!(
            interval_seconds = self.config.interval_seconds,
            "starting continuous runner"
        );
        let mut ticker = interval(Duration::from_secs(self.config.interval_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                warn!(error = %e, "cycle aborted; retrying next interval");
            }
        }
    }
}
