//! Short-horizon BTC direction models backed by Binance 1m candles
//!
//! Two flavors:
//! - [`BtcIntervalModel`] for the recurring "Bitcoin Up or Down" interval
//!   markets, which resolve Up when the price at the interval end is at or
//!   above the price at the interval start.
//! - [`BtcDirectionModel`] for free-form "BTC up/down in 15 minutes"
//!   questions with no listed interval times.
//!
//! Under a zero-drift lognormal baseline P(up) sits near 0.5; any edge comes
//! from the market mispricing, not the model.

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use rust_decimal_macros::dec;
use std::sync::OnceLock;

use super::{normal_cdf, probability_from_f64, FairValueModel};
use crate::common::errors::Result;
use crate::common::types::{FairValueEstimate, Market};
use crate::sources::binance::{parse_klines, realized_vol_from_closes, BinanceClient, Candle};

const MIN_CANDLES: usize = 50;
/// 1m returns
const PERIODS_PER_YEAR: f64 = 60.0 * 24.0 * 365.0;
const FALLBACK_SIGMA: f64 = 0.8;

fn updown_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)bitcoin\s+up\s+or\s+down").unwrap())
}

fn btc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bbitcoin\b|\bbtc\b").unwrap())
}

fn up_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(up|higher|increase|rise)\b").unwrap())
}

fn down_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(down|lower|decrease|fall)\b").unwrap())
}

fn fifteen_minute_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b15\s*(min|mins|minute|minutes)\b").unwrap())
}

/// Recognize recurring "Bitcoin Up or Down" interval markets by title
pub fn is_updown_interval_question(text: &str) -> bool {
    updown_re().is_match(text)
}

/// Direction asked by a free-form 15-minute question, if recognizable.
/// Returns `Some(true)` for up, `Some(false)` for down.
pub fn parse_direction_question(text: &str) -> Option<bool> {
    if !btc_re().is_match(text) || !fifteen_minute_re().is_match(text) {
        return None;
    }
    let up = up_re().is_match(text);
    let down = down_re().is_match(text);
    if up == down {
        return None;
    }
    Some(up)
}

/// P(S_T >= target) starting from `spot` under zero-drift GBM
fn prob_end_at_or_above(spot: f64, target: f64, sigma_ann: f64, t_years: f64) -> f64 {
    if spot <= 0.0 || target <= 0.0 {
        return 0.5;
    }
    let sigt = sigma_ann * t_years.sqrt();
    if sigt <= 0.0 {
        return 0.5;
    }
    let mu = -0.5 * sigma_ann * sigma_ann * t_years;
    let z = ((target / spot).ln() - mu) / sigt;
    (1.0 - normal_cdf(z)).clamp(0.0, 1.0)
}

async fn recent_candles(binance: &BinanceClient, limit: u32) -> Result<Vec<Candle>> {
    let rows = binance.klines("BTCUSDT", "1m", limit).await?;
    Ok(parse_klines(&rows))
}

fn lookback_sigma(candles: &[Candle], lookback_minutes: u32) -> f64 {
    let take = (lookback_minutes as usize).min(candles.len());
    let closes: Vec<f64> = candles[candles.len() - take..]
        .iter()
        .map(|c| c.close)
        .collect();
    realized_vol_from_closes(&closes, PERIODS_PER_YEAR).unwrap_or(FALLBACK_SIGMA)
}

/// Recurring interval markets: estimate P(price at close >= price at start)
pub struct BtcIntervalModel {
    binance: BinanceClient,
    lookback_minutes: u32,
}

impl BtcIntervalModel {
    pub fn new(binance: BinanceClient, lookback_minutes: u32) -> Self {
        Self {
            binance,
            lookback_minutes,
        }
    }
}

#[async_trait]
impl FairValueModel for BtcIntervalModel {
    fn name(&self) -> &'static str {
        "btc-updown-interval"
    }

    fn recognizes(&self, market: &Market) -> bool {
        is_updown_interval_question(&market.question)
    }

    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate> {
        let (Some(start_time), Some(close_time)) = (market.start_time, market.close_time) else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0.05))
                .with_rationale("missing interval start/end"));
        };

        let now = Utc::now();
        if now >= close_time {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0))
                .with_rationale("interval ended"));
        }

        let candles = recent_candles(&self.binance, 1000).await?;
        if candles.len() < MIN_CANDLES {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0.1))
                .with_rationale("insufficient candles"));
        }

        // Interval start price: the open of the first candle at/after the
        // start; earliest candle if the window doesn't reach back that far.
        let start_px = candles
            .iter()
            .find(|c| c.open_time >= start_time)
            .map(|c| c.open)
            .unwrap_or(candles[0].open);
        let spot = candles[candles.len() - 1].close;

        let remaining_seconds = (close_time - now).num_seconds().max(1) as f64;
        let t_years = remaining_seconds / (365.0 * 24.0 * 3600.0);
        let sigma = lookback_sigma(&candles, self.lookback_minutes);

        let p_up = prob_end_at_or_above(spot, start_px, sigma, t_years);

        Ok(FairValueEstimate::new(probability_from_f64(p_up))
            .with_confidence(dec!(0.30))
            .with_rationale(format!(
                "Binance BTCUSDT proxy; start={:.2}, spot={:.2}, rem={:.1}m, sigma~{:.2}ann",
                start_px,
                spot,
                remaining_seconds / 60.0,
                sigma
            )))
    }
}

/// Free-form "up/down in 15 minutes" questions: fixed horizon from spot
pub struct BtcDirectionModel {
    binance: BinanceClient,
    lookback_minutes: u32,
}

impl BtcDirectionModel {
    pub fn new(binance: BinanceClient, lookback_minutes: u32) -> Self {
        Self {
            binance,
            lookback_minutes,
        }
    }
}

#[async_trait]
impl FairValueModel for BtcDirectionModel {
    fn name(&self) -> &'static str {
        "btc-15m-direction"
    }

    fn recognizes(&self, market: &Market) -> bool {
        parse_direction_question(&market.question).is_some()
    }

    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate> {
        let Some(asks_up) = parse_direction_question(&market.question) else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0))
                .with_rationale("not a BTC 15m direction question"));
        };

        let limit = self.lookback_minutes.min(1000).max(MIN_CANDLES as u32);
        let candles = recent_candles(&self.binance, limit).await?;
        if candles.len() < MIN_CANDLES {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0.1))
                .with_rationale("insufficient candles"));
        }

        let spot = candles[candles.len() - 1].close;
        let sigma = lookback_sigma(&candles, self.lookback_minutes);
        let t_years = (15.0 * 60.0) / (365.0 * 24.0 * 3600.0);

        // With zero drift the median return is slightly negative, so
        // P(up) sits just under 0.5.
        let p_up = prob_end_at_or_above(spot, spot, sigma, t_years);
        let p_yes = if asks_up { p_up } else { 1.0 - p_up };

        Ok(FairValueEstimate::new(probability_from_f64(p_yes))
            .with_confidence(dec!(0.25))
            .with_rationale(format!(
                "Binance BTCUSDT 1m; s0={:.0}; sigma~{:.2}ann; horizon=15m",
                spot, sigma
            )))
    }
}
