//! GBM fair-value model for "BTC above/below $K by DATE" markets

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use regex::Regex;
use rust_decimal_macros::dec;
use std::sync::OnceLock;
use tracing::debug;

use super::{normal_cdf, probability_from_f64, FairValueModel};
use crate::common::errors::Result;
use crate::common::types::{FairValueEstimate, Market};
use crate::sources::coingecko::CoinGeckoClient;

/// Parsed above/below question
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdQuestion {
    pub above: bool,
    pub strike: f64,
    pub expiry: DateTime<Utc>,
}

fn btc_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bbitcoin\b|\bbtc\b").unwrap())
}

fn direction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\b(above|over|below|under)\b").unwrap())
}

fn strike_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\$\s*([0-9]{1,3}(?:,[0-9]{3})*|[0-9]+)(?:\.(\d+))?\s*([kKmM])?").unwrap()
    })
}

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap())
}

fn parse_strike(text: &str) -> Option<f64> {
    let caps = strike_re().captures(text)?;
    let whole = caps[1].replace(',', "");
    let number = match caps.get(2) {
        Some(frac) => format!("{}.{}", whole, frac.as_str()),
        None => whole,
    };
    let base: f64 = number.parse().ok()?;
    let mult = match caps.get(3).map(|m| m.as_str().to_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    };
    Some(base * mult)
}

fn parse_expiry(text: &str) -> Option<DateTime<Utc>> {
    let caps = iso_date_re().captures(text)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    // End of day UTC
    Utc.with_ymd_and_hms(year, month, day, 23, 59, 59).single()
}

/// Recognize "Will Bitcoin be above $95,000 on 2026-12-31?" style questions
pub fn parse_threshold_question(text: &str) -> Option<ThresholdQuestion> {
    if !btc_re().is_match(text) {
        return None;
    }
    let direction = direction_re().captures(text)?;
    let above = matches!(direction[1].to_lowercase().as_str(), "above" | "over");
    Some(ThresholdQuestion {
        above,
        strike: parse_strike(text)?,
        expiry: parse_expiry(text)?,
    })
}

/// P(S_T > K) under GBM with drift `mu` and annualized vol `sigma`.
///
/// ln S_T ~ ln s0 + (mu - 0.5 sigma^2) T + sigma sqrt(T) Z
pub fn prob_above_lognormal(s0: f64, k: f64, sigma_ann: f64, t_years: f64, mu: f64) -> f64 {
    if s0 <= 0.0 || k <= 0.0 || sigma_ann <= 0.0 || t_years <= 0.0 {
        return 0.5;
    }
    let sigt = sigma_ann * t_years.sqrt();
    let z = ((k / s0).ln() - (mu - 0.5 * sigma_ann * sigma_ann) * t_years) / sigt;
    (1.0 - normal_cdf(z)).clamp(0.0, 1.0)
}

/// Crude quantitative baseline: CoinGecko spot, realized vol from hourly
/// closes over the lookback window, GBM with configurable drift.
pub struct BtcThresholdModel {
    coingecko: CoinGeckoClient,
    vol_lookback_days: u32,
    drift_mu: f64,
}

impl BtcThresholdModel {
    pub fn new(coingecko: CoinGeckoClient, vol_lookback_days: u32, drift_mu: f64) -> Self {
        Self {
            coingecko,
            vol_lookback_days,
            drift_mu,
        }
    }
}

#[async_trait]
impl FairValueModel for BtcThresholdModel {
    fn name(&self) -> &'static str {
        "btc-threshold"
    }

    fn recognizes(&self, market: &Market) -> bool {
        parse_threshold_question(&market.question).is_some()
    }

    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate> {
        let Some(q) = parse_threshold_question(&market.question) else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0))
                .with_rationale("not a BTC threshold question"));
        };

        let now = Utc::now();
        if q.expiry <= now {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0))
                .with_rationale("expired"));
        }

        let Some(spot) = self.coingecko.spot_usd("bitcoin").await? else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0.05))
                .with_rationale("spot unavailable"));
        };

        let closes = self
            .coingecko
            .market_chart_prices("bitcoin", self.vol_lookback_days)
            .await?;
        // Hourly series => ~24*365 periods/year
        let realized = crate::sources::binance::realized_vol_from_closes(&closes, 24.0 * 365.0);
        let (sigma, confidence, vol_note) = match realized {
            Some(sigma) if sigma > 0.0 => {
                (sigma, dec!(0.45), format!("realized vol {:.2} ann", sigma))
            }
            _ => (0.8, dec!(0.2), "fallback sigma".to_string()),
        };

        let t_years = (q.expiry - now).num_seconds() as f64 / (365.0 * 24.0 * 3600.0);
        let p_above = prob_above_lognormal(spot, q.strike, sigma, t_years, self.drift_mu);
        let p_yes = if q.above { p_above } else { 1.0 - p_above };

        debug!(market_id = %market.id, spot, strike = q.strike, t_years, "BTC threshold estimate");

        Ok(FairValueEstimate::new(probability_from_f64(p_yes))
            .with_confidence(confidence)
            .with_rationale(format!(
                "CoinGecko spot={:.0}, strike={:.0}, T={:.3}y, {}",
                spot, q.strike, t_years, vol_note
            )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_threshold_question() {
        let q = parse_threshold_question("Will Bitcoin close above $95,000 on 2026-12-31?")
            .unwrap();
        assert!(q.above);
        assert_eq!(q.strike, 95_000.0);
        assert_eq!(
            q.expiry,
            Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 59).unwrap()
        );
    }

    #[test]
    fn test_parse_suffix_strikes() {
        let q = parse_threshold_question("BTC under $120k on 2026-09-01?").unwrap();
        assert!(!q.above);
        assert_eq!(q.strike, 120_000.0);
    }

    #[test]
    fn test_parse_requires_all_parts() {
        assert!(parse_threshold_question("Will Bitcoin go above the moon?").is_none());
        assert!(parse_threshold_question("Will ETH be above $5,000 on 2026-12-31?").is_none());
        assert!(parse_threshold_question("Will BTC be above $95,000 soon?").is_none());
    }

    #[test]
    fn test_prob_above_midpoint() {
        // Strike at the GBM median: P = 0.5 exactly
        let sigma: f64 = 0.8;
        let t: f64 = 0.25;
        let median = 100.0 * (-0.5 * sigma * sigma * t).exp();
        let p = prob_above_lognormal(100.0, median, sigma, t, 0.0);
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_prob_above_monotone_in_strike() {
        let low = prob_above_lognormal(100.0, 80.0, 0.8, 0.25, 0.0);
        let high = prob_above_lognormal(100.0, 120.0, 0.8, 0.25, 0.0);
        assert!(low > high);
    }

    #[test]
    fn test_prob_above_degenerate_inputs() {
        assert_eq!(prob_above_lognormal(0.0, 100.0, 0.8, 0.25, 0.0), 0.5);
        assert_eq!(prob_above_lognormal(100.0, 100.0, 0.0, 0.25, 0.0), 0.5);
        assert_eq!(prob_above_lognormal(100.0, 100.0, 0.8, 0.0, 0.0), 0.5);
    }
}
