//! Configuration types

use serde::{Deserialize, Serialize};

use crate::common::errors::{EngineError, Result};

/// Trading mode; only paper trading produces side effects in this scaffold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Paper,
}

/// Which market-data/quote adapter to drive the cycle with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangeKind {
    /// Internal stub exchange with demo markets
    Paper,
    /// Read-only Gamma + CLOB adapter (dry-run decisions against real markets)
    PolymarketPublic,
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Execution mode
    #[serde(default = "default_mode")]
    pub mode: TradingMode,
    /// Exchange adapter selection
    #[serde(default = "default_exchange")]
    pub exchange: ExchangeKind,
    /// Continuous-mode sleep duration between cycles
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Opportunity threshold on the absolute edge, in (0,1)
    #[serde(default = "default_min_edge")]
    pub min_edge: f64,
    /// Cap on markets evaluated per cycle
    #[serde(default = "default_max_markets")]
    pub max_markets: usize,
    /// Markets with known liquidity below this are never opportunities
    #[serde(default = "default_min_liquidity_usd")]
    pub min_liquidity_usd: f64,
    /// Hypothetical bankroll the Kelly stake is computed against
    #[serde(default = "default_bankroll_usd")]
    pub bankroll_usd: f64,
    /// Fractional-Kelly multiplier in (0,1]
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_multiplier: f64,
    /// Per-trade absolute stake cap in USD
    #[serde(default = "default_max_stake_usd")]
    pub max_stake_usd: f64,
    /// Cumulative exposure cap per market in USD
    #[serde(default = "default_max_market_exposure_usd")]
    pub max_market_exposure_usd: f64,
    /// Total at-risk capital cap across all markets in USD
    #[serde(default = "default_max_portfolio_exposure_usd")]
    pub max_portfolio_exposure_usd: f64,
    /// Snapshots older than this are not acted upon
    #[serde(default = "default_max_quote_age_seconds")]
    pub max_quote_age_seconds: u64,
    /// Path to a JSON mapping of location name -> lat/lon for the weather model
    #[serde(default)]
    pub locations_file: Option<String>,
    /// User-Agent sent to the NWS API (it requires a descriptive one)
    #[serde(default = "default_nws_user_agent")]
    pub nws_user_agent: String,
    /// Realized-vol lookback for the BTC threshold model, in days
    #[serde(default = "default_btc_vol_lookback_days")]
    pub btc_vol_lookback_days: u32,
    /// Drift assumption passed to the BTC threshold model
    #[serde(default)]
    pub btc_drift_mu: f64,
    /// 1m-candle lookback for the BTC interval models, in minutes
    #[serde(default = "default_btc_lookback_minutes")]
    pub btc_lookback_minutes: u32,
    /// Sqlite file the decision log is appended to
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            exchange: default_exchange(),
            interval_seconds: default_interval_seconds(),
            min_edge: default_min_edge(),
            max_markets: default_max_markets(),
            min_liquidity_usd: default_min_liquidity_usd(),
            bankroll_usd: default_bankroll_usd(),
            kelly_multiplier: default_kelly_multiplier(),
            max_stake_usd: default_max_stake_usd(),
            max_market_exposure_usd: default_max_market_exposure_usd(),
            max_portfolio_exposure_usd: default_max_portfolio_exposure_usd(),
            max_quote_age_seconds: default_max_quote_age_seconds(),
            locations_file: None,
            nws_user_agent: default_nws_user_agent(),
            btc_vol_lookback_days: default_btc_vol_lookback_days(),
            btc_drift_mu: 0.0,
            btc_lookback_minutes: default_btc_lookback_minutes(),
            database_path: default_database_path(),
        }
    }
}

impl AppConfig {
    /// Reject malformed values at startup rather than deep in the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.interval_seconds == 0 {
            return Err(EngineError::Configuration(
                "interval_seconds must be positive".to_string(),
            ));
        }
        if !(self.min_edge > 0.0 && self.min_edge < 1.0) {
            return Err(EngineError::Configuration(format!(
                "min_edge must be in (0,1), got {}",
                self.min_edge
            )));
        }
        if self.max_markets == 0 {
            return Err(EngineError::Configuration(
                "max_markets must be positive".to_string(),
            ));
        }
        if !(self.kelly_multiplier > 0.0 && self.kelly_multiplier <= 1.0) {
            return Err(EngineError::Configuration(format!(
                "kelly_multiplier must be in (0,1], got {}",
                self.kelly_multiplier
            )));
        }
        if !(self.bankroll_usd.is_finite() && self.bankroll_usd > 0.0) {
            return Err(EngineError::Configuration(format!(
                "bankroll_usd must be positive, got {}",
                self.bankroll_usd
            )));
        }
        for (name, value) in [
            ("max_stake_usd", self.max_stake_usd),
            ("max_market_exposure_usd", self.max_market_exposure_usd),
            ("max_portfolio_exposure_usd", self.max_portfolio_exposure_usd),
            ("min_liquidity_usd", self.min_liquidity_usd),
        ] {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::Configuration(format!(
                    "{} must be non-negative, got {}",
                    name, value
                )));
            }
        }
        if self.max_quote_age_seconds == 0 {
            return Err(EngineError::Configuration(
                "max_quote_age_seconds must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_mode() -> TradingMode {
    TradingMode::Paper
}

fn default_exchange() -> ExchangeKind {
    ExchangeKind::Paper
}

fn default_interval_seconds() -> u64 {
    600
}

fn default_min_edge() -> f64 {
    0.08
}

fn default_max_markets() -> usize {
    1000
}

fn default_min_liquidity_usd() -> f64 {
    200.0
}

fn default_bankroll_usd() -> f64 {
    1000.0
}

fn default_kelly_multiplier() -> f64 {
    0.25
}

fn default_max_stake_usd() -> f64 {
    60.0
}

fn default_max_market_exposure_usd() -> f64 {
    120.0
}

fn default_max_portfolio_exposure_usd() -> f64 {
    300.0
}

fn default_max_quote_age_seconds() -> u64 {
    120
}

fn default_nws_user_agent() -> String {
    "polyscout/0.1 (contact: you@example.com)".to_string()
}

fn default_btc_vol_lookback_days() -> u32 {
    30
}

fn default_btc_lookback_minutes() -> u32 {
    240
}

fn default_database_path() -> String {
    "polyscout.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_interval() {
        let cfg = AppConfig {
            interval_seconds: 0,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_min_edge_out_of_range() {
        for bad in [0.0, 1.0, 1.5, -0.1] {
            let cfg = AppConfig {
                min_edge: bad,
                ..AppConfig::default()
            };
            assert!(cfg.validate().is_err(), "min_edge {} should be rejected", bad);
        }
    }

    #[test]
    fn test_rejects_full_kelly_overshoot() {
        let cfg = AppConfig {
            kelly_multiplier: 1.5,
            ..AppConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
