//! Core data model shared across the engine pipeline

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome side of a binary market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Yes,
    No,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "YES"),
            Side::No => write!(f, "NO"),
        }
    }
}

impl Side {
    /// The opposite outcome
    pub fn other(self) -> Self {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

/// A binary market as listed by an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Market {
    /// Opaque stable identifier
    pub id: String,
    /// Free-text description of the resolution condition
    pub question: String,
    /// Exchange-supplied category label, if any
    #[serde(default)]
    pub category: Option<String>,
    /// Interval start, for recurring interval markets
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    /// Market close/resolution time
    #[serde(default)]
    pub close_time: Option<DateTime<Utc>>,
}

impl Market {
    pub fn new(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            category: None,
            start_time: None,
            close_time: None,
        }
    }
}

/// Immutable record of a market's tradable state at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Market identifier
    pub market_id: String,
    /// Resolution question, carried for the decision log
    pub question: String,
    /// Implied probability of YES in [0,1]
    pub yes_price: Decimal,
    /// Implied probability of NO in [0,1]
    pub no_price: Decimal,
    /// Reported liquidity in USD, used only as an optional filter
    #[serde(default)]
    pub liquidity_usd: Option<Decimal>,
    /// Capture time
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    /// Quoted price for the given side
    pub fn price_for(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_price,
            Side::No => self.no_price,
        }
    }

    /// Whether this snapshot is older than `max_age_seconds` as of `now`
    pub fn is_stale(&self, now: DateTime<Utc>, max_age_seconds: u64) -> bool {
        now - self.timestamp > Duration::seconds(max_age_seconds as i64)
    }
}

/// A model's probability estimate that the YES outcome resolves true
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FairValueEstimate {
    /// P(YES) in [0,1]
    pub probability: Decimal,
    /// Source-defined weight in [0,1]; not required by the core logic
    #[serde(default)]
    pub confidence: Option<Decimal>,
    /// Human-readable note about how the estimate was produced
    #[serde(default)]
    pub rationale: Option<String>,
}

impl FairValueEstimate {
    pub fn new(probability: Decimal) -> Self {
        Self {
            probability,
            confidence: None,
            rationale: None,
        }
    }

    pub fn with_confidence(mut self, confidence: Decimal) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// Implied probability that the given side resolves true
    pub fn probability_for(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.probability,
            Side::No => Decimal::ONE - self.probability,
        }
    }
}

/// A positive-edge opening detected on one side of a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    pub market_id: String,
    pub side: Side,
    /// Fair-value probability minus market-implied price for `side`
    pub edge: Decimal,
}

/// A hypothetical position sized by the fractional-Kelly sizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizedOrder {
    pub market_id: String,
    pub side: Side,
    /// Stake in USD; zero means "no trade" and is still logged
    pub stake: Decimal,
}

impl SizedOrder {
    /// Whether this order commits any capital
    pub fn is_trade(&self) -> bool {
        self.stake > Decimal::ZERO
    }
}

/// A simulated fill produced by the paper exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub market_id: String,
    pub side: Side,
    pub stake: Decimal,
    /// Quoted price at which the full stake was filled
    pub fill_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// One persisted row per market per evaluation cycle.
///
/// Append-only: created at the end of one cycle's processing of one market
/// and never mutated after write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub market_id: String,
    /// Timestamp of the cycle that produced this record
    pub cycle_ts: DateTime<Utc>,
    pub snapshot: MarketSnapshot,
    pub fair_value: FairValueEstimate,
    pub opportunity: Option<Opportunity>,
    pub order: Option<SizedOrder>,
    pub fill: Option<Fill>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(yes: Decimal, no: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".to_string(),
            question: "Will it rain tomorrow?".to_string(),
            yes_price: yes,
            no_price: no,
            liquidity_usd: None,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_price_for_side() {
        let snap = snapshot(dec!(0.40), dec!(0.60));
        assert_eq!(snap.price_for(Side::Yes), dec!(0.40));
        assert_eq!(snap.price_for(Side::No), dec!(0.60));
    }

    #[test]
    fn test_staleness_window() {
        let mut snap = snapshot(dec!(0.40), dec!(0.60));
        let now = Utc::now();
        snap.timestamp = now - Duration::seconds(121);
        assert!(snap.is_stale(now, 120));
        snap.timestamp = now - Duration::seconds(30);
        assert!(!snap.is_stale(now, 120));
    }

    #[test]
    fn test_fair_value_probability_for_no() {
        let fv = FairValueEstimate::new(dec!(0.55));
        assert_eq!(fv.probability_for(Side::Yes), dec!(0.55));
        assert_eq!(fv.probability_for(Side::No), dec!(0.45));
    }

    #[test]
    fn test_zero_stake_is_not_a_trade() {
        let order = SizedOrder {
            market_id: "m1".to_string(),
            side: Side::Yes,
            stake: Decimal::ZERO,
        };
        assert!(!order.is_trade());
    }
}
