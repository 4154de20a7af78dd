//! Fractional-Kelly position sizing with hard caps

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

use super::exposure::ExposureView;
use crate::common::types::{FairValueEstimate, MarketSnapshot, Opportunity, SizedOrder};

/// Hard ceilings applied to every stake, each taken as a minimum
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingCaps {
    /// Per-trade absolute cap in USD
    pub per_trade_usd: Decimal,
    /// Cumulative-exposure cap per market in USD
    pub per_market_usd: Decimal,
    /// Total at-risk capital cap across all markets in USD
    pub portfolio_usd: Decimal,
}

/// Sizing inputs held fixed across one cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingParams {
    pub bankroll_usd: Decimal,
    /// Fractional-Kelly multiplier in (0,1]
    pub kelly_multiplier: Decimal,
    pub caps: SizingCaps,
}

/// Full-Kelly stake fraction for a binary contract paying 1 unit.
///
/// Buying at `price`, the net odds are `b = (1 - price) / price` and
/// `f* = (b*p - (1-p)) / b`. The result is clipped to [0,1]; a negative
/// fraction means the bet has no edge and the stake is zero (never short
/// via this formula).
pub fn kelly_fraction(p: Decimal, price: Decimal) -> Decimal {
    let eps = dec!(0.000001);
    let price = price.clamp(eps, Decimal::ONE - eps);
    let b = (Decimal::ONE - price) / price;
    let q = Decimal::ONE - p;
    let f = (b * p - q) / b;
    f.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Size an opportunity against the bankroll and exposure state.
///
/// Raw stake is `f* * kelly_multiplier * bankroll`, then clipped by the
/// per-trade cap and by the remaining headroom under the per-market and
/// portfolio caps. If either exposure figure is unavailable the sizer fails
/// closed and returns a zero-stake order rather than guess; a zero stake is a
/// valid "no trade" outcome and the pipeline still logs the cycle.
pub fn size(
    opportunity: &Opportunity,
    snapshot: &MarketSnapshot,
    fair_value: &FairValueEstimate,
    params: &SizingParams,
    exposure: &dyn ExposureView,
) -> SizedOrder {
    let no_trade = SizedOrder {
        market_id: opportunity.market_id.clone(),
        side: opportunity.side,
        stake: Decimal::ZERO,
    };

    let p = fair_value.probability_for(opportunity.side);
    let price = snapshot.price_for(opportunity.side);

    let full_kelly = kelly_fraction(p, price);
    if full_kelly <= Decimal::ZERO {
        return no_trade;
    }

    let (market_exposure, portfolio_exposure) = match (
        exposure.market_exposure(&opportunity.market_id),
        exposure.portfolio_exposure(),
    ) {
        (Some(market), Some(portfolio)) => (market, portfolio),
        _ => {
            debug!(
                market_id = %opportunity.market_id,
                "exposure unavailable, failing closed to zero stake"
            );
            return no_trade;
        }
    };

    let raw = full_kelly * params.kelly_multiplier * params.bankroll_usd;
    let market_headroom = (params.caps.per_market_usd - market_exposure).max(Decimal::ZERO);
    let portfolio_headroom = (params.caps.portfolio_usd - portfolio_exposure).max(Decimal::ZERO);

    let stake = raw
        .min(params.caps.per_trade_usd)
        .min(market_headroom)
        .min(portfolio_headroom);

    SizedOrder {
        market_id: opportunity.market_id.clone(),
        side: opportunity.side,
        stake,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::types::Side;
    use crate::engine::exposure::CycleExposure;
    use chrono::Utc;

    /// Exposure source that cannot answer, for fail-closed tests
    struct UnknownExposure;

    impl ExposureView for UnknownExposure {
        fn market_exposure(&self, _market_id: &str) -> Option<Decimal> {
            None
        }

        fn portfolio_exposure(&self) -> Option<Decimal> {
            None
        }
    }

    fn snapshot(yes: Decimal) -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".to_string(),
            question: "test market".to_string(),
            yes_price: yes,
            no_price: Decimal::ONE - yes,
            liquidity_usd: None,
            timestamp: Utc::now(),
        }
    }

    fn opportunity(side: Side, edge: Decimal) -> Opportunity {
        Opportunity {
            market_id: "m1".to_string(),
            side,
            edge,
        }
    }

    fn params(caps: SizingCaps) -> SizingParams {
        SizingParams {
            bankroll_usd: dec!(1000),
            kelly_multiplier: dec!(0.25),
            caps,
        }
    }

    fn wide_caps() -> SizingCaps {
        SizingCaps {
            per_trade_usd: dec!(1000),
            per_market_usd: dec!(1000),
            portfolio_usd: dec!(1000),
        }
    }

    #[test]
    fn test_kelly_fraction_even_odds() {
        // price 0.5 => b=1, f* = 2p - 1
        assert_eq!(kelly_fraction(dec!(0.65), dec!(0.5)), dec!(0.30));
        assert_eq!(kelly_fraction(dec!(0.5), dec!(0.5)), Decimal::ZERO);
    }

    #[test]
    fn test_kelly_fraction_never_negative() {
        assert_eq!(kelly_fraction(dec!(0.30), dec!(0.5)), Decimal::ZERO);
        assert_eq!(kelly_fraction(dec!(0.10), dec!(0.90)), Decimal::ZERO);
    }

    #[test]
    fn test_quarter_kelly_stake() {
        // f* = 0.30, kelly 0.25, bankroll 1000, caps all above 100 -> 75
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let order = size(&opp, &snap, &fv, &params(wide_caps()), &CycleExposure::new());
        assert_eq!(order.stake, dec!(75));
    }

    #[test]
    fn test_per_trade_cap_clips_stake() {
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let caps = SizingCaps {
            per_trade_usd: dec!(50),
            ..wide_caps()
        };
        let order = size(&opp, &snap, &fv, &params(caps), &CycleExposure::new());
        assert_eq!(order.stake, dec!(50));
    }

    #[test]
    fn test_market_headroom_clips_stake() {
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let caps = SizingCaps {
            per_market_usd: dec!(100),
            ..wide_caps()
        };
        let mut exposure = CycleExposure::new();
        exposure.commit("m1", dec!(70));
        let order = size(&opp, &snap, &fv, &params(caps), &exposure);
        assert_eq!(order.stake, dec!(30));
    }

    #[test]
    fn test_portfolio_headroom_clips_stake() {
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let caps = SizingCaps {
            portfolio_usd: dec!(200),
            ..wide_caps()
        };
        let mut exposure = CycleExposure::new();
        exposure.commit("other", dec!(180));
        let order = size(&opp, &snap, &fv, &params(caps), &exposure);
        assert_eq!(order.stake, dec!(20));
    }

    #[test]
    fn test_unknown_exposure_fails_closed() {
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let order = size(&opp, &snap, &fv, &params(wide_caps()), &UnknownExposure);
        assert_eq!(order.stake, Decimal::ZERO);
    }

    #[test]
    fn test_negative_full_kelly_yields_zero() {
        // Fair value below market price: f* <= 0
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.40));
        let opp = opportunity(Side::Yes, dec!(-0.10));
        let order = size(&opp, &snap, &fv, &params(wide_caps()), &CycleExposure::new());
        assert_eq!(order.stake, Decimal::ZERO);
    }

    #[test]
    fn test_monotone_in_kelly_multiplier() {
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let exposure = CycleExposure::new();
        let mut last = Decimal::ZERO;
        for multiplier in [dec!(0.1), dec!(0.25), dec!(0.5), dec!(0.75), dec!(1.0)] {
            let p = SizingParams {
                bankroll_usd: dec!(1000),
                kelly_multiplier: multiplier,
                caps: wide_caps(),
            };
            let stake = size(&opp, &snap, &fv, &p, &exposure).stake;
            assert!(stake >= last, "stake must not decrease as multiplier grows");
            last = stake;
        }
    }

    #[test]
    fn test_size_is_idempotent() {
        let snap = snapshot(dec!(0.5));
        let fv = FairValueEstimate::new(dec!(0.65));
        let opp = opportunity(Side::Yes, dec!(0.15));
        let exposure = CycleExposure::new();
        let first = size(&opp, &snap, &fv, &params(wide_caps()), &exposure);
        let second = size(&opp, &snap, &fv, &params(wide_caps()), &exposure);
        assert_eq!(first, second);
    }
}
