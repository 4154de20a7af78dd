//! Cycle-scoped exposure accounting for the position sizer

use rust_decimal::Decimal;
use std::collections::HashMap;

/// Read-only view of current at-risk capital.
///
/// `None` means the figure is unavailable; the sizer fails closed on it.
pub trait ExposureView {
    /// Sum of open stakes in one market
    fn market_exposure(&self, market_id: &str) -> Option<Decimal>;

    /// Total at-risk capital across all markets
    fn portfolio_exposure(&self) -> Option<Decimal>;
}

/// Mutable exposure accumulator scoped to one evaluation cycle.
///
/// Each market's size+place+log sequence commits its stake here before the
/// next market is sized, so the portfolio cap cannot be over-committed within
/// a cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleExposure {
    per_market: HashMap<String, Decimal>,
    total: Decimal,
}

impl CycleExposure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a filled stake against a market
    pub fn commit(&mut self, market_id: &str, stake: Decimal) {
        if stake <= Decimal::ZERO {
            return;
        }
        *self
            .per_market
            .entry(market_id.to_string())
            .or_insert(Decimal::ZERO) += stake;
        self.total += stake;
    }

    /// Number of markets with committed exposure
    pub fn len(&self) -> usize {
        self.per_market.len()
    }

    pub fn is_empty(&self) -> bool {
        self.per_market.is_empty()
    }
}

impl ExposureView for CycleExposure {
    fn market_exposure(&self, market_id: &str) -> Option<Decimal> {
        Some(
            self.per_market
                .get(market_id)
                .copied()
                .unwrap_or(Decimal::ZERO),
        )
    }

    fn portfolio_exposure(&self) -> Option<Decimal> {
        Some(self.total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_commit_accumulates() {
        let mut exposure = CycleExposure::new();
        exposure.commit("m1", dec!(40));
        exposure.commit("m1", dec!(10));
        exposure.commit("m2", dec!(25));
        assert_eq!(exposure.market_exposure("m1"), Some(dec!(50)));
        assert_eq!(exposure.market_exposure("m2"), Some(dec!(25)));
        assert_eq!(exposure.market_exposure("m3"), Some(dec!(0)));
        assert_eq!(exposure.portfolio_exposure(), Some(dec!(75)));
    }

    #[test]
    fn test_zero_stake_commit_is_ignored() {
        let mut exposure = CycleExposure::new();
        exposure.commit("m1", Decimal::ZERO);
        assert!(exposure.is_empty());
        assert_eq!(exposure.portfolio_exposure(), Some(Decimal::ZERO));
    }
}
