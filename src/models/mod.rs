//! Fair-value estimation models
//!
//! Each model is a capability: it recognizes a category of market question
//! and, for recognized markets, returns a probability estimate for the YES
//! outcome. The [`router`] tries registered models in priority order and uses
//! the first that recognizes the market: a strategy table, not a hierarchy.

pub mod btc_interval;
pub mod btc_threshold;
pub mod router;
pub mod weather;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::common::errors::Result;
use crate::common::types::{FairValueEstimate, Market};

pub use btc_interval::{BtcDirectionModel, BtcIntervalModel};
pub use btc_threshold::BtcThresholdModel;
pub use router::FairValueRouter;
pub use weather::WeatherModel;

/// A fair-value estimator for one category of market
#[async_trait]
pub trait FairValueModel: Send + Sync {
    /// Unique identifier, forwarded into rationales and logs
    fn name(&self) -> &'static str;

    /// Whether this model understands the market's question
    fn recognizes(&self, market: &Market) -> bool;

    /// Estimate P(YES) for a recognized market.
    ///
    /// Degraded inputs (missing signals, unresolved locations) should return
    /// a low-confidence 0.5 with a rationale rather than an error; errors are
    /// for failed fetches the caller may want to retry.
    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate>;
}

/// Boxed model for the router's strategy table
pub type BoxedFairValueModel = Box<dyn FairValueModel>;

/// Baseline: 0.5 with low confidence, recognizes everything
#[derive(Debug, Clone, Copy, Default)]
pub struct BaselineModel;

#[async_trait]
impl FairValueModel for BaselineModel {
    fn name(&self) -> &'static str {
        "baseline"
    }

    fn recognizes(&self, _market: &Market) -> bool {
        true
    }

    async fn estimate(&self, _market: &Market) -> Result<FairValueEstimate> {
        Ok(FairValueEstimate::new(dec!(0.5))
            .with_confidence(dec!(0.2))
            .with_rationale("baseline"))
    }
}

/// Convert a model-space probability to the Decimal the engine works in
pub(crate) fn probability_from_f64(p: f64) -> Decimal {
    Decimal::from_f64(p.clamp(0.0, 1.0)).unwrap_or(dec!(0.5))
}

/// Standard normal CDF
pub(crate) fn normal_cdf(z: f64) -> f64 {
    Normal::new(0.0, 1.0).map(|n| n.cdf(z)).unwrap_or(0.5)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_baseline_recognizes_everything() {
        let market = Market::new("m1", "anything at all");
        let model = BaselineModel;
        assert!(model.recognizes(&market));
        let fv = model.estimate(&market).await.unwrap();
        assert_eq!(fv.probability, dec!(0.5));
        assert_eq!(fv.confidence, Some(dec!(0.2)));
    }

    #[test]
    fn test_probability_from_f64_clamps() {
        assert_eq!(probability_from_f64(1.7), Decimal::ONE);
        assert_eq!(probability_from_f64(-0.2), Decimal::ZERO);
    }

    #[test]
    fn test_normal_cdf_symmetry() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.0) + normal_cdf(-1.0) - 1.0).abs() < 1e-9);
    }
}
