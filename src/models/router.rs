//! First-match routing across registered fair-value models

use async_trait::async_trait;
use tracing::debug;

use super::{
    BaselineModel, BoxedFairValueModel, BtcDirectionModel, BtcIntervalModel, BtcThresholdModel,
    FairValueModel, WeatherModel,
};
use crate::common::errors::Result;
use crate::common::types::{FairValueEstimate, Market};
use crate::config::AppConfig;
use crate::sources::binance::BinanceClient;
use crate::sources::coingecko::CoinGeckoClient;
use crate::sources::nws::{LocationResolver, NwsClient};

/// Routes each market to the first registered model that recognizes it.
///
/// Priority order is the registration order; the baseline sits last and
/// recognizes everything, so routing always produces an estimate.
pub struct FairValueRouter {
    models: Vec<BoxedFairValueModel>,
}

impl FairValueRouter {
    /// Router with an explicit model list, highest priority first
    pub fn new(models: Vec<BoxedFairValueModel>) -> Self {
        Self { models }
    }

    /// The default category models wired from configuration:
    /// BTC interval -> BTC 15m direction -> BTC threshold -> weather ->
    /// baseline.
    pub fn with_default_models(config: &AppConfig) -> Result<Self> {
        let resolver = LocationResolver::from_file(config.locations_file.as_deref())?;
        let models: Vec<BoxedFairValueModel> = vec![
            Box::new(BtcIntervalModel::new(
                BinanceClient::new()?,
                config.btc_lookback_minutes,
            )),
            Box::new(BtcDirectionModel::new(
                BinanceClient::new()?,
                config.btc_lookback_minutes,
            )),
            Box::new(BtcThresholdModel::new(
                CoinGeckoClient::new()?,
                config.btc_vol_lookback_days,
                config.btc_drift_mu,
            )),
            Box::new(WeatherModel::new(
                NwsClient::new(&config.nws_user_agent)?,
                resolver,
            )),
            Box::new(BaselineModel),
        ];
        Ok(Self::new(models))
    }
}

#[async_trait]
impl FairValueModel for FairValueRouter {
    fn name(&self) -> &'static str {
        "router"
    }

    fn recognizes(&self, market: &Market) -> bool {
        self.models.iter().any(|m| m.recognizes(market))
    }

    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate> {
        for model in &self.models {
            if model.recognizes(market) {
                debug!(market_id = %market.id, model = model.name(), "routed fair value");
                return model.estimate(market).await;
            }
        }
        // Unreachable with the baseline registered; kept for explicit routers.
        BaselineModel.estimate(market).await
    }
}
