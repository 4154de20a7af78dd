//! NWS probability-of-precipitation fair value for rain markets

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;

use super::{probability_from_f64, FairValueModel};
use crate::common::errors::Result;
use crate::common::types::{FairValueEstimate, Market};
use crate::sources::nws::{parse_weather_question, LocationResolver, NwsClient};

/// Fair value estimator for simple "Will it rain ..." markets.
///
/// Parses the question for rain keywords, resolves the location string via
/// the configured mapping and converts the NWS grid forecast PoP into a
/// probability. The max PoP over the window is a conservative proxy; many
/// markets have more specific definitions than "PoP > 0".
pub struct WeatherModel {
    nws: NwsClient,
    resolver: LocationResolver,
    default_window_hours: i64,
}

impl WeatherModel {
    pub fn new(nws: NwsClient, resolver: LocationResolver) -> Self {
        Self {
            nws,
            resolver,
            default_window_hours: 24,
        }
    }
}

#[async_trait]
impl FairValueModel for WeatherModel {
    fn name(&self) -> &'static str {
        "nws-rain"
    }

    fn recognizes(&self, market: &Market) -> bool {
        parse_weather_question(&market.question).is_some()
    }

    async fn estimate(&self, market: &Market) -> Result<FairValueEstimate> {
        let Some(q) = parse_weather_question(&market.question) else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0))
                .with_rationale("not a weather question"));
        };

        let Some(point) = self.resolver.resolve(q.location.as_deref()) else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0.05))
                .with_rationale(format!(
                    "weather market but location unresolved: {:?}",
                    q.location
                )));
        };

        let (window_start, window_end) = match q.target_date {
            // The target date as a day window in UTC
            Some(date) => (date, date + Duration::days(1)),
            None => {
                let now = Utc::now();
                (now, now + Duration::hours(self.default_window_hours))
            }
        };

        let Some(signal) = self.nws.pop_signal(point, window_start, window_end).await? else {
            return Ok(FairValueEstimate::new(dec!(0.5))
                .with_confidence(dec!(0.05))
                .with_rationale("NWS signal unavailable"));
        };

        Ok(FairValueEstimate::new(probability_from_f64(signal.p_rain))
            .with_confidence(dec!(0.55))
            .with_rationale(format!(
                "NWS PoP proxy (max over {} points)",
                signal.points
            )))
    }
}
