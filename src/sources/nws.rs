//! National Weather Service client and weather-question parsing

use chrono::{DateTime, Duration, TimeZone, Utc};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration as StdDuration;
use tracing::instrument;

use crate::common::errors::{EngineError, Result};

const NWS_API: &str = "https://api.weather.gov";

/// A lat/lon the NWS grid API can be queried for
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NwsPoint {
    pub lat: f64,
    pub lon: f64,
}

/// Probability-of-precipitation signal over a time window, p_rain in [0,1]
#[derive(Debug, Clone, PartialEq)]
pub struct PopSignal {
    pub p_rain: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Number of forecast points the maximum was taken over
    pub points: usize,
}

/// Parsed weather question from market text
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherQuestion {
    pub location: Option<String>,
    pub target_date: Option<DateTime<Utc>>,
}

fn rain_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\brain\b|\bprecip(itation)?\b|\bshower(s)?\b").unwrap())
}

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\bin\s+([A-Za-z0-9 .,'\-]{3,64})\??$").unwrap())
}

fn date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bon\s+(\d{4})-(\d{2})-(\d{2})\b").unwrap())
}

/// Recognize "Will it rain ..." style questions.
///
/// Location extraction is a rough trailing "in <place>" match; the date is an
/// optional "on YYYY-MM-DD".
pub fn parse_weather_question(text: &str) -> Option<WeatherQuestion> {
    if !rain_re().is_match(text) {
        return None;
    }

    let location = location_re()
        .captures(text.trim())
        .map(|c| c[1].trim().to_string());

    let target_date = date_re().captures(text).and_then(|c| {
        let year: i32 = c[1].parse().ok()?;
        let month: u32 = c[2].parse().ok()?;
        let day: u32 = c[3].parse().ok()?;
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).single()
    });

    Some(WeatherQuestion {
        location,
        target_date,
    })
}

/// Resolves a location string to a lat/lon from a user-provided mapping.
///
/// No built-in geocoding; the mapping comes from the configured locations
/// file (JSON object of name -> {lat, lon}).
#[derive(Debug, Clone, Default)]
pub struct LocationResolver {
    mapping: HashMap<String, NwsPoint>,
}

impl LocationResolver {
    pub fn new(mapping: HashMap<String, NwsPoint>) -> Self {
        let mapping = mapping
            .into_iter()
            .map(|(k, v)| (k.trim().to_lowercase(), v))
            .collect();
        Self { mapping }
    }

    /// Load the mapping from a JSON file; a missing path yields an empty
    /// resolver so weather markets degrade instead of failing the startup.
    pub fn from_file(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        if !Path::new(path).exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("locations file {}: {}", path, e)))?;
        let mapping: HashMap<String, NwsPoint> = serde_json::from_str(&raw)?;
        Ok(Self::new(mapping))
    }

    pub fn resolve(&self, location: Option<&str>) -> Option<NwsPoint> {
        let key = location?.trim().to_lowercase();
        self.mapping.get(&key).copied()
    }
}

#[derive(Debug, Deserialize)]
struct PointsResponse {
    properties: PointsProperties,
}

#[derive(Debug, Deserialize)]
struct PointsProperties {
    #[serde(rename = "forecastGridData")]
    forecast_grid_data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GridResponse {
    properties: GridProperties,
}

#[derive(Debug, Deserialize, Default)]
struct GridProperties {
    #[serde(rename = "probabilityOfPrecipitation", default)]
    probability_of_precipitation: Option<GridLayer>,
}

#[derive(Debug, Deserialize)]
struct GridLayer {
    #[serde(default)]
    values: Vec<GridValue>,
}

#[derive(Debug, Deserialize)]
struct GridValue {
    #[serde(rename = "validTime")]
    valid_time: String,
    value: Option<f64>,
}

/// Minimal NWS API client.
///
/// NWS requires a descriptive User-Agent header.
/// See: https://www.weather.gov/documentation/services-web-api
#[derive(Debug, Clone)]
pub struct NwsClient {
    client: Client,
    base_url: String,
}

impl NwsClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_base_url(user_agent, NWS_API)
    }

    pub fn with_base_url(user_agent: &str, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(StdDuration::from_secs(20))
            .user_agent(user_agent)
            .build()
            .map_err(|e| EngineError::Internal(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn points(&self, point: NwsPoint) -> Result<PointsResponse> {
        let url = format!("{}/points/{:.4},{:.4}", self.base_url, point.lat, point.lon);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "NWS points returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    #[instrument(skip(self))]
    async fn forecast_grid(&self, grid_url: &str) -> Result<GridResponse> {
        let response = self.client.get(grid_url).send().await?;
        if !response.status().is_success() {
            return Err(EngineError::SourceUnavailable(format!(
                "NWS grid returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Max PoP over the window as a conservative "will it rain" proxy
    pub async fn pop_signal(
        &self,
        point: NwsPoint,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Option<PopSignal>> {
        let meta = self.points(point).await?;
        let Some(grid_url) = meta.properties.forecast_grid_data else {
            return Ok(None);
        };

        let grid = self.forecast_grid(&grid_url).await?;
        let values = grid
            .properties
            .probability_of_precipitation
            .map(|layer| layer.values)
            .unwrap_or_default();

        let pops: Vec<f64> = values
            .iter()
            .filter(|v| overlaps_window(&v.valid_time, window_start, window_end))
            .filter_map(|v| v.value)
            .collect();

        if pops.is_empty() {
            return Ok(None);
        }

        let p_rain = (pops.iter().cloned().fold(f64::MIN, f64::max) / 100.0).clamp(0.0, 1.0);
        Ok(Some(PopSignal {
            p_rain,
            window_start,
            window_end,
            points: pops.len(),
        }))
    }
}

/// validTime comes as "2026-08-06T12:00:00+00:00/PT1H"; we approximate each
/// value's span as one hour from its start.
fn overlaps_window(valid_time: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let Some(ts) = valid_time.split('/').next() else {
        return false;
    };
    let Ok(value_start) = DateTime::parse_from_rfc3339(ts) else {
        return false;
    };
    let value_start = value_start.with_timezone(&Utc);
    let value_end = value_start + Duration::hours(1);
    value_end > start && value_start < end
}
