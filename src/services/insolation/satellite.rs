use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::{ProviderConfig, SatelliteConfig};
use crate::error::{Degradation, ProviderResult, Stage};
use crate::models::estimate::InsolationEstimate;
use crate::models::providers::{ALLSKY_PARAMETER, PowerHourlyResponse};
use crate::services::{decode_json, ensure_success};

/// NASA POWER marks missing samples with this value.
pub const MISSING_SENTINEL: f64 = -999.0;

/// Local hour encoded in the last two digits of a `YYYYMMDDHH` key.
fn hour_of_key(hour_key: &str) -> Option<u32> {
    hour_key.get(8..10).and_then(|h| h.parse().ok())
}

/// Hourly irradiance from the NASA POWER all-sky surface shortwave feed.
#[derive(Debug, Clone)]
pub struct SatelliteHourlyEstimator {
    client: Client,
    base_url: String,
    timeout: Duration,
    config: SatelliteConfig,
}

impl SatelliteHourlyEstimator {
    pub fn new(client: Client, providers: &ProviderConfig, config: SatelliteConfig) -> Self {
        Self {
            client,
            base_url: providers.nasa_power_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(providers.feed_timeout_secs),
            config,
        }
    }

    pub fn config(&self) -> &SatelliteConfig {
        &self.config
    }

    /// Full-day hourly series for one point, keyed by `YYYYMMDDHH` (local solar time).
    pub async fn fetch_series(&self, lat: f64, lon: f64, date: &str) -> ProviderResult<HashMap<String, f64>> {
        let url = format!("{}/api/temporal/hourly/point", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("parameters", ALLSKY_PARAMETER.to_string()),
                ("community", "RE".to_string()),
                ("longitude", lon.to_string()),
                ("latitude", lat.to_string()),
                ("start", date.to_string()),
                ("end", date.to_string()),
                ("format", "JSON".to_string()),
                ("time-standard", "LST".to_string()),
            ])
            .timeout(self.timeout)
            .send()
            .await?;
        let body: PowerHourlyResponse = decode_json(ensure_success(response).await?).await?;
        let series = body.into_series();
        debug!("[SATELLITE] {} hourly samples for {} at ({:.3}, {:.3})", series.len(), date, lat, lon);
        Ok(series)
    }

    /// W/m² for one hour. A missing feed, missing key or sentinel value is
    /// "no data": daytime hours get the configured substitute and are marked
    /// estimated, night hours get 0.
    pub async fn estimate_hourly(&self, lat: f64, lon: f64, date: &str, hour_key: &str) -> Stage<InsolationEstimate> {
        match self.fetch_series(lat, lon, date).await {
            Ok(series) => self.pick_sample(&series, hour_key),
            Err(e) => self.substitute(hour_key, format!("irradiance feed unavailable: {}", e)),
        }
    }

    pub fn pick_sample(&self, series: &HashMap<String, f64>, hour_key: &str) -> Stage<InsolationEstimate> {
        match series.get(hour_key).copied() {
            Some(v) if v != MISSING_SENTINEL => {
                info!("[SATELLITE] Irradiance at {}: {:.2} W/m²", hour_key, v);
                Stage::Ok(InsolationEstimate::hourly(v, false))
            }
            Some(_) => self.substitute(hour_key, "sentinel -999 in feed".to_string()),
            None => self.substitute(hour_key, "hour missing from feed".to_string()),
        }
    }

    fn substitute(&self, hour_key: &str, reason: String) -> Stage<InsolationEstimate> {
        let hour = hour_of_key(hour_key);
        let daytime = hour.is_some_and(|h| (self.config.daytime_start_hour..=self.config.daytime_end_hour).contains(&h));

        if daytime {
            let substitute = self.config.daytime_substitute;
            Stage::Degraded(
                InsolationEstimate::hourly(substitute, true).with_diagnostic("irradiance_substituted", 1.0),
                Degradation::MissingIrradianceSample {
                    hour_key: hour_key.to_string(),
                    substitute,
                    reason,
                },
            )
        } else {
            info!("[SATELLITE] No sample for {} ({}), night hour: 0 W/m²", hour_key, reason);
            Stage::Ok(InsolationEstimate::hourly(0.0, false).with_diagnostic("night_no_data", 1.0))
        }
    }
}
