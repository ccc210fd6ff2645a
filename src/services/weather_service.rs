use std::time::Duration;

use reqwest::Client;
use tracing::{debug, error};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::models::estimate::{Coordinates, WeatherSample};
use crate::models::providers::OwmCurrentResponse;
use crate::services::{decode_json, ensure_success};

/// Current-weather client backed by OpenWeather.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl WeatherClient {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config.openweather_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    /// Current ambient conditions for a free-text place name.
    ///
    /// A non-2xx response and a non-200 `cod` inside a 2xx payload are both errors.
    pub async fn get_current_weather(&self, city: &str) -> ProviderResult<WeatherSample> {
        let url = format!("{}/data/2.5/weather", self.base_url);
        debug!("[WEATHER] Fetching current weather for '{}'", city);

        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")])
            .timeout(self.timeout)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: OwmCurrentResponse = decode_json(response).await?;

        match body.status_code().as_deref() {
            Some("200") => {}
            code => {
                let err = ProviderError::Api {
                    code: code.unwrap_or("missing").to_string(),
                    message: body.message_text(),
                };
                error!("[WEATHER] Provider rejected '{}': {}", city, err);
                return Err(err);
            }
        }

        let ambient_temp_c = body
            .main
            .as_ref()
            .and_then(|m| m.temp)
            .ok_or_else(|| ProviderError::Malformed("main.temp missing".to_string()))?;
        let wind_speed_ms = body.wind.as_ref().and_then(|w| w.speed).unwrap_or(0.0);
        let (sunrise_unix, sunset_unix) = body
            .sys
            .as_ref()
            .map(|s| (s.sunrise, s.sunset))
            .unwrap_or((None, None));
        let coordinates = body.coord.as_ref().map(|c| Coordinates {
            latitude: c.lat,
            longitude: c.lon,
        });

        debug!(
            "[WEATHER] '{}': {:.1}°C, wind {:.1} m/s, sunrise={:?} sunset={:?}",
            city, ambient_temp_c, wind_speed_ms, sunrise_unix, sunset_unix
        );

        Ok(WeatherSample {
            ambient_temp_c,
            wind_speed_ms,
            sunrise_unix,
            sunset_unix,
            coordinates,
        })
    }
}
