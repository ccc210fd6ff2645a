use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, USER_AGENT};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::error::{Degradation, EstimationError, ProviderError, ProviderResult, Stage};
use crate::models::estimate::{Coordinates, Region, UNKNOWN_DISTRICT, UNKNOWN_STATE};
use crate::models::providers::{GeocodeHit, ReverseResponse};
use crate::services::{decode_json, ensure_success};

const STATE_KEYS: &[&str] = &["state", "region"];
const DISTRICT_KEYS: &[&str] = &["county", "district", "city_district", "town", "village", "city"];

/// One forward-geocoding strategy in the fallback chain.
#[async_trait]
pub trait GeocodingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// First matching coordinates for a place name.
    async fn locate(&self, city: &str) -> ProviderResult<Coordinates>;
}

fn first_hit(hits: Vec<GeocodeHit>) -> ProviderResult<Coordinates> {
    hits.into_iter()
        .next()
        .map(|h| Coordinates { latitude: h.lat, longitude: h.lon })
        .ok_or(ProviderError::Empty)
}

/// OpenWeather direct geocoding.
#[derive(Debug, Clone)]
pub struct OpenWeatherGeocoder {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl OpenWeatherGeocoder {
    pub fn new(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            base_url: config.openweather_url.trim_end_matches('/').to_string(),
            api_key: config.openweather_api_key.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

#[async_trait]
impl GeocodingProvider for OpenWeatherGeocoder {
    fn name(&self) -> &str {
        "openweather"
    }

    async fn locate(&self, city: &str) -> ProviderResult<Coordinates> {
        let url = format!("{}/geo/1.0/direct", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("limit", "1"), ("appid", self.api_key.as_str())])
            .timeout(self.timeout)
            .send()
            .await?;
        let hits: Vec<GeocodeHit> = decode_json(ensure_success(response).await?).await?;
        first_hit(hits)
    }
}

/// Minimum interval between calls to one host, shared by every client of it.
///
/// Callers queue on the lock, so concurrent requests go out one interval apart.
#[derive(Debug, Clone)]
pub struct RequestSpacing {
    interval: Duration,
    last_call: Arc<Mutex<Option<Instant>>>,
}

impl RequestSpacing {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Arc::new(Mutex::new(None)),
        }
    }

    /// Wait out whatever is left of the interval, then claim the slot.
    pub async fn wait_turn(&self) {
        let mut last_call = self.last_call.lock().await;
        if let Some(last) = *last_call {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

/// Nominatim search, spaced out to respect the public usage policy.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
    timeout: Duration,
    spacing: RequestSpacing,
}

impl NominatimGeocoder {
    pub fn new(client: Client, config: &ProviderConfig, spacing: RequestSpacing) -> Self {
        Self {
            client,
            base_url: config.nominatim_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            spacing,
        }
    }
}

#[async_trait]
impl GeocodingProvider for NominatimGeocoder {
    fn name(&self) -> &str {
        "nominatim"
    }

    async fn locate(&self, city: &str) -> ProviderResult<Coordinates> {
        self.spacing.wait_turn().await;
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", city), ("format", "json"), ("limit", "1")])
            .header(USER_AGENT, &self.user_agent)
            .header(ACCEPT, "application/json")
            .timeout(self.timeout)
            .send()
            .await?;
        let hits: Vec<GeocodeHit> = decode_json(ensure_success(response).await?).await?;
        first_hit(hits)
    }
}

/// Nominatim reverse geocoding to state/district. Shares the search spacing.
#[derive(Debug, Clone)]
pub struct ReverseGeocoder {
    client: Client,
    base_url: String,
    user_agent: String,
    timeout: Duration,
    spacing: RequestSpacing,
}

impl ReverseGeocoder {
    pub fn new(client: Client, config: &ProviderConfig, spacing: RequestSpacing) -> Self {
        Self {
            client,
            base_url: config.nominatim_url.trim_end_matches('/').to_string(),
            user_agent: config.user_agent.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
            spacing,
        }
    }

    async fn fetch(&self, coords: Coordinates) -> ProviderResult<ReverseResponse> {
        self.spacing.wait_turn().await;
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", coords.latitude.to_string()),
                ("lon", coords.longitude.to_string()),
                ("format", "json".to_string()),
                ("zoom", "10".to_string()),
                ("addressdetails", "1".to_string()),
            ])
            .header(USER_AGENT, &self.user_agent)
            .timeout(self.timeout)
            .send()
            .await?;
        let body: ReverseResponse = decode_json(ensure_success(response).await?).await?;
        if let Some(err) = &body.error {
            let message = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(ProviderError::Api { code: "error".to_string(), message });
        }
        Ok(body)
    }
}

/// Title-case a string: upper-case every letter that follows a non-letter,
/// lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }
    out
}

/// Resolves place names to coordinates and coordinates to regions.
pub struct LocationResolver {
    providers: Vec<Box<dyn GeocodingProvider>>,
    reverse: ReverseGeocoder,
}

impl LocationResolver {
    /// Providers are tried in the given order.
    pub fn new(providers: Vec<Box<dyn GeocodingProvider>>, reverse: ReverseGeocoder) -> Self {
        Self { providers, reverse }
    }

    /// OpenWeather first, Nominatim second.
    pub fn from_config(client: Client, config: &ProviderConfig) -> Self {
        let nominatim_spacing = RequestSpacing::new(Duration::from_millis(config.nominatim_spacing_ms));
        Self::new(
            vec![
                Box::new(OpenWeatherGeocoder::new(client.clone(), config)),
                Box::new(NominatimGeocoder::new(client.clone(), config, nominatim_spacing.clone())),
            ],
            ReverseGeocoder::new(client, config, nominatim_spacing),
        )
    }

    pub async fn resolve_coordinates(&self, city: &str) -> Result<Coordinates, EstimationError> {
        let mut attempts = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match provider.locate(city).await {
                Ok(coords) => {
                    info!(
                        "[GEOCODE] '{}' -> ({:.4}, {:.4}) via {}",
                        city, coords.latitude, coords.longitude, provider.name()
                    );
                    return Ok(coords);
                }
                Err(e) => {
                    warn!("[GEOCODE] {} failed for '{}': {}", provider.name(), city, e);
                    attempts.push(format!("{}: {}", provider.name(), e));
                }
            }
        }
        Err(EstimationError::LocationNotFound {
            query: city.to_string(),
            attempts,
        })
    }

    /// Best-effort: any failure degrades to the sentinel region.
    pub async fn resolve_region(&self, coords: Coordinates) -> Stage<Region> {
        let body = match self.reverse.fetch(coords).await {
            Ok(body) => body,
            Err(e) => return Stage::Degraded(Region::unknown(), Degradation::RegionUnresolved(e.to_string())),
        };

        let state = body.first_of(STATE_KEYS).map(title_case);
        let district = body.first_of(DISTRICT_KEYS).map(title_case);
        debug!("[GEOCODE] Reverse ({:.4}, {:.4}): state={:?} district={:?}", coords.latitude, coords.longitude, state, district);

        match (state, district) {
            (Some(state), Some(district)) => Stage::Ok(Region { state, district }),
            (state, district) => {
                let missing: Vec<&str> = [
                    state.is_none().then_some("state"),
                    district.is_none().then_some("district"),
                ]
                .into_iter()
                .flatten()
                .collect();
                let region = Region {
                    state: state.unwrap_or_else(|| UNKNOWN_STATE.to_string()),
                    district: district.unwrap_or_else(|| UNKNOWN_DISTRICT.to_string()),
                };
                Stage::Degraded(
                    region,
                    Degradation::RegionUnresolved(format!("no usable {} in address", missing.join("/"))),
                )
            }
        }
    }
}
