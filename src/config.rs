use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

fn default_port() -> u16 { 8080 }
fn default_openweather_url() -> String { "https://api.openweathermap.org".to_string() }
fn default_nominatim_url() -> String { "https://nominatim.openstreetmap.org".to_string() }
fn default_nasa_power_url() -> String { "https://power.larc.nasa.gov".to_string() }
fn default_user_agent() -> String { format!("solar-power-estimator/{}", env!("CARGO_PKG_VERSION")) }
fn default_request_timeout() -> u64 { 10 }
fn default_feed_timeout() -> u64 { 15 }
fn default_nominatim_spacing() -> u64 { 1000 }
fn default_model_path() -> String { "solar_irradiance_forest.json".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: ProviderConfig,
    #[serde(default)]
    pub insolation: InsolationConfig,
    #[serde(default)]
    pub model_backed: ModelBackedConfig,
    #[serde(default)]
    pub satellite: SatelliteConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

/// Endpoints and transport settings for the outbound data providers.
#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_openweather_url")]
    pub openweather_url: String,
    #[serde(default)]
    pub openweather_api_key: String,
    #[serde(default = "default_nominatim_url")]
    pub nominatim_url: String,
    #[serde(default = "default_nasa_power_url")]
    pub nasa_power_url: String,
    /// Descriptive client identifier; Nominatim rejects anonymous clients.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_feed_timeout")]
    pub feed_timeout_secs: u64,
    /// Minimum spacing between Nominatim search calls.
    #[serde(default = "default_nominatim_spacing")]
    pub nominatim_spacing_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            openweather_url: default_openweather_url(),
            openweather_api_key: String::new(),
            nominatim_url: default_nominatim_url(),
            nasa_power_url: default_nasa_power_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout(),
            feed_timeout_secs: default_feed_timeout(),
            nominatim_spacing_ms: default_nominatim_spacing(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum InsolationSourceKind {
    /// Trained categorical regression over {State, District, Month}.
    #[default]
    Model,
    /// NASA POWER hourly all-sky surface irradiance.
    Satellite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct InsolationConfig {
    #[serde(default)]
    pub source: InsolationSourceKind,
    #[serde(default = "default_model_path")]
    pub model_path: String,
}

impl Default for InsolationConfig {
    fn default() -> Self {
        Self {
            source: InsolationSourceKind::default(),
            model_path: default_model_path(),
        }
    }
}

/// Constants for the daily, model-backed path.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelBackedConfig {
    pub reference_efficiency: f64,
    /// Magnitude of the temperature coefficient (per °C).
    pub temperature_coefficient: f64,
    pub reference_temp_c: f64,
    pub min_efficiency: f64,
    pub max_efficiency: f64,
    /// kWh/m²/day substituted when the model cannot predict.
    pub fallback_insolation: f64,
    pub clamp_min: f64,
    pub clamp_max: f64,
    /// Raw predictions inside (0, plausible_max] are used unclamped.
    pub plausible_max: f64,
}

impl Default for ModelBackedConfig {
    fn default() -> Self {
        Self {
            reference_efficiency: 0.15,
            temperature_coefficient: 0.0045,
            reference_temp_c: 25.0,
            min_efficiency: 0.05,
            max_efficiency: 0.25,
            fallback_insolation: 4.5,
            clamp_min: 3.0,
            clamp_max: 7.0,
            plausible_max: 10.0,
        }
    }
}

/// Constants for the hourly, satellite-backed path.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SatelliteConfig {
    pub default_stc_efficiency: f64,
    /// Signed temperature coefficient (per °C), negative for silicon.
    pub temperature_coefficient: f64,
    pub reference_temp_c: f64,
    pub daytime_start_hour: u32,
    pub daytime_end_hour: u32,
    /// W/m² substituted for a missing daytime sample.
    pub daytime_substitute: f64,
}

impl Default for SatelliteConfig {
    fn default() -> Self {
        Self {
            default_stc_efficiency: 0.20,
            temperature_coefficient: -0.004,
            reference_temp_c: 25.0,
            daytime_start_hour: 6,
            daytime_end_hour: 18,
            daytime_substitute: 300.0,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;
        if let Ok(key) = std::env::var("OPENWEATHER_API_KEY") {
            if !key.trim().is_empty() {
                config.providers.openweather_api_key = key;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.providers.openweather_api_key.trim().is_empty() {
            return Err("OpenWeather API key missing: set providers.openweather_api_key or OPENWEATHER_API_KEY".to_string());
        }
        let m = &self.model_backed;
        if !(m.min_efficiency <= m.max_efficiency) {
            return Err(format!("model_backed efficiency bounds inverted: [{}, {}]", m.min_efficiency, m.max_efficiency));
        }
        if !(m.clamp_min <= m.clamp_max) {
            return Err(format!("model_backed insolation clamp inverted: [{}, {}]", m.clamp_min, m.clamp_max));
        }
        let s = &self.satellite;
        if s.daytime_start_hour > s.daytime_end_hour || s.daytime_end_hour > 23 {
            return Err(format!("satellite daytime window invalid: {}..={}", s.daytime_start_hour, s.daytime_end_hour));
        }
        Ok(())
    }
}
