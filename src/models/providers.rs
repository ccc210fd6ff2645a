//! Wire types for the outbound data providers.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accept a float encoded either as a JSON number or a numeric string.
/// Nominatim quotes its coordinates, OpenWeather does not.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| serde::de::Error::custom("number out of range")),
        Value::String(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("expected number, got {other}"))),
    }
}

// ─── OpenWeather current weather ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OwmCurrentResponse {
    /// Embedded status; number on success, sometimes a string on error.
    pub cod: Option<Value>,
    pub message: Option<Value>,
    pub coord: Option<OwmCoord>,
    pub main: Option<OwmMain>,
    pub wind: Option<OwmWind>,
    pub sys: Option<OwmSys>,
}

impl OwmCurrentResponse {
    /// Embedded status code normalised to a string ("200", "404", ...).
    pub fn status_code(&self) -> Option<String> {
        match &self.cod {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) => Some(s.trim().to_string()),
            _ => None,
        }
    }

    pub fn message_text(&self) -> String {
        match &self.message {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "Unknown error".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct OwmCoord {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Deserialize)]
pub struct OwmMain {
    pub temp: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmWind {
    pub speed: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct OwmSys {
    pub sunrise: Option<i64>,
    pub sunset: Option<i64>,
}

// ─── Forward geocoding (OpenWeather direct, Nominatim search) ────────────────

#[derive(Debug, Deserialize)]
pub struct GeocodeHit {
    #[serde(deserialize_with = "lenient_f64")]
    pub lat: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub lon: f64,
}

// ─── Nominatim reverse geocoding ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ReverseResponse {
    pub error: Option<Value>,
    #[serde(default)]
    pub address: BTreeMap<String, Value>,
}

impl ReverseResponse {
    /// First non-empty string value among `keys`, in order.
    pub fn first_of(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.address.get(*k))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|s| !s.is_empty())
    }
}

// ─── NASA POWER hourly point ─────────────────────────────────────────────────

pub const ALLSKY_PARAMETER: &str = "ALLSKY_SFC_SW_DWN";

#[derive(Debug, Default, Deserialize)]
pub struct PowerHourlyResponse {
    #[serde(default)]
    pub properties: PowerProperties,
}

#[derive(Debug, Default, Deserialize)]
pub struct PowerProperties {
    #[serde(default)]
    pub parameter: HashMap<String, HashMap<String, f64>>,
}

impl PowerHourlyResponse {
    /// Hourly series keyed by `YYYYMMDDHH`; empty when the parameter is absent.
    pub fn into_series(mut self) -> HashMap<String, f64> {
        self.properties
            .parameter
            .remove(ALLSKY_PARAMETER)
            .unwrap_or_default()
    }
}
