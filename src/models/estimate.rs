use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::InsolationSourceKind;
use crate::error::EstimationError;

pub const UNKNOWN_STATE: &str = "Unknown State";
pub const UNKNOWN_DISTRICT: &str = "Unknown District";

// ─── Location ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// Administrative region used as model features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Region {
    pub state: String,
    pub district: String,
}

impl Region {
    /// Sentinel region used when reverse geocoding yields nothing usable.
    pub fn unknown() -> Self {
        Self {
            state: UNKNOWN_STATE.to_string(),
            district: UNKNOWN_DISTRICT.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResolvedLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub state: String,
    pub district: String,
}

impl ResolvedLocation {
    pub fn new(coords: Coordinates, region: Region) -> Self {
        Self {
            latitude: coords.latitude,
            longitude: coords.longitude,
            state: region.state,
            district: region.district,
        }
    }
}

// ─── Weather ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeatherSample {
    pub ambient_temp_c: f64,
    pub wind_speed_ms: f64,
    /// Sunrise, UTC epoch seconds
    pub sunrise_unix: Option<i64>,
    /// Sunset, UTC epoch seconds
    pub sunset_unix: Option<i64>,
    /// Station coordinates reported by the weather provider, if any.
    pub coordinates: Option<Coordinates>,
}

// ─── Insolation ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum InsolationUnit {
    #[serde(rename = "kWh/m2/day")]
    KwhPerM2PerDay,
    #[serde(rename = "W/m2")]
    WattsPerM2,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct InsolationEstimate {
    pub value: f64,
    pub unit: InsolationUnit,
    /// True when the value came from a fallback heuristic, not a measurement or prediction.
    pub estimated: bool,
    pub diagnostics: BTreeMap<String, f64>,
}

impl InsolationEstimate {
    pub fn daily(value: f64, estimated: bool) -> Self {
        Self {
            value,
            unit: InsolationUnit::KwhPerM2PerDay,
            estimated,
            diagnostics: BTreeMap::new(),
        }
    }

    pub fn hourly(value: f64, estimated: bool) -> Self {
        Self {
            value,
            unit: InsolationUnit::WattsPerM2,
            estimated,
            diagnostics: BTreeMap::new(),
        }
    }

    pub fn with_diagnostic(mut self, key: &str, value: f64) -> Self {
        self.diagnostics.insert(key.to_string(), value);
        self
    }
}

// ─── Panel ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PanelSpec {
    /// Nominal Operating Cell Temperature (°C)
    pub noct_c: f64,
    pub area_m2: f64,
    /// Rated efficiency at STC, as a fraction in (0, 1]
    pub stc_efficiency_fraction: f64,
}

impl PanelSpec {
    pub fn new(noct_c: f64, area_m2: f64, stc_efficiency_fraction: f64) -> Self {
        Self { noct_c, area_m2, stc_efficiency_fraction }
    }

    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.noct_c.is_finite() && self.noct_c > 0.0) {
            return Err(EstimationError::InvalidInput(format!(
                "NOCT must be positive, got {}",
                self.noct_c
            )));
        }
        if !(self.area_m2.is_finite() && self.area_m2 > 0.0) {
            return Err(EstimationError::InvalidInput(format!(
                "panel area must be positive, got {}",
                self.area_m2
            )));
        }
        let eff = self.stc_efficiency_fraction;
        if !(eff.is_finite() && eff > 0.0 && eff <= 1.0) {
            return Err(EstimationError::InvalidInput(format!(
                "STC efficiency must be a fraction in (0, 1], got {}",
                eff
            )));
        }
        Ok(())
    }
}

// ─── Output ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PowerEstimate {
    pub cell_temp_c: f64,
    pub efficiency_fraction: f64,
    pub power_watts: f64,
    /// True when any input was substituted by a fallback.
    pub estimated: bool,
    pub diagnostics: BTreeMap<String, f64>,
}

/// Everything the caller needs to display and label one estimate.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct EstimationReport {
    pub timestamp: DateTime<Utc>,
    pub city: String,
    pub source: InsolationSourceKind,
    pub location: ResolvedLocation,
    pub weather: WeatherSample,
    pub insolation: InsolationEstimate,
    pub irradiance_w_m2: f64,
    pub panel: PanelSpec,
    pub estimate: PowerEstimate,
    /// Human-readable reason for every substituted value.
    pub degradations: Vec<String>,
}

// ─── REST API types ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub insolation_source: InsolationSourceKind,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
