//! Error taxonomy for the estimation pipeline.
//!
//! Fatal conditions abort a run and surface as [`EstimationError`].
//! Recoverable conditions are [`Degradation`]s: the stage substitutes a
//! value and the run continues with `estimated = true`.

use thiserror::Error;

/// Fatal failures. A run that hits one of these produces no partial result.
#[derive(Debug, Error)]
pub enum EstimationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("location '{query}' not found ({})", .attempts.join("; "))]
    LocationNotFound { query: String, attempts: Vec<String> },

    #[error("weather unavailable: {0}")]
    WeatherUnavailable(String),
}

impl EstimationError {
    /// Stable machine-readable kind, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EstimationError::InvalidInput(_) => "INVALID_INPUT",
            EstimationError::LocationNotFound { .. } => "LOCATION_NOT_FOUND",
            EstimationError::WeatherUnavailable(_) => "WEATHER_UNAVAILABLE",
        }
    }
}

/// Recoverable failures. Each one means a value was substituted.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Degradation {
    #[error("region unresolved, using sentinel region: {0}")]
    RegionUnresolved(String),

    #[error("insolation estimation failed, using {fallback} kWh/m²/day: {reason}")]
    InsolationEstimationFailed { fallback: f64, reason: String },

    #[error("no irradiance sample for {hour_key}, substituted {substitute} W/m²: {reason}")]
    MissingIrradianceSample {
        hour_key: String,
        substitute: f64,
        reason: String,
    },

    #[error("sunrise/sunset unavailable, assuming {assumed_hours} h of daylight")]
    MissingDaylightWindow { assumed_hours: f64 },
}

/// Failures talking to an outbound data provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider error {code}: {message}")]
    Api { code: String, message: String },

    #[error("empty result")]
    Empty,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failures loading or evaluating the trained insolation model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("cannot read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse model artifact: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid model artifact: {0}")]
    Invalid(String),

    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Failures wiring the service together at startup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("insolation source 'model' selected but no model loaded")]
    MissingModel,
}

/// Outcome of one pipeline stage.
#[derive(Debug)]
pub enum Stage<T> {
    Ok(T),
    Degraded(T, Degradation),
    Fatal(EstimationError),
}

impl<T> Stage<T> {
    /// Fold the stage into a `Result`, recording any degradation.
    ///
    /// This is the single place where the continue/abort decision is made.
    pub fn settle(self, degradations: &mut Vec<Degradation>) -> Result<T, EstimationError> {
        match self {
            Stage::Ok(value) => Ok(value),
            Stage::Degraded(value, reason) => {
                tracing::warn!("[PIPELINE] Degraded: {}", reason);
                degradations.push(reason);
                Ok(value)
            }
            Stage::Fatal(err) => Err(err),
        }
    }

    #[cfg(test)]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Stage::Degraded(..))
    }
}
