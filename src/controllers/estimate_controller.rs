use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::EstimationError;
use crate::models::estimate::{ErrorBody, EstimationReport, HealthStatus, PanelSpec, PowerEstimate};
use crate::shared_state::AppState;

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EstimateQuery {
    /// Free-text place name
    pub city: String,
    /// Nominal Operating Cell Temperature (°C)
    #[serde(default = "default_noct")]
    pub noct: f64,
    /// Panel area (m²)
    #[serde(default = "default_area")]
    pub area: f64,
    /// Rated efficiency at STC as a fraction; defaults per insolation source
    pub efficiency: Option<f64>,
}

fn default_noct() -> f64 { 45.0 }
fn default_area() -> f64 { 1.6 }

fn status_for(err: &EstimationError) -> StatusCode {
    match err {
        EstimationError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        EstimationError::LocationNotFound { .. } => StatusCode::NOT_FOUND,
        EstimationError::WeatherUnavailable(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(err: EstimationError) -> Response {
    let body = ErrorBody {
        error: err.kind().to_string(),
        message: err.to_string(),
    };
    (status_for(&err), Json(body)).into_response()
}

impl EstimateQuery {
    fn panel(&self, state: &AppState) -> PanelSpec {
        let efficiency = self
            .efficiency
            .unwrap_or_else(|| state.pipeline.default_stc_efficiency());
        PanelSpec::new(self.noct, self.area, efficiency)
    }
}

/// GET /api/estimate
/// Estimate current panel output for a location
///
/// Resolves the place, fetches live weather, estimates insolation with the
/// configured source and applies the temperature-derated power model.
/// `estimate.estimated` is true whenever any input was substituted.
#[utoipa::path(
    get,
    path = "/api/estimate",
    params(EstimateQuery),
    responses(
        (status = 200, description = "Power estimate with its inputs", body = EstimationReport),
        (status = 400, description = "Invalid panel parameters or city", body = ErrorBody),
        (status = 404, description = "Location could not be geocoded", body = ErrorBody),
        (status = 502, description = "Weather provider unavailable", body = ErrorBody)
    )
)]
pub async fn get_estimate(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
) -> impl IntoResponse {
    let panel = query.panel(&state);
    match state.pipeline.run(&query.city, panel).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/estimate/power
/// Power estimate only, without the inputs that produced it
#[utoipa::path(
    get,
    path = "/api/estimate/power",
    params(EstimateQuery),
    responses(
        (status = 200, description = "Cell temperature, efficiency and power", body = PowerEstimate),
        (status = 400, description = "Invalid panel parameters or city", body = ErrorBody),
        (status = 404, description = "Location could not be geocoded", body = ErrorBody),
        (status = 502, description = "Weather provider unavailable", body = ErrorBody)
    )
)]
pub async fn get_power(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
) -> impl IntoResponse {
    let panel = query.panel(&state);
    match state.pipeline.estimate(&query.city, panel).await {
        Ok(estimate) => (StatusCode::OK, Json(estimate)).into_response(),
        Err(err) => error_response(err),
    }
}

/// GET /api/health
/// Service liveness and the configured insolation source
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is up", body = HealthStatus)
    )
)]
pub async fn get_health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        insolation_source: state.pipeline.source_kind(),
    })
}
