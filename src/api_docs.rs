use utoipa::OpenApi;

use crate::config;
use crate::controllers::estimate_controller;
use crate::models::estimate;

#[derive(OpenApi)]
#[openapi(
    paths(
        estimate_controller::get_estimate,
        estimate_controller::get_power,
        estimate_controller::get_health
    ),
    components(
        schemas(
            estimate::EstimationReport,
            estimate::PowerEstimate,
            estimate::ResolvedLocation,
            estimate::WeatherSample,
            estimate::InsolationEstimate,
            estimate::InsolationUnit,
            estimate::PanelSpec,
            estimate::HealthStatus,
            estimate::ErrorBody,
            config::InsolationSourceKind
        )
    ),
    tags(
        (name = "solar-power-estimator", description = "Real-time PV power estimation API")
    )
)]
pub struct ApiDoc;
