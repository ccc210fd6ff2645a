use axum::{routing::get, Router};

use crate::controllers::estimate_controller::{get_estimate, get_health, get_power};
use crate::shared_state::AppState;

/// Build the `/api/*` sub-router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/estimate",       get(get_estimate))
        .route("/estimate/power", get(get_power))
        .route("/health",         get(get_health))
        .with_state(state)
}
