use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::ModelBackedConfig;
use crate::error::{Degradation, Stage};
use crate::models::estimate::InsolationEstimate;
use crate::services::insolation::forest::{FeatureRow, InsolationModel};

/// Python-style capitalize: first character upper-case, the rest lower-case.
pub fn capitalize(s: &str) -> String {
    let s = s.trim();
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Realism clamp for daily insolation.
///
/// Values inside `(0, plausible_max]` pass through; anything else is pinned
/// into `[clamp_min, clamp_max]`. Returns the value and whether it was clamped.
pub fn clamp_insolation(raw: f64, config: &ModelBackedConfig) -> (f64, bool) {
    if raw > 0.0 && raw <= config.plausible_max {
        (raw, false)
    } else {
        (raw.min(config.clamp_max).max(config.clamp_min), true)
    }
}

/// Daily insolation from the trained {State, District, Month} regressor.
#[derive(Clone)]
pub struct ModelBackedDailyEstimator {
    model: Arc<dyn InsolationModel>,
    config: ModelBackedConfig,
}

impl ModelBackedDailyEstimator {
    pub fn new(model: Arc<dyn InsolationModel>, config: ModelBackedConfig) -> Self {
        Self { model, config }
    }

    pub fn config(&self) -> &ModelBackedConfig {
        &self.config
    }

    fn fallback(&self, reason: String) -> Stage<InsolationEstimate> {
        let fallback = self.config.fallback_insolation;
        Stage::Degraded(
            InsolationEstimate::daily(fallback, true),
            Degradation::InsolationEstimationFailed { fallback, reason },
        )
    }

    /// kWh/m²/day for one region and month. Never fails: model errors
    /// degrade to the configured fallback value.
    pub fn estimate_daily(&self, state: &str, district: &str, month_name: &str) -> Stage<InsolationEstimate> {
        let row = FeatureRow {
            state: state.to_string(),
            district: district.to_string(),
            month: capitalize(month_name),
        };
        debug!("[INSOLATION] Model input: {:?}", row);

        let raw = match self.model.predict(std::slice::from_ref(&row)) {
            Ok(preds) => match preds.first() {
                Some(v) if v.is_finite() => *v,
                Some(v) => return self.fallback(format!("model returned non-finite value {}", v)),
                None => return self.fallback("model returned no prediction".to_string()),
            },
            Err(e) => return self.fallback(e.to_string()),
        };
        info!("[INSOLATION] Model prediction: {:.3} kWh/m²/day", raw);

        let (value, clamped) = clamp_insolation(raw, &self.config);
        let mut estimate = InsolationEstimate::daily(value, false).with_diagnostic("insolation_raw_kwh_m2_day", raw);
        if clamped {
            warn!("[INSOLATION] Unrealistic prediction {:.2}, clamped to {:.2} kWh/m²/day", raw, value);
            estimate = estimate.with_diagnostic("insolation_clamped", 1.0);
        }
        Stage::Ok(estimate)
    }
}
