//! Insolation sources. Exactly one variant is configured per run; they are
//! never combined in one estimate.

pub mod forest;
pub mod model_backed;
pub mod satellite;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

use crate::config::InsolationSourceKind;
use crate::error::{Degradation, Stage};
use crate::models::estimate::{InsolationEstimate, ResolvedLocation};
use crate::services::power_model::DeratingLaw;

pub use model_backed::ModelBackedDailyEstimator;
pub use satellite::SatelliteHourlyEstimator;

/// Approximate local clock time from longitude (15° per hour).
pub fn local_solar_time(now: DateTime<Utc>, longitude: f64) -> NaiveDateTime {
    let offset_h = (longitude / 15.0).round() as i64;
    (now + Duration::hours(offset_h)).naive_utc()
}

/// Inputs every source can draw from.
#[derive(Debug, Clone)]
pub struct InsolationContext<'a> {
    pub location: &'a ResolvedLocation,
    pub now: DateTime<Utc>,
}

pub enum InsolationSource {
    ModelBacked(ModelBackedDailyEstimator),
    SatelliteHourly(SatelliteHourlyEstimator),
}

impl InsolationSource {
    pub fn kind(&self) -> InsolationSourceKind {
        match self {
            InsolationSource::ModelBacked(_) => InsolationSourceKind::Model,
            InsolationSource::SatelliteHourly(_) => InsolationSourceKind::Satellite,
        }
    }

    pub async fn produce(&self, ctx: &InsolationContext<'_>) -> Stage<InsolationEstimate> {
        match self {
            InsolationSource::ModelBacked(est) => {
                // The model was fitted on calendar month names.
                let month = ctx.now.format("%B").to_string();
                est.estimate_daily(&ctx.location.state, &ctx.location.district, &month)
            }
            InsolationSource::SatelliteHourly(est) => {
                let local = local_solar_time(ctx.now, ctx.location.longitude);
                let date = local.format("%Y%m%d").to_string();
                let hour_key = local.format("%Y%m%d%H").to_string();
                est.estimate_hourly(ctx.location.latitude, ctx.location.longitude, &date, &hour_key)
                    .await
            }
        }
    }

    /// Whether a substituted input feeds into what this source produces.
    pub fn is_affected_by(&self, degradation: &Degradation) -> bool {
        match degradation {
            // Only the trained model reads state and district.
            Degradation::RegionUnresolved(_) => matches!(self, InsolationSource::ModelBacked(_)),
            _ => true,
        }
    }

    /// Temperature derating law for the power model on this path.
    pub fn derating(&self) -> DeratingLaw {
        match self {
            InsolationSource::ModelBacked(est) => {
                let c = est.config();
                DeratingLaw {
                    beta_per_c: -c.temperature_coefficient.abs(),
                    ref_temp_c: c.reference_temp_c,
                    min_efficiency: c.min_efficiency,
                    max_efficiency: Some(c.max_efficiency),
                }
            }
            InsolationSource::SatelliteHourly(est) => {
                let c = est.config();
                DeratingLaw {
                    beta_per_c: -c.temperature_coefficient.abs(),
                    ref_temp_c: c.reference_temp_c,
                    min_efficiency: 0.0,
                    max_efficiency: None,
                }
            }
        }
    }

    /// Panel STC efficiency used when the caller does not supply one.
    pub fn default_stc_efficiency(&self) -> f64 {
        match self {
            InsolationSource::ModelBacked(est) => est.config().reference_efficiency,
            InsolationSource::SatelliteHourly(est) => est.config().default_stc_efficiency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelBackedConfig, ProviderConfig, SatelliteConfig};
    use crate::error::ModelError;
    use crate::services::insolation::forest::{FeatureRow, InsolationModel};
    use chrono::TimeZone;
    use reqwest::Client;
    use std::sync::Arc;

    struct ConstantModel;

    impl InsolationModel for ConstantModel {
        fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
            Ok(vec![5.0; rows.len()])
        }
    }

    #[test]
    fn test_region_only_matters_to_the_model() {
        let model = InsolationSource::ModelBacked(ModelBackedDailyEstimator::new(
            Arc::new(ConstantModel),
            ModelBackedConfig::default(),
        ));
        let satellite = InsolationSource::SatelliteHourly(SatelliteHourlyEstimator::new(
            Client::new(),
            &ProviderConfig::default(),
            SatelliteConfig::default(),
        ));
        let region = Degradation::RegionUnresolved("HTTP 503".into());
        let sample = Degradation::MissingIrradianceSample {
            hour_key: "2025081014".into(),
            substitute: 300.0,
            reason: "sentinel".into(),
        };

        assert!(model.is_affected_by(&region));
        assert!(!satellite.is_affected_by(&region));
        assert!(satellite.is_affected_by(&sample));
    }

    #[test]
    fn test_local_solar_time_from_longitude() {
        let now = Utc.with_ymd_and_hms(2025, 8, 10, 8, 30, 0).unwrap();
        // Jaipur, 75.8°E -> UTC+5
        assert_eq!(local_solar_time(now, 75.8).format("%Y%m%d%H").to_string(), "2025081013");
        // Los Angeles, 118.2°W -> UTC-8
        assert_eq!(local_solar_time(now, -118.2).format("%Y%m%d%H").to_string(), "2025081000");
        let late = Utc.with_ymd_and_hms(2025, 8, 10, 22, 0, 0).unwrap();
        assert_eq!(local_solar_time(late, 139.7).format("%Y%m%d").to_string(), "20250811");
    }
}
