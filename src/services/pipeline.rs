//! One request: ResolveLocation → FetchWeather → EstimateInsolation →
//! Normalize → ComputePower. Nothing is carried between requests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Client;
use tracing::{debug, error, info};

use crate::config::{Config, InsolationSourceKind};
use crate::error::{Degradation, EstimationError, SetupError, Stage};
use crate::models::estimate::{EstimationReport, PanelSpec, PowerEstimate, ResolvedLocation};
use crate::services::insolation::forest::InsolationModel;
use crate::services::insolation::{
    InsolationContext, InsolationSource, ModelBackedDailyEstimator, SatelliteHourlyEstimator,
};
use crate::services::location_service::LocationResolver;
use crate::services::weather_service::WeatherClient;
use crate::services::{irradiance, power_model};

/// Immutable estimation service, built once at startup and shared by reference.
pub struct EstimationPipeline {
    locations: LocationResolver,
    weather: WeatherClient,
    source: InsolationSource,
}

impl EstimationPipeline {
    pub fn new(locations: LocationResolver, weather: WeatherClient, source: InsolationSource) -> Self {
        Self { locations, weather, source }
    }

    /// Wire the pipeline from configuration. `model` is required when the
    /// configured source is the trained model.
    pub fn from_config(config: &Config, model: Option<Arc<dyn InsolationModel>>) -> Result<Self, SetupError> {
        let client = Client::builder().build()?;

        let source = match (config.insolation.source, model) {
            (InsolationSourceKind::Model, Some(model)) => {
                InsolationSource::ModelBacked(ModelBackedDailyEstimator::new(model, config.model_backed.clone()))
            }
            (InsolationSourceKind::Model, None) => return Err(SetupError::MissingModel),
            (InsolationSourceKind::Satellite, _) => InsolationSource::SatelliteHourly(
                SatelliteHourlyEstimator::new(client.clone(), &config.providers, config.satellite.clone()),
            ),
        };

        Ok(Self::new(
            LocationResolver::from_config(client.clone(), &config.providers),
            WeatherClient::new(client, &config.providers),
            source,
        ))
    }

    pub fn source_kind(&self) -> InsolationSourceKind {
        self.source.kind()
    }

    /// STC efficiency used when the caller does not specify one.
    pub fn default_stc_efficiency(&self) -> f64 {
        self.source.default_stc_efficiency()
    }

    /// Caller-facing estimate at the current time.
    pub async fn estimate(&self, city: &str, panel: PanelSpec) -> Result<PowerEstimate, EstimationError> {
        self.estimate_at(city, panel, Utc::now()).await
    }

    pub async fn estimate_at(&self, city: &str, panel: PanelSpec, now: DateTime<Utc>) -> Result<PowerEstimate, EstimationError> {
        self.run_at(city, panel, now).await.map(|report| report.estimate)
    }

    pub async fn run(&self, city: &str, panel: PanelSpec) -> Result<EstimationReport, EstimationError> {
        self.run_at(city, panel, Utc::now()).await
    }

    pub async fn run_at(&self, city: &str, panel: PanelSpec, now: DateTime<Utc>) -> Result<EstimationReport, EstimationError> {
        let result = self.execute(city, panel, now).await;
        if let Err(e) = &result {
            error!("[PIPELINE] Estimation for '{}' failed: {}", city, e);
        }
        result
    }

    async fn execute(&self, city: &str, panel: PanelSpec, now: DateTime<Utc>) -> Result<EstimationReport, EstimationError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(EstimationError::InvalidInput("city name is required".to_string()));
        }
        panel.validate()?;

        let mut degradations: Vec<Degradation> = Vec::new();

        // ResolveLocation
        let coords = self.locations.resolve_coordinates(city).await?;
        let region = self.locations.resolve_region(coords).await.settle(&mut degradations)?;
        let location = ResolvedLocation::new(coords, region);

        // FetchWeather
        let weather = match self.weather.get_current_weather(city).await {
            Ok(sample) => Stage::Ok(sample),
            Err(e) => Stage::Fatal(EstimationError::WeatherUnavailable(e.to_string())),
        }
        .settle(&mut degradations)?;

        // EstimateInsolation
        let ctx = InsolationContext { location: &location, now };
        let insolation = self.source.produce(&ctx).await.settle(&mut degradations)?;

        // Normalize
        let irradiance_w_m2 = irradiance::normalize(&insolation, &weather).settle(&mut degradations)?;
        debug!(
            "[PIPELINE] '{}': insolation {:.3} {:?} -> {:.2} W/m²",
            city, insolation.value, insolation.unit, irradiance_w_m2
        );

        // ComputePower
        let mut estimate = power_model::compute(irradiance_w_m2, weather.ambient_temp_c, &panel, &self.source.derating());
        estimate.estimated =
            insolation.estimated || degradations.iter().any(|d| self.source.is_affected_by(d));
        estimate.diagnostics.extend(insolation.diagnostics.clone());
        estimate.diagnostics.insert("wind_speed_m_s".to_string(), weather.wind_speed_ms);
        estimate.diagnostics.insert("latitude".to_string(), location.latitude);
        estimate.diagnostics.insert("longitude".to_string(), location.longitude);
        if let (Some(rise), Some(set)) = (weather.sunrise_unix, weather.sunset_unix) {
            estimate
                .diagnostics
                .insert("daylight_hours".to_string(), irradiance::daylight_hours(rise, set));
        }

        info!(
            "[PIPELINE] {} ({}/{}) | Tcell: {:.1}°C | η: {:.2}% | Power: {:.2} W{}",
            city,
            location.state,
            location.district,
            estimate.cell_temp_c,
            estimate.efficiency_fraction * 100.0,
            estimate.power_watts,
            if estimate.estimated { " (estimated)" } else { "" }
        );

        Ok(EstimationReport {
            timestamp: now,
            city: city.to_string(),
            source: self.source.kind(),
            location,
            weather,
            insolation,
            irradiance_w_m2,
            panel,
            estimate,
            degradations: degradations.iter().map(ToString::to_string).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelBackedConfig, ProviderConfig, SatelliteConfig};
    use crate::error::ModelError;
    use crate::services::insolation::forest::FeatureRow;
    use chrono::TimeZone;
    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;
    use std::sync::Mutex;

    const SUNRISE: i64 = 1_754_784_000;

    /// Stub regressor that records the rows it was asked about.
    struct StubModel {
        prediction: Result<f64, String>,
        seen: Mutex<Vec<FeatureRow>>,
    }

    impl StubModel {
        fn new(prediction: Result<f64, String>) -> Arc<Self> {
            Arc::new(Self { prediction, seen: Mutex::new(Vec::new()) })
        }
    }

    impl InsolationModel for StubModel {
        fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ModelError> {
            self.seen.lock().unwrap().extend_from_slice(rows);
            self.prediction
                .clone()
                .map(|v| vec![v; rows.len()])
                .map_err(ModelError::Prediction)
        }
    }

    fn providers(server: &ServerGuard) -> ProviderConfig {
        ProviderConfig {
            openweather_url: server.url(),
            openweather_api_key: "test_key".to_string(),
            nominatim_url: server.url(),
            nasa_power_url: server.url(),
            nominatim_spacing_ms: 0,
            ..Default::default()
        }
    }

    fn model_pipeline(server: &ServerGuard, model: Arc<StubModel>) -> EstimationPipeline {
        let cfg = providers(server);
        let client = Client::new();
        EstimationPipeline::new(
            LocationResolver::from_config(client.clone(), &cfg),
            WeatherClient::new(client, &cfg),
            InsolationSource::ModelBacked(ModelBackedDailyEstimator::new(model, ModelBackedConfig::default())),
        )
    }

    fn satellite_pipeline(server: &ServerGuard) -> EstimationPipeline {
        let cfg = providers(server);
        let client = Client::new();
        EstimationPipeline::new(
            LocationResolver::from_config(client.clone(), &cfg),
            WeatherClient::new(client.clone(), &cfg),
            InsolationSource::SatelliteHourly(SatelliteHourlyEstimator::new(client, &cfg, SatelliteConfig::default())),
        )
    }

    async fn mock_geocode(server: &mut ServerGuard) -> Mock {
        server
            .mock("GET", "/geo/1.0/direct")
            .match_query(Matcher::UrlEncoded("q".into(), "Jaipur".into()))
            .with_status(200)
            .with_body(json!([{"name": "Jaipur", "lat": 26.9124, "lon": 75.7873}]).to_string())
            .create_async()
            .await
    }

    async fn mock_reverse(server: &mut ServerGuard, body: serde_json::Value) -> Mock {
        server
            .mock("GET", "/reverse")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await
    }

    async fn mock_weather(server: &mut ServerGuard, temp: f64, daylight_secs: i64) -> Mock {
        server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(
                json!({
                    "coord": {"lon": 75.82, "lat": 26.92},
                    "main": {"temp": temp},
                    "wind": {"speed": 2.5},
                    "sys": {"sunrise": SUNRISE, "sunset": SUNRISE + daylight_secs},
                    "cod": 200
                })
                .to_string(),
            )
            .create_async()
            .await
    }

    fn august_noon_utc() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 8, 10, 6, 30, 0).unwrap()
    }

    #[test]
    fn test_model_source_requires_loaded_model() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert!(matches!(
            EstimationPipeline::from_config(&config, None),
            Err(SetupError::MissingModel)
        ));

        let config: Config = serde_json::from_str(r#"{"insolation": {"source": "satellite"}}"#).unwrap();
        let pipeline = EstimationPipeline::from_config(&config, None).unwrap();
        assert_eq!(pipeline.source_kind(), InsolationSourceKind::Satellite);
    }

    #[tokio::test]
    async fn test_estimate_returns_power_only() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"state": "Rajasthan", "county": "Jaipur"}})).await;
        let _wx = mock_weather(&mut server, 35.0, 12 * 3600).await;

        let estimate = model_pipeline(&server, StubModel::new(Ok(5.8)))
            .estimate_at("Jaipur", PanelSpec::new(45.0, 1.6, 0.15), august_noon_utc())
            .await
            .unwrap();

        assert!((estimate.power_watts - 102.8).abs() / 102.8 < 0.01, "power {:.2}", estimate.power_watts);
        assert!(!estimate.estimated);
    }

    #[tokio::test]
    async fn test_jaipur_end_to_end() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"state": "Rajasthan", "county": "Jaipur"}})).await;
        let _wx = mock_weather(&mut server, 35.0, 12 * 3600).await;

        let model = StubModel::new(Ok(5.8));
        let pipeline = model_pipeline(&server, model.clone());
        let report = pipeline
            .run_at("Jaipur", PanelSpec::new(45.0, 1.6, 0.15), august_noon_utc())
            .await
            .unwrap();

        let seen = model.seen.lock().unwrap().clone();
        assert_eq!(seen, vec![FeatureRow {
            state: "Rajasthan".into(),
            district: "Jaipur".into(),
            month: "August".into(),
        }]);

        assert!((report.irradiance_w_m2 - 483.33).abs() < 0.5, "irradiance {:.2}", report.irradiance_w_m2);
        let est = &report.estimate;
        assert!((est.cell_temp_c - 50.1).abs() < 0.1, "Tcell {:.2}", est.cell_temp_c);
        assert!((est.efficiency_fraction - 0.1331).abs() < 0.001, "eff {:.4}", est.efficiency_fraction);
        assert!((est.power_watts - 102.8).abs() / 102.8 < 0.01, "power {:.2}", est.power_watts);
        assert!(!est.estimated);
        assert!(report.degradations.is_empty());
        assert_eq!(est.diagnostics.get("daylight_hours"), Some(&12.0));
    }

    #[tokio::test]
    async fn test_unresolved_region_still_completes() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"country": "India"}})).await;
        let _wx = mock_weather(&mut server, 30.0, 12 * 3600).await;

        let model = StubModel::new(Ok(5.0));
        let report = model_pipeline(&server, model.clone())
            .run_at("Jaipur", PanelSpec::new(45.0, 1.6, 0.15), august_noon_utc())
            .await
            .unwrap();

        assert_eq!(report.location.state, "Unknown State");
        assert_eq!(report.location.district, "Unknown District");
        assert_eq!(model.seen.lock().unwrap()[0].state, "Unknown State");
        assert!(report.estimate.estimated);
        assert_eq!(report.degradations.len(), 1);
        assert!(report.estimate.power_watts > 0.0);
    }

    #[tokio::test]
    async fn test_model_failure_marks_estimated() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"state": "Rajasthan", "county": "Jaipur"}})).await;
        let _wx = mock_weather(&mut server, 30.0, 10 * 3600).await;

        let report = model_pipeline(&server, StubModel::new(Err("artifact error".into())))
            .run_at("Jaipur", PanelSpec::new(45.0, 1.6, 0.15), august_noon_utc())
            .await
            .unwrap();

        assert_eq!(report.insolation.value, 4.5);
        assert!(report.insolation.estimated);
        assert!(report.estimate.estimated);
        assert!((report.irradiance_w_m2 - 450.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_panel_rejected_before_network() {
        let mut server = Server::new_async().await;
        let geo = server
            .mock("GET", "/geo/1.0/direct")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = model_pipeline(&server, StubModel::new(Ok(5.0)))
            .estimate("Jaipur", PanelSpec::new(-45.0, 1.6, 0.15))
            .await;

        assert!(matches!(result, Err(EstimationError::InvalidInput(_))));
        geo.assert_async().await;
    }

    #[tokio::test]
    async fn test_weather_unavailable_is_fatal() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"state": "Rajasthan", "county": "Jaipur"}})).await;
        let _wx = server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"cod": "404", "message": "city not found"}).to_string())
            .create_async()
            .await;

        let result = model_pipeline(&server, StubModel::new(Ok(5.0)))
            .run_at("Jaipur", PanelSpec::new(45.0, 1.6, 0.15), august_noon_utc())
            .await;
        assert!(matches!(result, Err(EstimationError::WeatherUnavailable(_))));
    }

    #[tokio::test]
    async fn test_location_not_found_is_fatal() {
        let mut server = Server::new_async().await;
        let _geo = server
            .mock("GET", "/geo/1.0/direct")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let _search = server
            .mock("GET", "/search")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;
        let weather = server
            .mock("GET", "/data/2.5/weather")
            .match_query(Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let result = model_pipeline(&server, StubModel::new(Ok(5.0)))
            .run_at("Atlantis", PanelSpec::new(45.0, 1.6, 0.15), august_noon_utc())
            .await;
        assert!(matches!(result, Err(EstimationError::LocationNotFound { .. })));
        weather.assert_async().await;
    }

    #[tokio::test]
    async fn test_satellite_sentinel_daytime() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"state": "Rajasthan", "county": "Jaipur"}})).await;
        let _wx = mock_weather(&mut server, 32.0, 13 * 3600).await;
        // 09:00 UTC at 75.8°E -> 14:00 local
        let _feed = server
            .mock("GET", "/api/temporal/hourly/point")
            .match_query(Matcher::UrlEncoded("start".into(), "20250810".into()))
            .with_status(200)
            .with_body(json!({"properties": {"parameter": {"ALLSKY_SFC_SW_DWN": {"2025081014": -999.0}}}}).to_string())
            .create_async()
            .await;

        let now = Utc.with_ymd_and_hms(2025, 8, 10, 9, 0, 0).unwrap();
        let report = satellite_pipeline(&server)
            .run_at("Jaipur", PanelSpec::new(45.0, 2.0, 0.20), now)
            .await
            .unwrap();

        assert_eq!(report.source, InsolationSourceKind::Satellite);
        assert_eq!(report.irradiance_w_m2, 300.0);
        assert!(report.estimate.estimated);
        assert!(report.estimate.power_watts > 0.0);
    }

    #[tokio::test]
    async fn test_satellite_measured_sample_ignores_region_failure() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = server
            .mock("GET", "/reverse")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;
        let _wx = mock_weather(&mut server, 32.0, 13 * 3600).await;
        let _feed = server
            .mock("GET", "/api/temporal/hourly/point")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"properties": {"parameter": {"ALLSKY_SFC_SW_DWN": {"2025081014": 650.0}}}}).to_string())
            .create_async()
            .await;

        let now = Utc.with_ymd_and_hms(2025, 8, 10, 9, 0, 0).unwrap();
        let report = satellite_pipeline(&server)
            .run_at("Jaipur", PanelSpec::new(45.0, 2.0, 0.20), now)
            .await
            .unwrap();

        assert_eq!(report.location.state, "Unknown State");
        assert_eq!(report.degradations.len(), 1);
        assert_eq!(report.irradiance_w_m2, 650.0);
        assert!(!report.insolation.estimated);
        assert!(!report.estimate.estimated);
        assert!(report.estimate.power_watts > 0.0);
    }

    #[tokio::test]
    async fn test_satellite_sentinel_night() {
        let mut server = Server::new_async().await;
        let _geo = mock_geocode(&mut server).await;
        let _rev = mock_reverse(&mut server, json!({"address": {"state": "Rajasthan", "county": "Jaipur"}})).await;
        let _wx = mock_weather(&mut server, 24.0, 13 * 3600).await;
        // 21:00 UTC on the 9th at 75.8°E -> 02:00 local on the 10th
        let _feed = server
            .mock("GET", "/api/temporal/hourly/point")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(json!({"properties": {"parameter": {"ALLSKY_SFC_SW_DWN": {"2025081002": -999.0}}}}).to_string())
            .create_async()
            .await;

        let now = Utc.with_ymd_and_hms(2025, 8, 9, 21, 0, 0).unwrap();
        let report = satellite_pipeline(&server)
            .run_at("Jaipur", PanelSpec::new(45.0, 2.0, 0.20), now)
            .await
            .unwrap();

        assert_eq!(report.irradiance_w_m2, 0.0);
        assert!(!report.estimate.estimated);
        assert_eq!(report.estimate.power_watts, 0.0);
        assert_eq!(report.estimate.cell_temp_c, 24.0);
        assert_eq!(report.estimate.efficiency_fraction, 0.20);
    }
}
