//! Daily insolation (kWh/m²/day) to average daylight irradiance (W/m²).

use crate::error::{Degradation, Stage};
use crate::models::estimate::{InsolationEstimate, InsolationUnit, WeatherSample};

/// Floor for the daylight window, so the conversion never divides by zero.
pub const MIN_DAYLIGHT_HOURS: f64 = 1.0;
/// Assumed when the weather provider reports no sunrise/sunset.
pub const DEFAULT_DAYLIGHT_HOURS: f64 = 12.0;

pub fn daylight_hours(sunrise_unix: i64, sunset_unix: i64) -> f64 {
    ((sunset_unix - sunrise_unix) as f64 / 3600.0).max(MIN_DAYLIGHT_HOURS)
}

fn daylight_window(sample: &WeatherSample) -> Option<f64> {
    match (sample.sunrise_unix, sample.sunset_unix) {
        (Some(rise), Some(set)) => Some(daylight_hours(rise, set)),
        _ => None,
    }
}

/// Average irradiance in W/m². Instantaneous readings pass through.
pub fn to_instantaneous(estimate: &InsolationEstimate, sample: &WeatherSample) -> f64 {
    match estimate.unit {
        InsolationUnit::WattsPerM2 => estimate.value,
        InsolationUnit::KwhPerM2PerDay => {
            let hours = daylight_window(sample).unwrap_or(DEFAULT_DAYLIGHT_HOURS);
            estimate.value * 1000.0 / hours
        }
    }
}

/// [`to_instantaneous`] as a pipeline stage: a daily value without a
/// daylight window is converted with the default window and marked degraded.
pub fn normalize(estimate: &InsolationEstimate, sample: &WeatherSample) -> Stage<f64> {
    let irradiance = to_instantaneous(estimate, sample);
    if estimate.unit == InsolationUnit::KwhPerM2PerDay && daylight_window(sample).is_none() {
        return Stage::Degraded(
            irradiance,
            Degradation::MissingDaylightWindow { assumed_hours: DEFAULT_DAYLIGHT_HOURS },
        );
    }
    Stage::Ok(irradiance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(sunrise: Option<i64>, sunset: Option<i64>) -> WeatherSample {
        WeatherSample {
            ambient_temp_c: 30.0,
            wind_speed_ms: 0.0,
            sunrise_unix: sunrise,
            sunset_unix: sunset,
            coordinates: None,
        }
    }

    #[test]
    fn test_daylight_hours_floor() {
        assert_eq!(daylight_hours(0, 0), 1.0);
        assert_eq!(daylight_hours(1000, 500), 1.0);
        assert_eq!(daylight_hours(0, 12 * 3600), 12.0);
    }

    #[test]
    fn test_daily_conversion() {
        let est = InsolationEstimate::daily(5.8, false);
        let irr = to_instantaneous(&est, &sample(Some(0), Some(12 * 3600)));
        assert!((irr - 483.333).abs() < 0.01, "got {irr}");
    }

    #[test]
    fn test_zero_window_does_not_divide_by_zero() {
        let est = InsolationEstimate::daily(5.0, false);
        let irr = to_instantaneous(&est, &sample(Some(0), Some(0)));
        assert_eq!(irr, 5000.0);
    }

    #[test]
    fn test_hourly_passes_through() {
        let est = InsolationEstimate::hourly(655.0, false);
        assert_eq!(to_instantaneous(&est, &sample(None, None)), 655.0);
        assert!(matches!(normalize(&est, &sample(None, None)), Stage::Ok(v) if v == 655.0));
    }

    #[test]
    fn test_missing_window_degrades() {
        let est = InsolationEstimate::daily(6.0, false);
        match normalize(&est, &sample(Some(100), None)) {
            Stage::Degraded(irr, Degradation::MissingDaylightWindow { assumed_hours }) => {
                assert_eq!(assumed_hours, 12.0);
                assert_eq!(irr, 500.0);
            }
            other => panic!("expected degraded, got {:?}", other),
        }
    }
}
