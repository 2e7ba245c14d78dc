// Read-side models built from wire types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sv241_api::models::TelemetryPoint;

/// One point of the telemetry chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub voltage: f64,
    pub current: f64,
    pub power: f64,
    pub ambient_temp: f64,
    pub humidity: f64,
    pub dew_point: f64,
    pub lens_temp: f64,
    pub pwm1: f64,
    pub pwm2: f64,
}

impl From<TelemetryPoint> for TelemetrySample {
    fn from(point: TelemetryPoint) -> Self {
        Self {
            // Out-of-range timestamps collapse to the epoch rather than failing the series.
            timestamp: DateTime::from_timestamp(point.timestamp, 0).unwrap_or_default(),
            voltage: point.voltage,
            current: point.current,
            power: point.power,
            ambient_temp: point.temp,
            humidity: point.hum,
            dew_point: point.dew,
            lens_temp: point.lens,
            pwm1: point.pwm1,
            pwm2: point.pwm2,
        }
    }
}

/// Convert a history response, oldest point first.
pub fn telemetry_series(points: Vec<TelemetryPoint>) -> Vec<TelemetrySample> {
    let mut series: Vec<TelemetrySample> = points.into_iter().map(TelemetrySample::from).collect();
    series.sort_by_key(|sample| sample.timestamp);
    series
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_seconds_become_utc_and_series_is_ordered() {
        let points = vec![
            TelemetryPoint {
                timestamp: 1_700_000_060,
                voltage: 12.1,
                ..TelemetryPoint::default()
            },
            TelemetryPoint {
                timestamp: 1_700_000_000,
                lens: 4.5,
                ..TelemetryPoint::default()
            },
        ];
        let series = telemetry_series(points);
        assert_eq!(series[0].timestamp.timestamp(), 1_700_000_000);
        assert!((series[0].lens_temp - 4.5).abs() < f64::EPSILON);
        assert!((series[1].voltage - 12.1).abs() < f64::EPSILON);
    }
}
