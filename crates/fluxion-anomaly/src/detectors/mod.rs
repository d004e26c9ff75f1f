// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

mod mechanical;
mod sensor_error;
mod shading;
mod temperature;

pub use mechanical::MechanicalFailureDetector;
pub use sensor_error::{SensorErrorDetector, SensorErrorKind};
pub use shading::ShadingDetector;
pub use temperature::TemperatureDeratingDetector;

use std::sync::Arc;

use crate::model::{AnomalyType, DailyAggregate, Finding, UnitProfile};
use crate::settings::DetectionSettings;

/// Heuristic anomaly detector over a unit's daily production history.
///
/// Detectors are pure functions of their inputs: they never persist anything
/// and never fail. A series shorter than [`AnomalyDetector::min_history`]
/// yields no findings.
pub trait AnomalyDetector: Send + Sync {
    /// Get the name of this detector
    fn name(&self) -> &str;

    /// Anomaly type every finding of this detector carries
    fn anomaly_type(&self) -> AnomalyType;

    /// Minimum number of daily aggregates needed to say anything
    fn min_history(&self) -> usize;

    /// Evaluate the series (ascending by date) and return findings in date order
    fn detect(&self, series: &[DailyAggregate], profile: &UnitProfile) -> Vec<Finding>;
}

/// The four standard detectors, in the order their findings are merged
pub fn default_detectors(settings: &DetectionSettings) -> Vec<Arc<dyn AnomalyDetector>> {
    vec![
        Arc::new(MechanicalFailureDetector::new(settings.mechanical.clone())),
        Arc::new(TemperatureDeratingDetector::new(settings.temperature.clone())),
        Arc::new(ShadingDetector::new(settings.shading.clone())),
        Arc::new(SensorErrorDetector::new(settings.sensor.clone())),
    ]
}

/// Helper functions shared by the detectors
pub(crate) mod stats {
    use crate::model::DailyAggregate;

    /// Arithmetic mean, zero for an empty slice
    #[expect(clippy::cast_precision_loss, reason = "day counts are tiny")]
    pub fn mean(values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        values.iter().sum::<f64>() / values.len() as f64
    }

    pub fn totals(series: &[DailyAggregate]) -> Vec<f64> {
        series.iter().map(|d| d.total_energy_kwh).collect()
    }

    /// Value at `floor(n * fraction)` of an ascending-sorted slice
    #[expect(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "index of a small non-empty slice"
    )]
    pub fn quantile_floor(sorted: &[f64], fraction: f64) -> f64 {
        let idx = ((sorted.len() as f64) * fraction).floor() as usize;
        sorted[idx.min(sorted.len() - 1)]
    }

    /// Round for human-readable descriptions and metadata
    pub fn round2(value: f64) -> f64 {
        (value * 100.0).round() / 100.0
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::NaiveDate;

    use crate::model::{DailyAggregate, UnitProfile};

    /// Consecutive days starting 2025-06-01
    pub fn series(values: &[f64]) -> Vec<DailyAggregate> {
        let start = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| DailyAggregate::new(start + chrono::Days::new(i as u64), *v))
            .collect()
    }

    pub fn day(offset: u64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap() + chrono::Days::new(offset)
    }

    pub fn profile(capacity_kw: f64) -> UnitProfile {
        UnitProfile {
            unit_id: "unit-1".to_owned(),
            capacity_kw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{profile, series};
    use super::*;

    #[test]
    fn test_default_detector_order() {
        let detectors = default_detectors(&DetectionSettings::default());
        let types: Vec<AnomalyType> = detectors.iter().map(|d| d.anomaly_type()).collect();
        assert_eq!(
            types,
            vec![
                AnomalyType::Mechanical,
                AnomalyType::Temperature,
                AnomalyType::Shading,
                AnomalyType::SensorError,
            ]
        );
    }

    #[test]
    fn test_short_series_yields_nothing() {
        // Values chosen so every detector would fire given enough history
        let values = [40.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        for detector in default_detectors(&DetectionSettings::default()) {
            for len in 0..detector.min_history() {
                let findings = detector.detect(&series(&values[..len]), &profile(5.0));
                assert!(
                    findings.is_empty(),
                    "{} fired on {} days (min {})",
                    detector.name(),
                    len,
                    detector.min_history()
                );
            }
        }
    }

    #[test]
    fn test_quantile_floor_uses_floor_index() {
        let sorted = [9.0, 10.0, 10.0, 10.0, 11.0, 12.0, 50.0];
        assert_eq!(stats::quantile_floor(&sorted, 0.25), 10.0);
        assert_eq!(stats::quantile_floor(&sorted, 0.75), 12.0);
    }

    #[test]
    fn test_mean_of_empty_is_zero() {
        assert_eq!(stats::mean(&[]), 0.0);
        assert_eq!(stats::mean(&[2.0, 4.0]), 3.0);
    }
}
