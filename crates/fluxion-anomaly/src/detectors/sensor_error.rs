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

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{AnomalyDetector, stats};
use crate::model::{AnomalyType, DailyAggregate, Finding, Severity, UnitProfile};
use crate::settings::SensorSettings;

/// Kind of sensor fault, recorded as `errorType` in the finding metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SensorErrorKind {
    NegativeValue,
    ExceedsMaximum,
    StatisticalOutlier,
}

impl SensorErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NegativeValue => "NEGATIVE_VALUE",
            Self::ExceedsMaximum => "EXCEEDS_MAXIMUM",
            Self::StatisticalOutlier => "STATISTICAL_OUTLIER",
        }
    }
}

impl fmt::Display for SensorErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Envelope of expected values derived from the interquartile range
#[derive(Debug, Clone, Copy, PartialEq)]
struct IqrBounds {
    q1: f64,
    q3: f64,
    iqr: f64,
    lower: f64,
    upper: f64,
}

impl IqrBounds {
    fn from_totals(totals: &[f64], multiplier: f64) -> Option<Self> {
        if totals.is_empty() {
            return None;
        }
        let mut sorted = totals.to_vec();
        sorted.sort_by(f64::total_cmp);

        let q1 = stats::quantile_floor(&sorted, 0.25);
        let q3 = stats::quantile_floor(&sorted, 0.75);
        let iqr = q3 - q1;

        Some(Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Sensor Error Detector
///
/// Two independent passes over the same series:
/// - **Bounds check** against physics: negative energy, or more than 120% of
///   `capacity × 10h` → CRITICAL
/// - **IQR outliers** against the unit's own distribution: outside
///   `[Q1 - 1.5·IQR, Q3 + 1.5·IQR]` → WARNING
///
/// A reading can be statistically wrong without breaking physics, so the
/// two passes may both report the same day.
#[derive(Debug, Clone, Default)]
pub struct SensorErrorDetector {
    settings: SensorSettings,
}

impl SensorErrorDetector {
    pub fn new(settings: SensorSettings) -> Self {
        Self { settings }
    }

    fn bounds_findings(&self, series: &[DailyAggregate], profile: &UnitProfile) -> Vec<Finding> {
        let max_possible = profile.capacity_kw * self.settings.max_daily_hours;
        let ceiling = max_possible * self.settings.overshoot_tolerance;

        series
            .iter()
            .filter_map(|day| {
                let energy = day.total_energy_kwh;
                if energy < 0.0 {
                    let finding = Finding::single_day(
                        AnomalyType::SensorError,
                        Severity::Critical,
                        day.date,
                        format!(
                            "Negative energy reading of {energy:.2} kWh on {}",
                            day.date
                        ),
                    );
                    Some(
                        finding
                            .with("errorType", SensorErrorKind::NegativeValue.as_str())
                            .with("value", energy),
                    )
                } else if energy > ceiling {
                    let overshoot = (energy - max_possible) / max_possible * 100.0;
                    let finding = Finding::single_day(
                        AnomalyType::SensorError,
                        Severity::Critical,
                        day.date,
                        format!(
                            "Reading of {energy:.2} kWh on {} exceeds the theoretical maximum of {max_possible:.2} kWh by {overshoot:.1}%",
                            day.date
                        ),
                    );
                    Some(
                        finding
                            .with("errorType", SensorErrorKind::ExceedsMaximum.as_str())
                            .with("value", energy)
                            .with("maxPossible", stats::round2(max_possible))
                            .with("exceedsByPercent", stats::round2(overshoot)),
                    )
                } else {
                    None
                }
            })
            .collect()
    }

    fn outlier_findings(&self, series: &[DailyAggregate]) -> Vec<Finding> {
        let Some(bounds) =
            IqrBounds::from_totals(&stats::totals(series), self.settings.iqr_multiplier)
        else {
            return Vec::new();
        };

        series
            .iter()
            .filter(|day| !bounds.contains(day.total_energy_kwh))
            .map(|day| {
                let value = day.total_energy_kwh;
                Finding::single_day(
                    AnomalyType::SensorError,
                    Severity::Warning,
                    day.date,
                    format!(
                        "Reading of {value:.2} kWh on {} is outside the expected range [{:.2}, {:.2}] kWh",
                        day.date, bounds.lower, bounds.upper
                    ),
                )
                .with("errorType", SensorErrorKind::StatisticalOutlier.as_str())
                .with("value", value)
                .with("q1", bounds.q1)
                .with("q3", bounds.q3)
                .with("iqr", bounds.iqr)
                .with("lowerBound", bounds.lower)
                .with("upperBound", bounds.upper)
            })
            .collect()
    }
}

impl AnomalyDetector for SensorErrorDetector {
    fn name(&self) -> &str {
        "Sensor-Error"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::SensorError
    }

    fn min_history(&self) -> usize {
        self.settings.min_days
    }

    fn detect(&self, series: &[DailyAggregate], profile: &UnitProfile) -> Vec<Finding> {
        if series.is_empty() || series.len() < self.settings.min_days {
            return Vec::new();
        }

        let mut findings = self.bounds_findings(series, profile);
        findings.extend(self.outlier_findings(series));
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{day, profile, series};

    fn detect(values: &[f64], capacity_kw: f64) -> Vec<Finding> {
        SensorErrorDetector::default().detect(&series(values), &profile(capacity_kw))
    }

    fn error_type(finding: &Finding) -> &str {
        finding
            .metadata
            .get("errorType")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
    }

    #[test]
    fn test_negative_value_is_critical() {
        let findings = detect(&[20.0, -1.0, 20.0, 20.0], 5.0);

        let negative: Vec<&Finding> = findings
            .iter()
            .filter(|f| error_type(f) == "NEGATIVE_VALUE")
            .collect();
        assert_eq!(negative.len(), 1);
        assert_eq!(negative[0].severity, Severity::Critical);
        assert_eq!(negative[0].affected_start, day(1));
        assert_eq!(negative[0].metric("value"), Some(-1.0));
    }

    #[test]
    fn test_exceeds_maximum_is_critical() {
        // capacity 5 kW -> max 50 kWh, ceiling 60 kWh
        let findings = detect(&[20.0, 61.0, 20.0, 20.0], 5.0);

        let exceeded: Vec<&Finding> = findings
            .iter()
            .filter(|f| error_type(f) == "EXCEEDS_MAXIMUM")
            .collect();
        assert_eq!(exceeded.len(), 1);
        assert_eq!(exceeded[0].severity, Severity::Critical);
        assert_eq!(exceeded[0].affected_start, day(1));
        assert_eq!(exceeded[0].metric("maxPossible"), Some(50.0));
        assert_eq!(exceeded[0].metric("exceedsByPercent"), Some(22.0));
    }

    #[test]
    fn test_tolerance_band_is_not_a_bounds_error() {
        // 58 kWh is above 50 but within the 20% tolerance
        let findings = detect(&[50.0, 58.0, 52.0, 55.0], 5.0);
        assert!(
            findings
                .iter()
                .all(|f| error_type(f) != "EXCEEDS_MAXIMUM")
        );
    }

    #[test]
    fn test_iqr_outlier_is_warning() {
        // sorted [9,10,10,10,11,12,50]: q1 = 10, q3 = 12, iqr = 2 -> [7, 15]
        let findings = detect(&[10.0, 11.0, 9.0, 10.0, 12.0, 10.0, 50.0], 10.0);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.severity, Severity::Warning);
        assert_eq!(error_type(finding), "STATISTICAL_OUTLIER");
        assert_eq!(finding.affected_start, day(6));
        assert_eq!(finding.metric("value"), Some(50.0));
        assert_eq!(finding.metric("q1"), Some(10.0));
        assert_eq!(finding.metric("q3"), Some(12.0));
        assert_eq!(finding.metric("lowerBound"), Some(7.0));
        assert_eq!(finding.metric("upperBound"), Some(15.0));
    }

    #[test]
    fn test_both_passes_can_flag_the_same_day() {
        // 200 kWh breaks the 60 kWh ceiling and is far outside the IQR envelope
        let findings = detect(&[20.0, 21.0, 19.0, 20.0, 200.0], 5.0);

        assert_eq!(findings.len(), 2);
        assert_eq!(error_type(&findings[0]), "EXCEEDS_MAXIMUM");
        assert_eq!(error_type(&findings[1]), "STATISTICAL_OUTLIER");
        assert_eq!(findings[0].affected_start, findings[1].affected_start);
    }

    #[test]
    fn test_clean_series_is_quiet() {
        assert!(detect(&[20.0, 21.0, 19.0, 22.0, 20.0], 5.0).is_empty());
    }

    #[test]
    fn test_needs_three_days() {
        assert!(detect(&[-5.0, 100.0], 5.0).is_empty());
    }
}
