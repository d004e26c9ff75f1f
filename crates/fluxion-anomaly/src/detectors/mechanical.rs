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

use super::{AnomalyDetector, stats};
use crate::model::{AnomalyType, DailyAggregate, Finding, Severity, UnitProfile};
use crate::settings::MechanicalSettings;

/// Mechanical Failure Detector
///
/// Weather moves production gradually and in step with the running average.
/// A day that collapses against both the previous day and the average points
/// at hardware (inverter trip, string disconnect) instead.
///
/// **Triggers:**
/// - Output drops to zero after a day above 30% of the average → CRITICAL
/// - Output falls below 30% of the previous day and below 50% of the average
///   → CRITICAL above an 80% drop, WARNING otherwise
#[derive(Debug, Clone, Default)]
pub struct MechanicalFailureDetector {
    settings: MechanicalSettings,
}

impl MechanicalFailureDetector {
    pub fn new(settings: MechanicalSettings) -> Self {
        Self { settings }
    }

    #[expect(clippy::float_cmp, reason = "an offline unit reports exactly zero")]
    fn evaluate_pair(
        &self,
        prev: &DailyAggregate,
        curr: &DailyAggregate,
        avg: f64,
    ) -> Option<Finding> {
        let previous = prev.total_energy_kwh;
        let current = curr.total_energy_kwh;

        if current == 0.0 && previous > self.settings.zero_drop_avg_ratio * avg {
            let finding = Finding::single_day(
                AnomalyType::Mechanical,
                Severity::Critical,
                curr.date,
                format!(
                    "Production dropped to zero on {} after {:.2} kWh the previous day (average {:.2} kWh)",
                    curr.date,
                    previous,
                    avg
                ),
            );
            return Some(
                finding
                    .with("previousEnergy", previous)
                    .with("currentEnergy", current)
                    .with("dropPercentage", 100.0),
            );
        }

        if previous > 0.0
            && current < self.settings.drop_prev_ratio * previous
            && current < self.settings.drop_avg_ratio * avg
        {
            let drop_percent = (previous - current) / previous * 100.0;
            let severity = if drop_percent > self.settings.critical_drop_percent {
                Severity::Critical
            } else {
                Severity::Warning
            };
            let finding = Finding::single_day(
                AnomalyType::Mechanical,
                severity,
                curr.date,
                format!(
                    "Production fell {:.1}% on {} ({:.2} kWh → {:.2} kWh, average {:.2} kWh)",
                    drop_percent, curr.date, previous, current, avg
                ),
            );
            return Some(
                finding
                    .with("previousEnergy", previous)
                    .with("currentEnergy", current)
                    .with("dropPercentage", stats::round2(drop_percent)),
            );
        }

        None
    }
}

impl AnomalyDetector for MechanicalFailureDetector {
    fn name(&self) -> &str {
        "Mechanical-Failure"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::Mechanical
    }

    fn min_history(&self) -> usize {
        2
    }

    fn detect(&self, series: &[DailyAggregate], _profile: &UnitProfile) -> Vec<Finding> {
        if series.len() < self.min_history() {
            return Vec::new();
        }

        let avg = stats::mean(&stats::totals(series));

        series
            .windows(2)
            .filter_map(|pair| self.evaluate_pair(&pair[0], &pair[1], avg))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{day, profile, series};

    fn detect(values: &[f64]) -> Vec<Finding> {
        MechanicalFailureDetector::default().detect(&series(values), &profile(5.0))
    }

    #[test]
    fn test_zero_day_is_critical() {
        let findings = detect(&[10.0, 10.0, 10.0, 10.0, 0.0]);

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.anomaly_type, AnomalyType::Mechanical);
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(finding.affected_start, day(4));
        assert_eq!(finding.affected_end, day(4));
        assert_eq!(finding.metric("dropPercentage"), Some(100.0));
        assert_eq!(finding.metric("previousEnergy"), Some(10.0));
        assert_eq!(finding.metric("currentEnergy"), Some(0.0));
    }

    #[test]
    fn test_steady_production_is_quiet() {
        assert!(detect(&[10.0, 11.0, 9.5, 10.5, 10.0]).is_empty());
    }

    #[test]
    fn test_partial_drop_severity_split() {
        // avg = 8.2; 10 -> 1: 90% drop, below 0.3*prev and 0.5*avg
        let findings = detect(&[10.0, 10.0, 10.0, 10.0, 1.0]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
        assert_eq!(findings[0].metric("dropPercentage"), Some(90.0));

        // avg = 8.5; 10 -> 2.5: 75% drop
        let findings = detect(&[10.0, 10.0, 10.0, 10.0, 2.5]);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Warning);
        assert_eq!(findings[0].metric("dropPercentage"), Some(75.0));
    }

    #[test]
    fn test_drop_must_also_be_low_against_average() {
        // 60 -> 15 is below 0.3*prev but the average is 27, so 15 is not < 0.5*avg
        let findings = detect(&[60.0, 15.0, 20.0, 20.0, 20.0]);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_zero_after_low_day_falls_through_to_drop_rule() {
        // prev (2) is below 0.3*avg (~3.4) so the zero rule does not apply,
        // but the generic drop rule still catches the collapse
        let findings = detect(&[20.0, 20.0, 15.0, 2.0, 0.0]);
        let last = findings.last().unwrap();
        assert_eq!(last.affected_start, day(4));
        assert_eq!(last.severity, Severity::Critical);
        assert_eq!(last.metric("dropPercentage"), Some(100.0));
    }

    #[test]
    fn test_needs_two_days() {
        assert!(detect(&[0.0]).is_empty());
        assert!(detect(&[]).is_empty());
    }
}
