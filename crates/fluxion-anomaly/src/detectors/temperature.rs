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
use crate::settings::TemperatureSettings;

/// Temperature Derating Detector
///
/// Compares the trailing week against `capacity × daylight hours`. A unit that
/// keeps producing, but at a steady fraction of its rating, is losing
/// efficiency to heat rather than failing outright.
///
/// **Triggers:**
/// - 7-day average between 0 and 60% of expected → WARNING below 40% efficiency, INFO otherwise
#[derive(Debug, Clone, Default)]
pub struct TemperatureDeratingDetector {
    settings: TemperatureSettings,
}

impl TemperatureDeratingDetector {
    pub fn new(settings: TemperatureSettings) -> Self {
        Self { settings }
    }
}

impl AnomalyDetector for TemperatureDeratingDetector {
    fn name(&self) -> &str {
        "Temperature-Derating"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::Temperature
    }

    fn min_history(&self) -> usize {
        self.settings.min_days
    }

    fn detect(&self, series: &[DailyAggregate], profile: &UnitProfile) -> Vec<Finding> {
        let window_len = self.settings.min_days;
        if window_len == 0 || series.len() < window_len {
            return Vec::new();
        }

        let expected_daily = profile.capacity_kw * self.settings.daylight_hours;
        let window = &series[series.len() - window_len..];
        let avg_recent = stats::mean(&stats::totals(window));

        if !(avg_recent > 0.0 && avg_recent < expected_daily * self.settings.efficiency_ratio) {
            return Vec::new();
        }

        let efficiency_percent = avg_recent / expected_daily * 100.0;
        let severity = if efficiency_percent < self.settings.warning_efficiency_percent {
            Severity::Warning
        } else {
            Severity::Info
        };

        let first = window[0].date;
        let last = window[window.len() - 1].date;

        let finding = Finding {
            anomaly_type: AnomalyType::Temperature,
            severity,
            affected_start: first,
            affected_end: last,
            description: format!(
                "Average production {:.2} kWh/day over {} days ({} to {}) is {:.1}% of the expected {:.2} kWh/day",
                avg_recent, window_len, first, last, efficiency_percent, expected_daily
            ),
            metadata: Default::default(),
        };

        vec![
            finding
                .with("averageProduction", stats::round2(avg_recent))
                .with("expectedProduction", stats::round2(expected_daily))
                .with("efficiencyPercent", stats::round2(efficiency_percent))
                .with("daysAnalyzed", window_len),
        ]
    }
}
