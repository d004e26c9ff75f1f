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
use crate::settings::ShadingSettings;

/// Shading/Obstruction Detector
///
/// Uses the best observed days as a proxy for what the unit can do
/// unobstructed. Many days moderately below that peak suggest partial
/// shading (vegetation, new construction, soiling).
///
/// **Triggers:**
/// - Overall average below 70% of the top-3 average, with at least 3 days
///   below 75% of it → WARNING above a 40% reduction, INFO otherwise
#[derive(Debug, Clone, Default)]
pub struct ShadingDetector {
    settings: ShadingSettings,
}

impl ShadingDetector {
    pub fn new(settings: ShadingSettings) -> Self {
        Self { settings }
    }
}

impl AnomalyDetector for ShadingDetector {
    fn name(&self) -> &str {
        "Shading-Obstruction"
    }

    fn anomaly_type(&self) -> AnomalyType {
        AnomalyType::Shading
    }

    fn min_history(&self) -> usize {
        self.settings.min_days.max(self.settings.peak_days)
    }

    fn detect(&self, series: &[DailyAggregate], _profile: &UnitProfile) -> Vec<Finding> {
        if series.is_empty() || series.len() < self.min_history() {
            return Vec::new();
        }

        let totals = stats::totals(series);
        let mut sorted = totals.clone();
        sorted.sort_by(|a, b| b.total_cmp(a));

        let peak_avg = stats::mean(&sorted[..self.settings.peak_days.min(sorted.len())]);
        let overall_avg = stats::mean(&totals);

        if !(peak_avg > 0.0 && overall_avg < peak_avg * self.settings.reduction_ratio) {
            return Vec::new();
        }

        let reduction_percent = (peak_avg - overall_avg) / peak_avg * 100.0;
        let low_threshold = peak_avg * self.settings.low_day_ratio;
        let low_days: Vec<&DailyAggregate> = series
            .iter()
            .filter(|d| d.total_energy_kwh < low_threshold)
            .collect();

        if low_days.len() < self.settings.min_low_days {
            return Vec::new();
        }

        let (Some(first), Some(last)) = (low_days.first(), low_days.last()) else {
            return Vec::new();
        };

        let severity = if reduction_percent > self.settings.warning_reduction_percent {
            Severity::Warning
        } else {
            Severity::Info
        };

        let finding = Finding {
            anomaly_type: AnomalyType::Shading,
            severity,
            affected_start: first.date,
            affected_end: last.date,
            description: format!(
                "{} days between {} and {} produced below {:.2} kWh; average {:.2} kWh is {:.1}% under the peak average of {:.2} kWh",
                low_days.len(),
                first.date,
                last.date,
                low_threshold,
                overall_avg,
                reduction_percent,
                peak_avg
            ),
            metadata: Default::default(),
        };

        vec![
            finding
                .with("peakProduction", stats::round2(peak_avg))
                .with("averageProduction", stats::round2(overall_avg))
                .with("reductionPercent", stats::round2(reduction_percent))
                .with("affectedDays", low_days.len()),
        ]
    }
}
