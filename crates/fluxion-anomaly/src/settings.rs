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

//! Tunable thresholds for the detectors.
//!
//! Every field has a serde default so a deployment only lists what it overrides.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSettings {
    #[serde(default)]
    pub mechanical: MechanicalSettings,
    #[serde(default)]
    pub temperature: TemperatureSettings,
    #[serde(default)]
    pub shading: ShadingSettings,
    #[serde(default)]
    pub sensor: SensorSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MechanicalSettings {
    /// A zero day is critical when the previous day exceeded this fraction of the average
    #[serde(default = "default_zero_drop_avg_ratio")]
    pub zero_drop_avg_ratio: f64,

    /// A day below this fraction of the previous day counts as a drop
    #[serde(default = "default_drop_prev_ratio")]
    pub drop_prev_ratio: f64,

    /// ...but only if it is also below this fraction of the average
    #[serde(default = "default_drop_avg_ratio")]
    pub drop_avg_ratio: f64,

    #[serde(default = "default_critical_drop_percent")]
    pub critical_drop_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureSettings {
    /// Size of the trailing window
    #[serde(default = "default_temperature_min_days")]
    pub min_days: usize,

    /// Assumed full-output hours per day
    #[serde(default = "default_daylight_hours")]
    pub daylight_hours: f64,

    #[serde(default = "default_efficiency_ratio")]
    pub efficiency_ratio: f64,

    #[serde(default = "default_warning_efficiency_percent")]
    pub warning_efficiency_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShadingSettings {
    #[serde(default = "default_shading_min_days")]
    pub min_days: usize,

    /// Number of best days used as the unobstructed baseline
    #[serde(default = "default_peak_days")]
    pub peak_days: usize,

    #[serde(default = "default_reduction_ratio")]
    pub reduction_ratio: f64,

    #[serde(default = "default_low_day_ratio")]
    pub low_day_ratio: f64,

    #[serde(default = "default_min_low_days")]
    pub min_low_days: usize,

    #[serde(default = "default_warning_reduction_percent")]
    pub warning_reduction_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default = "default_sensor_min_days")]
    pub min_days: usize,

    /// Theoretical maximum is capacity times these hours
    #[serde(default = "default_max_daily_hours")]
    pub max_daily_hours: f64,

    #[serde(default = "default_overshoot_tolerance")]
    pub overshoot_tolerance: f64,

    #[serde(default = "default_iqr_multiplier")]
    pub iqr_multiplier: f64,
}

fn default_zero_drop_avg_ratio() -> f64 {
    0.3
}

fn default_drop_prev_ratio() -> f64 {
    0.3
}

fn default_drop_avg_ratio() -> f64 {
    0.5
}

fn default_critical_drop_percent() -> f64 {
    80.0
}

fn default_temperature_min_days() -> usize {
    7
}

fn default_daylight_hours() -> f64 {
    8.0
}

fn default_efficiency_ratio() -> f64 {
    0.6
}

fn default_warning_efficiency_percent() -> f64 {
    40.0
}

fn default_shading_min_days() -> usize {
    5
}

fn default_peak_days() -> usize {
    3
}

fn default_reduction_ratio() -> f64 {
    0.7
}

fn default_low_day_ratio() -> f64 {
    0.75
}

fn default_min_low_days() -> usize {
    3
}

fn default_warning_reduction_percent() -> f64 {
    40.0
}

fn default_sensor_min_days() -> usize {
    3
}

fn default_max_daily_hours() -> f64 {
    10.0
}

fn default_overshoot_tolerance() -> f64 {
    1.2
}

fn default_iqr_multiplier() -> f64 {
    1.5
}

impl Default for MechanicalSettings {
    fn default() -> Self {
        Self {
            zero_drop_avg_ratio: default_zero_drop_avg_ratio(),
            drop_prev_ratio: default_drop_prev_ratio(),
            drop_avg_ratio: default_drop_avg_ratio(),
            critical_drop_percent: default_critical_drop_percent(),
        }
    }
}

impl Default for TemperatureSettings {
    fn default() -> Self {
        Self {
            min_days: default_temperature_min_days(),
            daylight_hours: default_daylight_hours(),
            efficiency_ratio: default_efficiency_ratio(),
            warning_efficiency_percent: default_warning_efficiency_percent(),
        }
    }
}

impl Default for ShadingSettings {
    fn default() -> Self {
        Self {
            min_days: default_shading_min_days(),
            peak_days: default_peak_days(),
            reduction_ratio: default_reduction_ratio(),
            low_day_ratio: default_low_day_ratio(),
            min_low_days: default_min_low_days(),
            warning_reduction_percent: default_warning_reduction_percent(),
        }
    }
}

impl Default for SensorSettings {
    fn default() -> Self {
        Self {
            min_days: default_sensor_min_days(),
            max_daily_hours: default_max_daily_hours(),
            overshoot_tolerance: default_overshoot_tolerance(),
            iqr_multiplier: default_iqr_multiplier(),
        }
    }
}

impl DetectionSettings {
    /// Reject thresholds the detectors cannot work with.
    ///
    /// Returns a list of human-readable problems, empty when valid.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        let positive = [
            ("mechanical.zero_drop_avg_ratio", self.mechanical.zero_drop_avg_ratio),
            ("mechanical.drop_prev_ratio", self.mechanical.drop_prev_ratio),
            ("mechanical.drop_avg_ratio", self.mechanical.drop_avg_ratio),
            ("mechanical.critical_drop_percent", self.mechanical.critical_drop_percent),
            ("temperature.daylight_hours", self.temperature.daylight_hours),
            ("temperature.efficiency_ratio", self.temperature.efficiency_ratio),
            ("shading.reduction_ratio", self.shading.reduction_ratio),
            ("shading.low_day_ratio", self.shading.low_day_ratio),
            ("sensor.max_daily_hours", self.sensor.max_daily_hours),
            ("sensor.overshoot_tolerance", self.sensor.overshoot_tolerance),
            ("sensor.iqr_multiplier", self.sensor.iqr_multiplier),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                problems.push(format!("detection.{field} must be a positive number (got {value})"));
            }
        }

        let counts = [
            ("temperature.min_days", self.temperature.min_days),
            ("shading.min_days", self.shading.min_days),
            ("shading.peak_days", self.shading.peak_days),
            ("shading.min_low_days", self.shading.min_low_days),
            ("sensor.min_days", self.sensor.min_days),
        ];
        for (field, value) in counts {
            if value == 0 {
                problems.push(format!("detection.{field} must be at least 1"));
            }
        }

        if self.shading.peak_days > self.shading.min_days {
            problems.push(format!(
                "detection.shading.peak_days ({}) cannot exceed detection.shading.min_days ({})",
                self.shading.peak_days, self.shading.min_days
            ));
        }

        problems
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = DetectionSettings::default();
        assert!(settings.validate().is_empty());
        assert_eq!(settings.temperature.min_days, 7);
        assert_eq!(settings.shading.min_days, 5);
        assert_eq!(settings.sensor.min_days, 3);
        assert_eq!(settings.sensor.iqr_multiplier, 1.5);
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let settings: DetectionSettings =
            serde_json::from_str(r#"{"shading": {"min_low_days": 4}}"#).unwrap();
        assert_eq!(settings.shading.min_low_days, 4);
        assert_eq!(settings.shading.low_day_ratio, 0.75);
        assert_eq!(settings.mechanical, MechanicalSettings::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = DetectionSettings::default();
        settings.sensor.max_daily_hours = 0.0;
        settings.temperature.min_days = 0;
        settings.shading.peak_days = 6;

        let problems = settings.validate();
        assert_eq!(problems.len(), 3);
        assert!(problems.iter().any(|p| p.contains("sensor.max_daily_hours")));
        assert!(problems.iter().any(|p| p.contains("temperature.min_days")));
        assert!(problems.iter().any(|p| p.contains("peak_days")));
    }
}
