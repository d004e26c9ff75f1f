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

use anyhow::{Context, Result, bail};
use fluxion_anomaly::DetectionSettings;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub schedule: ScheduleSettings,
    #[serde(default)]
    pub detection: DetectionSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_db_path")]
    pub path: String,
    #[serde(default = "default_reading_retention_days")]
    pub reading_retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleSettings {
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,
    /// Hour of day (UTC) at which the nightly batch runs
    #[serde(default = "default_run_at_hour_utc")]
    pub run_at_hour_utc: u32,
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_owned()
}

fn default_port() -> u16 {
    8110
}

fn default_db_path() -> String {
    "./data/fluxion-monitor.db".to_owned()
}

fn default_reading_retention_days() -> u32 {
    400
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_run_at_hour_utc() -> u32 {
    2
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            server: ServerSettings::default(),
            database: DatabaseSettings::default(),
            schedule: ScheduleSettings::default(),
            detection: DetectionSettings::default(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            reading_retention_days: default_reading_retention_days(),
        }
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            run_at_hour_utc: default_run_at_hour_utc(),
        }
    }
}

impl MonitorConfig {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(Path::new(path))
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.server.bind_address.is_empty() {
            bail!("server.bind_address must be set");
        }
        if self.database.path.is_empty() {
            bail!("database.path must be set");
        }
        if self.database.reading_retention_days == 0 {
            bail!("database.reading_retention_days must be at least 1");
        }
        if self.schedule.run_at_hour_utc > 23 {
            bail!(
                "schedule.run_at_hour_utc must be between 0 and 23 (got {})",
                self.schedule.run_at_hour_utc
            );
        }
        let problems = self.detection.validate();
        if !problems.is_empty() {
            bail!("invalid detection settings: {}", problems.join("; "));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MonitorConfig::from_toml("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.server.port, 8110);
        assert_eq!(config.database.path, "./data/fluxion-monitor.db");
        assert_eq!(config.database.reading_retention_days, 400);
        assert!(config.schedule.enabled);
        assert_eq!(config.schedule.run_at_hour_utc, 2);
        assert_eq!(config.detection, DetectionSettings::default());
    }

    #[test]
    fn test_partial_detection_override() {
        let config = MonitorConfig::from_toml(
            r#"
            [server]
            port = 9000

            [detection.sensor]
            max_daily_hours = 12.0
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.detection.sensor.max_daily_hours, 12.0);
        assert_eq!(config.detection.sensor.iqr_multiplier, 1.5);
        assert_eq!(config.detection.shading.min_days, 5);
    }

    #[test]
    fn test_invalid_hour_rejected() {
        let err = MonitorConfig::from_toml("[schedule]\nrun_at_hour_utc = 24\n").unwrap_err();
        assert!(err.to_string().contains("run_at_hour_utc"));
    }

    #[test]
    fn test_invalid_detection_settings_rejected() {
        let err = MonitorConfig::from_toml("[detection.shading]\npeak_days = 9\n").unwrap_err();
        assert!(err.to_string().contains("invalid detection settings"));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "log_level = \"debug\"\n[database]\npath = \"/tmp/m.db\"").unwrap();

        let config = MonitorConfig::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.database.path, "/tmp/m.db");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = MonitorConfig::from_file("/nonexistent/fluxion-monitor.toml").unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
