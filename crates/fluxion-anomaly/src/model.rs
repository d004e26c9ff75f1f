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

//! Domain types shared by the detectors, the orchestrator and the stores.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// Detector evidence attached to every finding and anomaly record.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Total energy a unit produced on one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    pub date: NaiveDate,

    /// Sum of all interval readings for the day (kWh)
    pub total_energy_kwh: f64,
}

impl DailyAggregate {
    pub fn new(date: NaiveDate, total_energy_kwh: f64) -> Self {
        Self {
            date,
            total_energy_kwh,
        }
    }
}

/// Static profile of a solar unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitProfile {
    pub unit_id: String,

    /// Rated capacity (kW)
    pub capacity_kw: f64,
}

/// Raw interval reading as reported by a unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnergyReading {
    pub unit_id: String,
    pub timestamp: DateTime<Utc>,
    pub energy_kwh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    Mechanical,
    Temperature,
    Shading,
    SensorError,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mechanical => "MECHANICAL",
            Self::Temperature => "TEMPERATURE",
            Self::Shading => "SHADING",
            Self::SensorError => "SENSOR_ERROR",
        }
    }

    pub fn all() -> &'static [AnomalyType] {
        &[
            Self::Mechanical,
            Self::Temperature,
            Self::Shading,
            Self::SensorError,
        ]
    }
}

impl fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnomalyType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::AnomalyType(s.to_owned()))
    }
}

/// Operational urgency of an anomaly. Ordered so that `Info < Warning < Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INFO" => Ok(Self::Info),
            "WARNING" => Ok(Self::Warning),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(ParseError::Severity(s.to_owned())),
        }
    }
}

/// Candidate anomaly produced by a detector, before dedup and persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub affected_start: NaiveDate,
    pub affected_end: NaiveDate,
    pub description: String,
    pub metadata: Metadata,
}

impl Finding {
    /// Finding covering a single day
    pub fn single_day(
        anomaly_type: AnomalyType,
        severity: Severity,
        date: NaiveDate,
        description: String,
    ) -> Self {
        Self {
            anomaly_type,
            severity,
            affected_start: date,
            affected_end: date,
            description,
            metadata: Metadata::new(),
        }
    }

    /// Attach one piece of evidence
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_owned(), value.into());
        self
    }

    /// Numeric metadata value, if present
    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(serde_json::Value::as_f64)
    }
}

/// Everything needed to persist a new anomaly record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnomaly {
    pub unit_id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub affected_start: NaiveDate,
    pub affected_end: NaiveDate,
    pub description: String,
    pub metadata: Metadata,
}

impl NewAnomaly {
    pub fn from_finding(unit_id: &str, finding: Finding, detected_at: DateTime<Utc>) -> Self {
        Self {
            unit_id: unit_id.to_owned(),
            anomaly_type: finding.anomaly_type,
            severity: finding.severity,
            detected_at,
            affected_start: finding.affected_start,
            affected_end: finding.affected_end,
            description: finding.description,
            metadata: finding.metadata,
        }
    }
}

/// Persisted anomaly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub id: i64,
    pub unit_id: String,
    pub anomaly_type: AnomalyType,
    pub severity: Severity,
    pub detected_at: DateTime<Utc>,
    pub affected_start: NaiveDate,
    pub affected_end: NaiveDate,
    pub description: String,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl AnomalyRecord {
    pub fn from_new(id: i64, anomaly: NewAnomaly) -> Self {
        Self {
            id,
            unit_id: anomaly.unit_id,
            anomaly_type: anomaly.anomaly_type,
            severity: anomaly.severity,
            detected_at: anomaly.detected_at,
            affected_start: anomaly.affected_start,
            affected_end: anomaly.affected_end,
            description: anomaly.description,
            resolved: false,
            resolved_at: None,
            metadata: anomaly.metadata,
        }
    }
}

/// Filter used by anomaly listing and counting. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnomalyQuery {
    #[serde(default)]
    pub unit_id: Option<String>,
    #[serde(default)]
    pub anomaly_type: Option<AnomalyType>,
    #[serde(default)]
    pub resolved: Option<bool>,
}

impl AnomalyQuery {
    pub fn for_unit(unit_id: &str) -> Self {
        Self {
            unit_id: Some(unit_id.to_owned()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn unresolved(mut self) -> Self {
        self.resolved = Some(false);
        self
    }

    pub fn matches(&self, record: &AnomalyRecord) -> bool {
        self.unit_id.as_deref().is_none_or(|id| id == record.unit_id)
            && self.anomaly_type.is_none_or(|t| t == record.anomaly_type)
            && self.resolved.is_none_or(|r| r == record.resolved)
    }
}

/// Sum raw readings into one aggregate per calendar day (UTC), ascending by date.
///
/// Days without readings are left out rather than zero-filled.
pub fn aggregate_daily(readings: &[EnergyReading]) -> Vec<DailyAggregate> {
    let mut per_day: HashMap<NaiveDate, f64> = HashMap::new();
    for reading in readings {
        *per_day.entry(reading.timestamp.date_naive()).or_insert(0.0) += reading.energy_kwh;
    }

    let mut aggregates: Vec<DailyAggregate> = per_day
        .into_iter()
        .map(|(date, total)| DailyAggregate::new(date, total))
        .collect();
    aggregates.sort_by_key(|a| a.date);
    aggregates
}
