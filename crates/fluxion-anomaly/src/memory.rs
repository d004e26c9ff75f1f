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

//! In-memory store implementing all three collaborator traits.
//!
//! Used by tests and by embedders that do not need persistence.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::{RepositoryError, SourceError};
use crate::model::{
    AnomalyQuery, AnomalyRecord, AnomalyType, DailyAggregate, EnergyReading, NewAnomaly,
    UnitProfile, aggregate_daily,
};
use crate::traits::{AnomalyRepository, DailyAggregateSource, UnitProfileSource};

#[derive(Debug, Clone)]
struct UnitEntry {
    profile: UnitProfile,
    active: bool,
}

#[derive(Debug, Default)]
struct Inner {
    units: BTreeMap<String, UnitEntry>,
    readings: BTreeMap<String, Vec<EnergyReading>>,
    anomalies: Vec<AnomalyRecord>,
    next_id: i64,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a unit
    pub fn add_unit(&self, unit_id: &str, capacity_kw: f64, active: bool) {
        self.inner.write().units.insert(
            unit_id.to_owned(),
            UnitEntry {
                profile: UnitProfile {
                    unit_id: unit_id.to_owned(),
                    capacity_kw,
                },
                active,
            },
        );
    }

    /// Append readings, returning how many were stored
    pub fn add_readings(&self, readings: impl IntoIterator<Item = EnergyReading>) -> usize {
        let mut inner = self.inner.write();
        let mut added = 0;
        for reading in readings {
            inner
                .readings
                .entry(reading.unit_id.clone())
                .or_default()
                .push(reading);
            added += 1;
        }
        added
    }

    /// Mark an anomaly resolved. Resolving twice keeps the first timestamp.
    ///
    /// # Errors
    /// `RepositoryError::NotFound` if no anomaly has this id.
    pub fn resolve(&self, id: i64) -> Result<AnomalyRecord, RepositoryError> {
        let mut inner = self.inner.write();
        let record = inner
            .anomalies
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        if !record.resolved {
            record.resolved = true;
            record.resolved_at = Some(Utc::now());
        }
        Ok(record.clone())
    }

    /// Anomalies matching the query, newest first
    pub fn list(&self, query: &AnomalyQuery) -> Vec<AnomalyRecord> {
        let inner = self.inner.read();
        let mut records: Vec<AnomalyRecord> = inner
            .anomalies
            .iter()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.detected_at.cmp(&a.detected_at).then(b.id.cmp(&a.id)));
        records
    }
}

#[async_trait]
impl DailyAggregateSource for InMemoryStore {
    async fn daily_aggregates(&self, unit_id: &str) -> Result<Vec<DailyAggregate>, SourceError> {
        let inner = self.inner.read();
        if !inner.units.contains_key(unit_id) {
            return Err(SourceError::NotFound(unit_id.to_owned()));
        }
        Ok(inner
            .readings
            .get(unit_id)
            .map(|readings| aggregate_daily(readings))
            .unwrap_or_default())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl UnitProfileSource for InMemoryStore {
    async fn unit_profile(&self, unit_id: &str) -> Result<UnitProfile, SourceError> {
        self.inner
            .read()
            .units
            .get(unit_id)
            .map(|entry| entry.profile.clone())
            .ok_or_else(|| SourceError::NotFound(unit_id.to_owned()))
    }

    async fn active_unit_ids(&self) -> Result<Vec<String>, SourceError> {
        Ok(self
            .inner
            .read()
            .units
            .iter()
            .filter(|(_, entry)| entry.active)
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[async_trait]
impl AnomalyRepository for InMemoryStore {
    async fn find_unresolved(
        &self,
        unit_id: &str,
        anomaly_type: AnomalyType,
        affected_start: NaiveDate,
    ) -> Result<Option<AnomalyRecord>, RepositoryError> {
        Ok(self
            .inner
            .read()
            .anomalies
            .iter()
            .find(|a| {
                !a.resolved
                    && a.unit_id == unit_id
                    && a.anomaly_type == anomaly_type
                    && a.affected_start == affected_start
            })
            .cloned())
    }

    async fn create(&self, anomaly: NewAnomaly) -> Result<AnomalyRecord, RepositoryError> {
        let mut inner = self.inner.write();
        let duplicate = inner.anomalies.iter().any(|a| {
            !a.resolved
                && a.unit_id == anomaly.unit_id
                && a.anomaly_type == anomaly.anomaly_type
                && a.affected_start == anomaly.affected_start
        });
        if duplicate {
            return Err(RepositoryError::Conflict);
        }

        inner.next_id += 1;
        let record = AnomalyRecord::from_new(inner.next_id, anomaly);
        inner.anomalies.push(record.clone());
        Ok(record)
    }

    async fn count(&self, query: &AnomalyQuery) -> Result<u64, RepositoryError> {
        let inner = self.inner.read();
        Ok(inner.anomalies.iter().filter(|a| query.matches(a)).count() as u64)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
