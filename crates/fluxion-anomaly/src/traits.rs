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

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{RepositoryError, SourceError};
use crate::model::{AnomalyQuery, AnomalyRecord, AnomalyType, DailyAggregate, NewAnomaly, UnitProfile};

// ============= Collaborators consumed by the orchestrator =============

/// Time-series store producing per-day energy totals
#[async_trait]
pub trait DailyAggregateSource: Send + Sync {
    /// Daily totals for a unit, ascending by date, one entry per day with readings
    async fn daily_aggregates(&self, unit_id: &str) -> Result<Vec<DailyAggregate>, SourceError>;

    /// Get the name of this source
    fn name(&self) -> &str;
}

/// Registry of solar units and their static profiles
#[async_trait]
pub trait UnitProfileSource: Send + Sync {
    /// Profile of a unit; fails with `SourceError::NotFound` for unknown units
    async fn unit_profile(&self, unit_id: &str) -> Result<UnitProfile, SourceError>;

    /// Units covered by batch detection runs
    async fn active_unit_ids(&self) -> Result<Vec<String>, SourceError>;

    fn name(&self) -> &str;
}

/// Persistent store of anomaly records
#[async_trait]
pub trait AnomalyRepository: Send + Sync {
    /// Unresolved anomaly with the given key, if one exists
    async fn find_unresolved(
        &self,
        unit_id: &str,
        anomaly_type: AnomalyType,
        affected_start: NaiveDate,
    ) -> Result<Option<AnomalyRecord>, RepositoryError>;

    /// Persist a new unresolved anomaly.
    ///
    /// Stores that enforce the unresolved-key invariant return
    /// `RepositoryError::Conflict` when a concurrent writer got there first.
    async fn create(&self, anomaly: NewAnomaly) -> Result<AnomalyRecord, RepositoryError>;

    async fn count(&self, query: &AnomalyQuery) -> Result<u64, RepositoryError>;

    fn name(&self) -> &str;
}
