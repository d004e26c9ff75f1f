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

//! Detection orchestrator.
//!
//! A run for one unit has two phases:
//! 1. **Detect**: the profile and daily series are read once and every detector
//!    evaluates them concurrently on the blocking pool. Results are joined in
//!    detector order.
//! 2. **Persist**: findings are deduplicated against unresolved anomalies and
//!    created one at a time. Repository failures are counted, never propagated.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::detectors::{AnomalyDetector, default_detectors};
use crate::error::{DetectionError, RepositoryError, Result};
use crate::model::{DailyAggregate, Finding, NewAnomaly, UnitProfile};
use crate::settings::DetectionSettings;
use crate::traits::{AnomalyRepository, DailyAggregateSource, UnitProfileSource};

/// Counts reported by a single-unit detection run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub unit_id: String,
    /// Findings produced by all detectors
    pub detected: usize,
    /// New anomaly records persisted
    pub created: usize,
    /// Findings already covered by an unresolved anomaly
    pub skipped: usize,
    /// Findings lost to repository failures
    pub failed: usize,
}

impl DetectionSummary {
    fn empty(unit_id: &str) -> Self {
        Self {
            unit_id: unit_id.to_owned(),
            ..Self::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }
}

/// Result of one unit inside a batch run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UnitOutcome {
    Completed(DetectionSummary),
    /// Some findings could not be persisted
    Partial(DetectionSummary),
    DataUnavailable { unit_id: String, reason: String },
}

impl UnitOutcome {
    pub fn unit_id(&self) -> &str {
        match self {
            Self::Completed(summary) | Self::Partial(summary) => &summary.unit_id,
            Self::DataUnavailable { unit_id, .. } => unit_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub started_at: Option<DateTime<Utc>>,
    pub outcomes: Vec<UnitOutcome>,
}

impl BatchReport {
    pub fn total_created(&self) -> usize {
        self.summaries().map(|s| s.created).sum()
    }

    pub fn total_skipped(&self) -> usize {
        self.summaries().map(|s| s.skipped).sum()
    }

    pub fn units_failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, UnitOutcome::DataUnavailable { .. }))
            .count()
    }

    fn summaries(&self) -> impl Iterator<Item = &DetectionSummary> {
        self.outcomes.iter().filter_map(|o| match o {
            UnitOutcome::Completed(summary) | UnitOutcome::Partial(summary) => Some(summary),
            UnitOutcome::DataUnavailable { .. } => None,
        })
    }
}

/// Runs the detectors for a unit and persists new anomalies
pub struct DetectionOrchestrator {
    aggregates: Arc<dyn DailyAggregateSource>,
    profiles: Arc<dyn UnitProfileSource>,
    repository: Arc<dyn AnomalyRepository>,
    detectors: Vec<Arc<dyn AnomalyDetector>>,
    // Serializes runs for the same unit so check-then-create cannot interleave
    unit_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Handle on a unit's run lock; drops the map entry once no run holds it
struct UnitLease<'a> {
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    unit_id: String,
    lock: Arc<tokio::sync::Mutex<()>>,
}

impl Drop for UnitLease<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // One reference in the map plus this lease means no other run is waiting
        if Arc::strong_count(&self.lock) == 2
            && locks
                .get(&self.unit_id)
                .is_some_and(|held| Arc::ptr_eq(held, &self.lock))
        {
            locks.remove(&self.unit_id);
        }
    }
}

impl fmt::Debug for DetectionOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectionOrchestrator")
            .field("aggregates", &self.aggregates.name())
            .field("profiles", &self.profiles.name())
            .field("repository", &self.repository.name())
            .field(
                "detectors",
                &self.detectors.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl DetectionOrchestrator {
    /// Orchestrator with the four standard detectors
    pub fn new(
        aggregates: Arc<dyn DailyAggregateSource>,
        profiles: Arc<dyn UnitProfileSource>,
        repository: Arc<dyn AnomalyRepository>,
        settings: &DetectionSettings,
    ) -> Self {
        Self::with_detectors(aggregates, profiles, repository, default_detectors(settings))
    }

    pub fn with_detectors(
        aggregates: Arc<dyn DailyAggregateSource>,
        profiles: Arc<dyn UnitProfileSource>,
        repository: Arc<dyn AnomalyRepository>,
        detectors: Vec<Arc<dyn AnomalyDetector>>,
    ) -> Self {
        Self {
            aggregates,
            profiles,
            repository,
            detectors,
            unit_locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, unit_id: &str) -> UnitLease<'_> {
        let mut locks = self.unit_locks.lock();
        UnitLease {
            locks: &self.unit_locks,
            unit_id: unit_id.to_owned(),
            lock: Arc::clone(locks.entry(unit_id.to_owned()).or_default()),
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.unit_locks.lock().len()
    }

    /// Run detection for one unit.
    ///
    /// # Errors
    /// Returns `DetectionError::DataUnavailable` if the profile or the daily
    /// series cannot be read. Persistence failures only show up in the summary.
    pub async fn run_for_unit(&self, unit_id: &str) -> Result<DetectionSummary> {
        // Unknown units fail here and never get a lock entry
        let profile = self
            .profiles
            .unit_profile(unit_id)
            .await
            .map_err(|source| DetectionError::DataUnavailable {
                unit_id: unit_id.to_owned(),
                source,
            })?;

        let lease = self.lock_for(unit_id);
        let _guard = lease.lock.lock().await;

        let started_at = Utc::now();
        debug!(unit_id = %unit_id, "Starting anomaly detection run");

        let series = self
            .aggregates
            .daily_aggregates(unit_id)
            .await
            .map_err(|source| DetectionError::DataUnavailable {
                unit_id: unit_id.to_owned(),
                source,
            })?;

        if series.is_empty() {
            info!(unit_id = %unit_id, "No daily aggregates, skipping detection");
            return Ok(DetectionSummary::empty(unit_id));
        }

        let findings = self.detect(series, profile).await;

        let mut summary = DetectionSummary::empty(unit_id);
        summary.detected = findings.len();
        for finding in findings {
            self.persist(unit_id, finding, started_at, &mut summary).await;
        }

        info!(
            unit_id = %unit_id,
            detected = summary.detected,
            created = summary.created,
            skipped = summary.skipped,
            failed = summary.failed,
            "Anomaly detection run finished"
        );

        Ok(summary)
    }

    /// Fan the series out to every detector and join their findings in detector order
    async fn detect(&self, series: Vec<DailyAggregate>, profile: UnitProfile) -> Vec<Finding> {
        let series: Arc<[DailyAggregate]> = series.into();
        let profile = Arc::new(profile);

        let handles: Vec<_> = self
            .detectors
            .iter()
            .map(|detector| {
                let detector = Arc::clone(detector);
                let series = Arc::clone(&series);
                let profile = Arc::clone(&profile);
                tokio::task::spawn_blocking(move || detector.detect(&series, &profile))
            })
            .collect();

        let mut findings = Vec::new();
        for (detector, handle) in self.detectors.iter().zip(handles) {
            match handle.await {
                Ok(found) => {
                    debug!(
                        unit_id = %profile.unit_id,
                        detector = detector.name(),
                        findings = found.len(),
                        "Detector finished"
                    );
                    findings.extend(found);
                }
                Err(e) => {
                    warn!(
                        unit_id = %profile.unit_id,
                        detector = detector.name(),
                        "Detector task failed: {e}"
                    );
                }
            }
        }

        findings
    }

    async fn persist(
        &self,
        unit_id: &str,
        finding: Finding,
        detected_at: DateTime<Utc>,
        summary: &mut DetectionSummary,
    ) {
        match self
            .repository
            .find_unresolved(unit_id, finding.anomaly_type, finding.affected_start)
            .await
        {
            Ok(Some(existing)) => {
                debug!(
                    unit_id = %unit_id,
                    anomaly_type = %finding.anomaly_type,
                    start = %finding.affected_start,
                    existing_id = existing.id,
                    "Unresolved anomaly already recorded"
                );
                summary.skipped += 1;
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(
                    unit_id = %unit_id,
                    anomaly_type = %finding.anomaly_type,
                    start = %finding.affected_start,
                    "Failed to check for existing anomaly: {e}"
                );
                summary.failed += 1;
                return;
            }
        }

        let anomaly_type = finding.anomaly_type;
        let start = finding.affected_start;
        match self
            .repository
            .create(NewAnomaly::from_finding(unit_id, finding, detected_at))
            .await
        {
            Ok(record) => {
                debug!(
                    unit_id = %unit_id,
                    id = record.id,
                    anomaly_type = %record.anomaly_type,
                    severity = %record.severity,
                    "Anomaly recorded"
                );
                summary.created += 1;
            }
            Err(RepositoryError::Conflict) => {
                debug!(
                    unit_id = %unit_id,
                    anomaly_type = %anomaly_type,
                    start = %start,
                    "Anomaly created concurrently, skipping"
                );
                summary.skipped += 1;
            }
            Err(e) => {
                warn!(
                    unit_id = %unit_id,
                    anomaly_type = %anomaly_type,
                    start = %start,
                    "Failed to persist anomaly: {e}"
                );
                summary.failed += 1;
            }
        }
    }

    /// Run detection for each unit in turn; one unit's failure never stops the rest
    pub async fn run_for_units(&self, unit_ids: &[String]) -> BatchReport {
        let mut report = BatchReport {
            started_at: Some(Utc::now()),
            outcomes: Vec::with_capacity(unit_ids.len()),
        };

        for unit_id in unit_ids {
            let outcome = match self.run_for_unit(unit_id).await {
                Ok(summary) if summary.is_partial() => UnitOutcome::Partial(summary),
                Ok(summary) => UnitOutcome::Completed(summary),
                Err(e) => {
                    warn!(unit_id = %unit_id, "Anomaly detection skipped: {e}");
                    UnitOutcome::DataUnavailable {
                        unit_id: unit_id.clone(),
                        reason: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            units = report.outcomes.len(),
            created = report.total_created(),
            skipped = report.total_skipped(),
            units_failed = report.units_failed(),
            "Batch anomaly detection finished"
        );

        report
    }

    /// Run detection for every active unit
    ///
    /// # Errors
    /// Returns `DetectionError::DataUnavailable` if the active unit list cannot be read.
    pub async fn run_for_active_units(&self) -> Result<BatchReport> {
        let unit_ids = self.profiles.active_unit_ids().await.map_err(|source| {
            DetectionError::DataUnavailable {
                unit_id: "*".to_owned(),
                source,
            }
        })?;

        info!(units = unit_ids.len(), "Running anomaly detection for active units");
        Ok(self.run_for_units(&unit_ids).await)
    }
}
