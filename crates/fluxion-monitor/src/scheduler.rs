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

//! Nightly batch detection.
//!
//! Once a day at the configured UTC hour every active unit is checked, then
//! readings past the retention window are deleted.

use chrono::{DateTime, Days, NaiveTime, Utc};
use fluxion_anomaly::{BatchReport, DetectionError, DetectionOrchestrator};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use crate::config::ScheduleSettings;
use crate::db::Database;

/// First instant strictly after `now` that falls on `hour:00:00` UTC
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(time).and_utc();
    if today > now {
        today
    } else {
        let tomorrow = now
            .date_naive()
            .checked_add_days(Days::new(1))
            .unwrap_or(now.date_naive());
        tomorrow.and_time(time).and_utc()
    }
}

/// One nightly cycle: batch detection over active units, then reading cleanup.
///
/// # Errors
/// Returns `DetectionError::DataUnavailable` if the active unit list cannot be read.
/// A failed cleanup is only logged.
pub async fn run_cycle(
    orchestrator: &DetectionOrchestrator,
    db: &Database,
    reading_retention_days: u32,
) -> Result<BatchReport, DetectionError> {
    let report = orchestrator.run_for_active_units().await?;

    match db.cleanup_old_readings(reading_retention_days) {
        Ok(0) => {}
        Ok(deleted) => info!(deleted, "Removed readings past retention"),
        Err(e) => warn!("Reading cleanup failed: {e:#}"),
    }

    Ok(report)
}

#[derive(Debug)]
pub struct NightlyScheduler {
    orchestrator: Arc<DetectionOrchestrator>,
    db: Arc<Database>,
    settings: ScheduleSettings,
    reading_retention_days: u32,
}

impl NightlyScheduler {
    pub fn new(
        orchestrator: Arc<DetectionOrchestrator>,
        db: Arc<Database>,
        settings: ScheduleSettings,
        reading_retention_days: u32,
    ) -> Self {
        Self {
            orchestrator,
            db,
            settings,
            reading_retention_days,
        }
    }

    /// Run until `shutdown` is notified. Failed cycles are logged and the loop continues.
    pub async fn run(self, shutdown: Arc<Notify>) {
        if !self.settings.enabled {
            info!("Nightly detection disabled");
            return;
        }

        loop {
            let now = Utc::now();
            let next = next_run_after(now, self.settings.run_at_hour_utc);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "Next nightly anomaly detection scheduled");

            tokio::select! {
                () = shutdown.notified() => {
                    info!("Nightly scheduler stopping");
                    break;
                }
                () = tokio::time::sleep(wait) => {
                    match run_cycle(&self.orchestrator, &self.db, self.reading_retention_days).await {
                        Ok(report) => info!(
                            units = report.outcomes.len(),
                            created = report.total_created(),
                            units_failed = report.units_failed(),
                            "Nightly anomaly detection complete"
                        ),
                        Err(e) => error!("Nightly anomaly detection failed: {e}"),
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fluxion_anomaly::{DetectionSettings, EnergyReading, UnitOutcome};

    #[test]
    fn test_next_run_later_today() {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 1, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, 2),
            Utc.with_ymd_and_hms(2025, 6, 1, 2, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_run_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 6, 30, 2, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, 2),
            Utc.with_ymd_and_hms(2025, 7, 1, 2, 0, 0).unwrap()
        );

        let late = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(
            next_run_after(late, 0),
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
        );
    }

    fn orchestrator_for(db: &Arc<Database>) -> DetectionOrchestrator {
        DetectionOrchestrator::new(
            db.clone(),
            db.clone(),
            db.clone(),
            &DetectionSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_run_cycle_detects_and_cleans_up() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.upsert_unit("unit-1", None, 5.0, true).unwrap();

        let today = Utc::now().date_naive();
        let readings: Vec<EnergyReading> = [10.0, 10.0, 10.0, 10.0, 0.0]
            .iter()
            .enumerate()
            .map(|(i, energy_kwh)| EnergyReading {
                unit_id: "unit-1".to_owned(),
                timestamp: (today - Days::new(5 - i as u64))
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
                    .and_utc(),
                energy_kwh: *energy_kwh,
            })
            .collect();
        db.insert_readings(&readings).unwrap();
        db.insert_readings(&[EnergyReading {
            unit_id: "unit-1".to_owned(),
            timestamp: Utc.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap(),
            energy_kwh: 3.0,
        }])
        .unwrap();

        let orchestrator = orchestrator_for(&db);
        let report = run_cycle(&orchestrator, &db, 400).await.unwrap();

        assert_eq!(report.outcomes.len(), 1);
        assert!(matches!(report.outcomes[0], UnitOutcome::Completed(_)));
        assert!(report.total_created() >= 1);
        // the 2020 reading is past retention
        assert_eq!(db.daily_aggregates("unit-1").unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns_immediately() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = NightlyScheduler::new(
            Arc::new(orchestrator_for(&db)),
            db,
            ScheduleSettings {
                enabled: false,
                run_at_hour_utc: 2,
            },
            400,
        );
        scheduler.run(Arc::new(Notify::new())).await;
    }

    #[tokio::test]
    async fn test_scheduler_stops_on_shutdown() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let scheduler = NightlyScheduler::new(
            Arc::new(orchestrator_for(&db)),
            db,
            ScheduleSettings::default(),
            400,
        );
        let shutdown = Arc::new(Notify::new());
        let handle = tokio::spawn(scheduler.run(shutdown.clone()));

        shutdown.notify_one();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
