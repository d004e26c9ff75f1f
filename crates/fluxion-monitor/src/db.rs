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

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, params};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

use fluxion_anomaly::{
    AnomalyQuery, AnomalyRecord, AnomalyRepository, AnomalyType, DailyAggregate,
    DailyAggregateSource, EnergyReading, Metadata, NewAnomaly, RepositoryError, Severity,
    SourceError, UnitProfile, UnitProfileSource,
};

#[derive(Debug)]
pub struct Database {
    conn: Mutex<rusqlite::Connection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitRecord {
    pub unit_id: String,
    pub name: Option<String>,
    pub capacity_kw: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Anomaly row as stored, before parsing
struct AnomalyRow {
    id: i64,
    unit_id: String,
    anomaly_type: String,
    severity: String,
    detected_at: String,
    affected_start: String,
    affected_end: String,
    description: String,
    resolved: bool,
    resolved_at: Option<String>,
    metadata: String,
}

const ANOMALY_COLUMNS: &str = "id, unit_id, anomaly_type, severity, detected_at, affected_start, \
     affected_end, description, resolved, resolved_at, metadata";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// All timestamps are stored as second-precision UTC so they sort as text
fn to_db_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("Invalid timestamp in database: {value}"))?
        .with_timezone(&Utc))
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .with_context(|| format!("Invalid date in database: {value}"))
}

fn map_anomaly_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AnomalyRow> {
    Ok(AnomalyRow {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        anomaly_type: row.get(2)?,
        severity: row.get(3)?,
        detected_at: row.get(4)?,
        affected_start: row.get(5)?,
        affected_end: row.get(6)?,
        description: row.get(7)?,
        resolved: row.get(8)?,
        resolved_at: row.get(9)?,
        metadata: row.get(10)?,
    })
}

impl TryFrom<AnomalyRow> for AnomalyRecord {
    type Error = anyhow::Error;

    fn try_from(row: AnomalyRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            unit_id: row.unit_id,
            anomaly_type: row.anomaly_type.parse::<AnomalyType>()?,
            severity: row.severity.parse::<Severity>()?,
            detected_at: parse_timestamp(&row.detected_at)?,
            affected_start: parse_date(&row.affected_start)?,
            affected_end: parse_date(&row.affected_end)?,
            description: row.description,
            resolved: row.resolved,
            resolved_at: row.resolved_at.as_deref().map(parse_timestamp).transpose()?,
            metadata: serde_json::from_str::<Metadata>(&row.metadata)
                .with_context(|| format!("Invalid metadata for anomaly {}", row.id))?,
        })
    }
}

/// `(unit_id, name, capacity_kw, active, created_at, updated_at)`
type UnitRow = (String, Option<String>, f64, bool, String, String);

fn map_unit_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UnitRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn unit_from_row(
    (unit_id, name, capacity_kw, active, created_at, updated_at): UnitRow,
) -> Result<UnitRecord> {
    Ok(UnitRecord {
        unit_id,
        name,
        capacity_kw,
        active,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

impl Database {
    pub fn open(path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(path).parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let conn = rusqlite::Connection::open(path)
            .with_context(|| format!("Failed to open database: {path}"))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS solar_units (
                unit_id        TEXT PRIMARY KEY,
                name           TEXT,
                capacity_kw    REAL NOT NULL,
                active         INTEGER NOT NULL DEFAULT 1,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS energy_readings (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                unit_id        TEXT NOT NULL,
                timestamp      TEXT NOT NULL,
                energy_kwh     REAL NOT NULL,
                FOREIGN KEY (unit_id) REFERENCES solar_units(unit_id)
            );

            CREATE INDEX IF NOT EXISTS idx_energy_readings_unit_time
                ON energy_readings(unit_id, timestamp);

            CREATE TABLE IF NOT EXISTS anomalies (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                unit_id        TEXT NOT NULL,
                anomaly_type   TEXT NOT NULL,
                severity       TEXT NOT NULL,
                detected_at    TEXT NOT NULL,
                affected_start TEXT NOT NULL,
                affected_end   TEXT NOT NULL,
                description    TEXT NOT NULL,
                resolved       INTEGER NOT NULL DEFAULT 0,
                resolved_at    TEXT,
                metadata       TEXT NOT NULL DEFAULT '{}',
                FOREIGN KEY (unit_id) REFERENCES solar_units(unit_id)
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_anomalies_unresolved_key
                ON anomalies(unit_id, anomaly_type, affected_start) WHERE resolved = 0;
            CREATE INDEX IF NOT EXISTS idx_anomalies_unit_detected
                ON anomalies(unit_id, detected_at DESC);",
        )
        .context("Failed to initialize database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Register a unit or update an existing one. `name` is kept when not given.
    pub fn upsert_unit(
        &self,
        unit_id: &str,
        name: Option<&str>,
        capacity_kw: f64,
        active: bool,
    ) -> Result<UnitRecord> {
        {
            let conn = self.conn.lock().expect("database mutex poisoned");
            let now = to_db_timestamp(&Utc::now());
            conn.execute(
                "INSERT INTO solar_units (unit_id, name, capacity_kw, active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?5)
                 ON CONFLICT(unit_id) DO UPDATE SET
                    name = COALESCE(?2, name),
                    capacity_kw = ?3,
                    active = ?4,
                    updated_at = ?5",
                params![unit_id, name, capacity_kw, active, now],
            )?;
        }

        self.get_unit(unit_id)?
            .with_context(|| format!("Unit {unit_id} missing after upsert"))
    }

    pub fn get_unit(&self, unit_id: &str) -> Result<Option<UnitRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let row = conn
            .query_row(
                "SELECT unit_id, name, capacity_kw, active, created_at, updated_at
                 FROM solar_units WHERE unit_id = ?1",
                params![unit_id],
                map_unit_row,
            )
            .optional()?;
        row.map(unit_from_row).transpose()
    }

    pub fn list_units(&self) -> Result<Vec<UnitRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT unit_id, name, capacity_kw, active, created_at, updated_at
             FROM solar_units ORDER BY unit_id",
        )?;
        let rows = stmt
            .query_map([], map_unit_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(unit_from_row).collect()
    }

    pub fn active_unit_ids(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt =
            conn.prepare("SELECT unit_id FROM solar_units WHERE active = 1 ORDER BY unit_id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Store readings in one transaction, returning how many were inserted
    pub fn insert_readings(&self, readings: &[EnergyReading]) -> Result<usize> {
        let mut conn = self.conn.lock().expect("database mutex poisoned");
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO energy_readings (unit_id, timestamp, energy_kwh) VALUES (?1, ?2, ?3)",
            )?;
            for reading in readings {
                stmt.execute(params![
                    reading.unit_id,
                    to_db_timestamp(&reading.timestamp),
                    reading.energy_kwh
                ])?;
            }
        }
        tx.commit()?;
        Ok(readings.len())
    }

    /// Readings summed per UTC day, ascending
    pub fn daily_aggregates(&self, unit_id: &str) -> Result<Vec<DailyAggregate>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT substr(timestamp, 1, 10) AS day, SUM(energy_kwh)
             FROM energy_readings
             WHERE unit_id = ?1
             GROUP BY day
             ORDER BY day ASC",
        )?;
        let rows = stmt
            .query_map(params![unit_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(day, total)| Ok(DailyAggregate::new(parse_date(&day)?, total)))
            .collect()
    }

    pub fn cleanup_old_readings(&self, retention_days: u32) -> Result<u64> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(retention_days));
        let deleted = conn.execute(
            "DELETE FROM energy_readings WHERE timestamp < ?1",
            params![to_db_timestamp(&cutoff)],
        )?;
        Ok(deleted as u64)
    }

    pub fn find_unresolved_anomaly(
        &self,
        unit_id: &str,
        anomaly_type: AnomalyType,
        affected_start: NaiveDate,
    ) -> Result<Option<AnomalyRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let row = conn
            .query_row(
                &format!(
                    "SELECT {ANOMALY_COLUMNS} FROM anomalies
                     WHERE unit_id = ?1 AND anomaly_type = ?2 AND affected_start = ?3 AND resolved = 0"
                ),
                params![
                    unit_id,
                    anomaly_type.as_str(),
                    affected_start.format(DATE_FORMAT).to_string()
                ],
                map_anomaly_row,
            )
            .optional()?;
        row.map(AnomalyRecord::try_from).transpose()
    }

    /// Insert an unresolved anomaly. Returns `None` when an unresolved anomaly
    /// with the same unit, type and start date already exists.
    pub fn insert_anomaly(&self, anomaly: &NewAnomaly) -> Result<Option<AnomalyRecord>> {
        let metadata = serde_json::to_string(&anomaly.metadata)?;
        let id = {
            let conn = self.conn.lock().expect("database mutex poisoned");
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO anomalies
                    (unit_id, anomaly_type, severity, detected_at, affected_start, affected_end,
                     description, resolved, metadata)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
                params![
                    anomaly.unit_id,
                    anomaly.anomaly_type.as_str(),
                    anomaly.severity.as_str(),
                    to_db_timestamp(&anomaly.detected_at),
                    anomaly.affected_start.format(DATE_FORMAT).to_string(),
                    anomaly.affected_end.format(DATE_FORMAT).to_string(),
                    anomaly.description,
                    metadata
                ],
            )?;
            if inserted == 0 {
                return Ok(None);
            }
            conn.last_insert_rowid()
        };

        self.get_anomaly(id)
    }

    pub fn get_anomaly(&self, id: i64) -> Result<Option<AnomalyRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let row = conn
            .query_row(
                &format!("SELECT {ANOMALY_COLUMNS} FROM anomalies WHERE id = ?1"),
                params![id],
                map_anomaly_row,
            )
            .optional()?;
        row.map(AnomalyRecord::try_from).transpose()
    }

    /// Anomalies matching the query, newest first
    pub fn list_anomalies(&self, query: &AnomalyQuery) -> Result<Vec<AnomalyRecord>> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let mut stmt = conn.prepare(&format!(
            "SELECT {ANOMALY_COLUMNS} FROM anomalies
             WHERE (?1 IS NULL OR unit_id = ?1)
               AND (?2 IS NULL OR anomaly_type = ?2)
               AND (?3 IS NULL OR resolved = ?3)
             ORDER BY detected_at DESC, id DESC"
        ))?;
        let rows = stmt
            .query_map(
                params![
                    query.unit_id,
                    query.anomaly_type.map(|t| t.as_str()),
                    query.resolved
                ],
                map_anomaly_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(AnomalyRecord::try_from).collect()
    }

    pub fn count_anomalies(&self, query: &AnomalyQuery) -> Result<u64> {
        let conn = self.conn.lock().expect("database mutex poisoned");
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM anomalies
             WHERE (?1 IS NULL OR unit_id = ?1)
               AND (?2 IS NULL OR anomaly_type = ?2)
               AND (?3 IS NULL OR resolved = ?3)",
            params![
                query.unit_id,
                query.anomaly_type.map(|t| t.as_str()),
                query.resolved
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Mark an anomaly resolved. A second call keeps the original `resolved_at`.
    /// Returns `None` if the anomaly does not exist.
    pub fn resolve_anomaly(&self, id: i64) -> Result<Option<AnomalyRecord>> {
        {
            let conn = self.conn.lock().expect("database mutex poisoned");
            conn.execute(
                "UPDATE anomalies SET resolved = 1, resolved_at = ?2 WHERE id = ?1 AND resolved = 0",
                params![id, to_db_timestamp(&Utc::now())],
            )?;
        }
        self.get_anomaly(id)
    }
}

fn source_unavailable(e: &anyhow::Error) -> SourceError {
    SourceError::Unavailable(format!("{e:#}"))
}

fn repository_unavailable(e: &anyhow::Error) -> RepositoryError {
    RepositoryError::Unavailable(format!("{e:#}"))
}

#[async_trait]
impl DailyAggregateSource for Database {
    async fn daily_aggregates(&self, unit_id: &str) -> Result<Vec<DailyAggregate>, SourceError> {
        if self
            .get_unit(unit_id)
            .map_err(|e| source_unavailable(&e))?
            .is_none()
        {
            return Err(SourceError::NotFound(unit_id.to_owned()));
        }
        Database::daily_aggregates(self, unit_id).map_err(|e| source_unavailable(&e))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[async_trait]
impl UnitProfileSource for Database {
    async fn unit_profile(&self, unit_id: &str) -> Result<UnitProfile, SourceError> {
        let unit = self
            .get_unit(unit_id)
            .map_err(|e| source_unavailable(&e))?
            .ok_or_else(|| SourceError::NotFound(unit_id.to_owned()))?;
        Ok(UnitProfile {
            unit_id: unit.unit_id,
            capacity_kw: unit.capacity_kw,
        })
    }

    async fn active_unit_ids(&self) -> Result<Vec<String>, SourceError> {
        Database::active_unit_ids(self).map_err(|e| source_unavailable(&e))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[async_trait]
impl AnomalyRepository for Database {
    async fn find_unresolved(
        &self,
        unit_id: &str,
        anomaly_type: AnomalyType,
        affected_start: NaiveDate,
    ) -> Result<Option<AnomalyRecord>, RepositoryError> {
        self.find_unresolved_anomaly(unit_id, anomaly_type, affected_start)
            .map_err(|e| repository_unavailable(&e))
    }

    async fn create(&self, anomaly: NewAnomaly) -> Result<AnomalyRecord, RepositoryError> {
        self.insert_anomaly(&anomaly)
            .map_err(|e| repository_unavailable(&e))?
            .ok_or(RepositoryError::Conflict)
    }

    async fn count(&self, query: &AnomalyQuery) -> Result<u64, RepositoryError> {
        self.count_anomalies(query)
            .map_err(|e| repository_unavailable(&e))
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fluxion_anomaly::{Finding, Severity};
    use tempfile::TempDir;

    fn reading(unit_id: &str, day: u32, hour: u32, energy_kwh: f64) -> EnergyReading {
        EnergyReading {
            unit_id: unit_id.to_owned(),
            timestamp: Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap(),
            energy_kwh,
        }
    }

    fn new_anomaly(unit_id: &str, day: u32) -> NewAnomaly {
        let date = NaiveDate::from_ymd_opt(2025, 6, day).unwrap();
        let finding = Finding::single_day(
            AnomalyType::Mechanical,
            Severity::Critical,
            date,
            "Production dropped to zero".to_owned(),
        )
        .with("dropPercentage", 100.0);
        NewAnomaly::from_finding(unit_id, finding, Utc::now())
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("monitor.db");

        let db = Database::open(path.to_str().unwrap()).unwrap();
        db.upsert_unit("unit-1", None, 5.0, true).unwrap();
        assert!(path.exists());

        // reopening keeps the data
        drop(db);
        let db = Database::open(path.to_str().unwrap()).unwrap();
        assert_eq!(db.list_units().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_unit_keeps_name_when_omitted() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_unit("unit-1", Some("Roof A"), 5.0, true).unwrap();
        let updated = db.upsert_unit("unit-1", None, 6.5, false).unwrap();

        assert_eq!(updated.name.as_deref(), Some("Roof A"));
        assert_eq!(updated.capacity_kw, 6.5);
        assert!(!updated.active);
        assert!(db.active_unit_ids().unwrap().is_empty());
    }

    #[test]
    fn test_daily_aggregates_group_by_utc_day() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_unit("unit-1", None, 5.0, true).unwrap();
        let inserted = db
            .insert_readings(&[
                reading("unit-1", 3, 9, 1.0),
                reading("unit-1", 1, 10, 2.0),
                reading("unit-1", 1, 15, 3.5),
                reading("unit-1", 3, 23, 0.5),
            ])
            .unwrap();
        assert_eq!(inserted, 4);

        let series = db.daily_aggregates("unit-1").unwrap();
        assert_eq!(
            series,
            vec![
                DailyAggregate::new(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(), 5.5),
                DailyAggregate::new(NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(), 1.5),
            ]
        );
    }

    #[test]
    fn test_unresolved_key_is_unique() {
        let db = Database::open_in_memory().unwrap();
        let first = db.insert_anomaly(&new_anomaly("unit-1", 4)).unwrap().unwrap();
        assert!(db.insert_anomaly(&new_anomaly("unit-1", 4)).unwrap().is_none());

        let resolved = db.resolve_anomaly(first.id).unwrap().unwrap();
        assert!(resolved.resolved);

        let second = db.insert_anomaly(&new_anomaly("unit-1", 4)).unwrap().unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(db.count_anomalies(&AnomalyQuery::default()).unwrap(), 2);
    }

    #[test]
    fn test_anomaly_round_trips_through_storage() {
        let db = Database::open_in_memory().unwrap();
        let anomaly = new_anomaly("unit-1", 4);
        let stored = db.insert_anomaly(&anomaly).unwrap().unwrap();

        assert_eq!(stored.anomaly_type, AnomalyType::Mechanical);
        assert_eq!(stored.severity, Severity::Critical);
        assert_eq!(stored.affected_start, anomaly.affected_start);
        assert_eq!(stored.metadata.get("dropPercentage"), Some(&serde_json::json!(100.0)));
        assert!(!stored.resolved);
        assert!(stored.resolved_at.is_none());

        let found = db
            .find_unresolved_anomaly("unit-1", AnomalyType::Mechanical, anomaly.affected_start)
            .unwrap();
        assert_eq!(found.map(|a| a.id), Some(stored.id));
    }

    #[test]
    fn test_resolve_twice_keeps_first_timestamp() {
        let db = Database::open_in_memory().unwrap();
        let stored = db.insert_anomaly(&new_anomaly("unit-1", 4)).unwrap().unwrap();

        let first = db.resolve_anomaly(stored.id).unwrap().unwrap();
        let second = db.resolve_anomaly(stored.id).unwrap().unwrap();
        assert!(first.resolved_at.is_some());
        assert_eq!(first.resolved_at, second.resolved_at);
        assert!(db.resolve_anomaly(9999).unwrap().is_none());
    }

    #[test]
    fn test_list_and_count_filters() {
        let db = Database::open_in_memory().unwrap();
        db.insert_anomaly(&new_anomaly("unit-1", 1)).unwrap();
        let second = db.insert_anomaly(&new_anomaly("unit-1", 2)).unwrap().unwrap();
        db.insert_anomaly(&new_anomaly("unit-2", 1)).unwrap();
        db.resolve_anomaly(second.id).unwrap();

        let unit_one = AnomalyQuery::for_unit("unit-1");
        assert_eq!(db.list_anomalies(&unit_one).unwrap().len(), 2);
        assert_eq!(db.count_anomalies(&unit_one.clone().unresolved()).unwrap(), 1);

        let by_type = AnomalyQuery {
            anomaly_type: Some(AnomalyType::Shading),
            ..AnomalyQuery::default()
        };
        assert_eq!(db.count_anomalies(&by_type).unwrap(), 0);

        let resolved = AnomalyQuery {
            resolved: Some(true),
            ..AnomalyQuery::default()
        };
        let listed = db.list_anomalies(&resolved).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, second.id);
    }

    #[test]
    fn test_cleanup_old_readings() {
        let db = Database::open_in_memory().unwrap();
        let recent = EnergyReading {
            unit_id: "unit-1".to_owned(),
            timestamp: Utc::now(),
            energy_kwh: 1.0,
        };
        db.insert_readings(&[reading("unit-1", 1, 12, 4.0), recent])
            .unwrap();

        let deleted = db.cleanup_old_readings(30).unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.daily_aggregates("unit-1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_trait_boundary_errors() {
        let db = Database::open_in_memory().unwrap();
        assert!(matches!(
            db.unit_profile("ghost").await,
            Err(SourceError::NotFound(_))
        ));
        assert!(matches!(
            DailyAggregateSource::daily_aggregates(&db, "ghost").await,
            Err(SourceError::NotFound(_))
        ));

        db.create(new_anomaly("unit-1", 4)).await.unwrap();
        assert!(matches!(
            db.create(new_anomaly("unit-1", 4)).await,
            Err(RepositoryError::Conflict)
        ));
    }
}
