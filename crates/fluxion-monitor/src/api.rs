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

//! JSON HTTP API for unit registration, reading ingestion, detection runs and
//! anomaly review.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use fluxion_anomaly::{
    AnomalyQuery, AnomalyRecord, BatchReport, DailyAggregate, DetectionOrchestrator,
    DetectionSummary, EnergyReading,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::db::{Database, UnitRecord};

/// Shared state for API handlers
#[derive(Debug, Clone)]
pub struct ApiState {
    pub db: Arc<Database>,
    pub orchestrator: Arc<DetectionOrchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUnitRequest {
    pub unit_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub capacity_kw: f64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ReadingInput {
    pub timestamp: DateTime<Utc>,
    pub energy_kwh: f64,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub readings: Vec<ReadingInput>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub inserted: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CountResponse {
    pub count: u64,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/units", get(list_units_handler).post(register_unit_handler))
        .route("/api/units/{unit_id}/readings", post(ingest_readings_handler))
        .route("/api/units/{unit_id}/daily", get(daily_aggregates_handler))
        .route("/api/units/{unit_id}/detect", post(detect_unit_handler))
        .route("/api/detect", post(detect_all_handler))
        .route("/api/anomalies", get(list_anomalies_handler))
        .route("/api/anomalies/count", get(count_anomalies_handler))
        .route("/api/anomalies/{id}/resolve", post(resolve_anomaly_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn register_unit_handler(
    State(state): State<ApiState>,
    Json(request): Json<RegisterUnitRequest>,
) -> Result<Json<UnitRecord>, StatusCode> {
    if request.unit_id.trim().is_empty()
        || !(request.capacity_kw.is_finite() && request.capacity_kw > 0.0)
    {
        return Err(StatusCode::BAD_REQUEST);
    }

    let unit = state
        .db
        .upsert_unit(
            &request.unit_id,
            request.name.as_deref(),
            request.capacity_kw,
            request.active,
        )
        .map_err(|e| {
            error!(unit_id = %request.unit_id, "Failed to register unit: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    info!(unit_id = %unit.unit_id, capacity_kw = unit.capacity_kw, active = unit.active, "Unit registered");
    Ok(Json(unit))
}

async fn list_units_handler(
    State(state): State<ApiState>,
) -> Result<Json<Vec<UnitRecord>>, StatusCode> {
    state.db.list_units().map(Json).map_err(|e| {
        error!("Failed to list units: {e:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// 404 unless the unit is registered
fn require_unit(db: &Database, unit_id: &str) -> Result<UnitRecord, StatusCode> {
    match db.get_unit(unit_id) {
        Ok(Some(unit)) => Ok(unit),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(unit_id = %unit_id, "Failed to load unit: {e:#}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

async fn ingest_readings_handler(
    State(state): State<ApiState>,
    Path(unit_id): Path<String>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, StatusCode> {
    require_unit(&state.db, &unit_id)?;

    let readings: Vec<EnergyReading> = request
        .readings
        .into_iter()
        .map(|r| EnergyReading {
            unit_id: unit_id.clone(),
            timestamp: r.timestamp,
            energy_kwh: r.energy_kwh,
        })
        .collect();

    let inserted = state.db.insert_readings(&readings).map_err(|e| {
        error!(unit_id = %unit_id, "Failed to store readings: {e:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })?;

    Ok(Json(IngestResponse { inserted }))
}

async fn daily_aggregates_handler(
    State(state): State<ApiState>,
    Path(unit_id): Path<String>,
) -> Result<Json<Vec<DailyAggregate>>, StatusCode> {
    require_unit(&state.db, &unit_id)?;

    state.db.daily_aggregates(&unit_id).map(Json).map_err(|e| {
        error!(unit_id = %unit_id, "Failed to aggregate readings: {e:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn detect_unit_handler(
    State(state): State<ApiState>,
    Path(unit_id): Path<String>,
) -> Result<Json<DetectionSummary>, StatusCode> {
    match state.orchestrator.run_for_unit(&unit_id).await {
        Ok(summary) => Ok(Json(summary)),
        Err(e) if e.is_not_found() => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            warn!(unit_id = %unit_id, error = %e, "On-demand detection failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

async fn detect_all_handler(
    State(state): State<ApiState>,
) -> Result<Json<BatchReport>, StatusCode> {
    state
        .orchestrator
        .run_for_active_units()
        .await
        .map(Json)
        .map_err(|e| {
            error!(error = %e, "Batch detection failed");
            StatusCode::SERVICE_UNAVAILABLE
        })
}

async fn list_anomalies_handler(
    State(state): State<ApiState>,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<Vec<AnomalyRecord>>, StatusCode> {
    state.db.list_anomalies(&query).map(Json).map_err(|e| {
        error!("Failed to list anomalies: {e:#}");
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

async fn count_anomalies_handler(
    State(state): State<ApiState>,
    Query(query): Query<AnomalyQuery>,
) -> Result<Json<CountResponse>, StatusCode> {
    state
        .db
        .count_anomalies(&query)
        .map(|count| Json(CountResponse { count }))
        .map_err(|e| {
            error!("Failed to count anomalies: {e:#}");
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

async fn resolve_anomaly_handler(
    State(state): State<ApiState>,
    Path(id): Path<i64>,
) -> Result<Json<AnomalyRecord>, StatusCode> {
    match state.db.resolve_anomaly(id) {
        Ok(Some(record)) => {
            info!(id, unit_id = %record.unit_id, "Anomaly resolved");
            Ok(Json(record))
        }
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            error!(id, "Failed to resolve anomaly: {e:#}");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
