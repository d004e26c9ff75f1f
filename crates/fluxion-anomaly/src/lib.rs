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

//! Anomaly detection for solar units.
//!
//! Four heuristic detectors run over a unit's daily production series and
//! the [`DetectionOrchestrator`] persists what they find, skipping anomalies
//! that are already recorded and still unresolved.

pub mod detectors;
pub mod error;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod settings;
pub mod traits;

pub use detectors::{
    AnomalyDetector, MechanicalFailureDetector, SensorErrorDetector, SensorErrorKind,
    ShadingDetector, TemperatureDeratingDetector, default_detectors,
};
pub use error::{DetectionError, ParseError, RepositoryError, SourceError};
pub use memory::InMemoryStore;
pub use model::*;
pub use orchestrator::{BatchReport, DetectionOrchestrator, DetectionSummary, UnitOutcome};
pub use settings::*;
pub use traits::{AnomalyRepository, DailyAggregateSource, UnitProfileSource};
