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

//! FluxION Monitor - SQLite-backed host for the anomaly detection engine

pub mod api;
pub mod config;
pub mod db;
pub mod scheduler;

pub use api::{ApiState, build_router};
pub use config::MonitorConfig;
pub use db::{Database, UnitRecord};
pub use scheduler::{NightlyScheduler, next_run_after, run_cycle};
