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

//! Error types for the anomaly engine

use thiserror::Error;

/// Failure reading from the time-series store or the unit registry
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("unit not found: {0}")]
    NotFound(String),

    #[error("data source unavailable: {0}")]
    Unavailable(String),
}

/// Failure talking to the anomaly repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("an unresolved anomaly with the same key already exists")]
    Conflict,

    #[error("anomaly not found: {0}")]
    NotFound(i64),

    #[error("anomaly repository unavailable: {0}")]
    Unavailable(String),
}

/// Failure that aborts a detection run for a single unit
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("data unavailable for unit {unit_id}: {source}")]
    DataUnavailable {
        unit_id: String,
        #[source]
        source: SourceError,
    },
}

impl DetectionError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable {
                source: SourceError::NotFound(_),
                ..
            }
        )
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown anomaly type: {0}")]
    AnomalyType(String),

    #[error("unknown severity: {0}")]
    Severity(String),
}

pub type Result<T> = std::result::Result<T, DetectionError>;
