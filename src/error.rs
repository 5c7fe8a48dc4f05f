use std::fmt;
use thiserror::Error;

use crate::metrics::{Cadence, MetricKey};

#[derive(Debug, Error)]
pub enum Error {
    #[error("{metric} does not support {cadence} cadence (supported: {supported})")]
    InvalidCadence {
        metric: MetricKey,
        cadence: Cadence,
        supported: String,
    },

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid company id: {0}")]
    InvalidCompany(i64),

    #[error("Invalid bucket limit {limit} for {metric} (must be 1..={max})")]
    InvalidLimit {
        metric: MetricKey,
        limit: u32,
        max: u32,
    },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Ingest error: {0}")]
    Ingest(String),

    #[error("Accessor failed for {metric} {start}..{end}: {message}")]
    Accessor {
        metric: MetricKey,
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        message: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for failures caused by the caller's input rather than the backend.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidCadence { .. }
                | Error::InvalidPeriod(_)
                | Error::InvalidCompany(_)
                | Error::InvalidLimit { .. }
                | Error::UnknownMetric(_)
        )
    }

    /// True for backend failures worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Database(_) | Error::Accessor { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<rusqlite_migration::Error> for Error {
    fn from(e: rusqlite_migration::Error) -> Self {
        Error::Migration(e.to_string())
    }
}

impl<E: fmt::Display> From<tokio_rusqlite::Error<E>> for Error {
    fn from(e: tokio_rusqlite::Error<E>) -> Self {
        Error::Database(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Ingest(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
