//! Error types for Carbonshift

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type for simulator, policy and loader operations
pub type Result<T> = std::result::Result<T, SimError>;

/// Core error type for Carbonshift operations
#[derive(Error, Debug)]
pub enum SimError {
    /// Bad input data, unknown model, unusable time-series range
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query timestamp falls outside the available carbon time series
    #[error("Timestamp {at} outside carbon data range [{start}, {end}]")]
    DataRange {
        at: DateTime<Utc>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    /// Inverted or empty interval handed to the accounting engine
    #[error("Invalid interval: {0}")]
    Interval(String),

    /// A policy could not produce a decision for a job
    #[error("Policy infeasible: {0}")]
    PolicyInfeasible(String),

    /// Event scheduler invariant breach (programming error, fatal)
    #[error("Simulator invariant violated: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a policy infeasibility error
    pub fn infeasible(msg: impl Into<String>) -> Self {
        Self::PolicyInfeasible(msg.into())
    }

    /// Create an invariant violation
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant(msg.into())
    }

    /// Create an interval misuse error
    pub fn interval(msg: impl Into<String>) -> Self {
        Self::Interval(msg.into())
    }
}
