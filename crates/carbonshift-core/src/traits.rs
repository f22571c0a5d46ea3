//! Core traits for Carbonshift
//!
//! The providers below are the boundary to the external data producers.
//! The simulator and every policy work through these interfaces ONLY, so a
//! regional CSV trace, a synthetic trace, or a test fixture are
//! interchangeable.

use std::sync::Arc;

use crate::error::Result;
use crate::types::{CarbonSample, ModelDefinition, Timestamp};

/// Read-only carbon-intensity time series.
///
/// Shared across concurrent policy evaluations without locking.
/// Implementations always hold at least one sample.
pub trait CarbonIntensityProvider: Send + Sync {
    fn num_entries(&self) -> usize;

    /// Timestamp of the first sample
    fn start_date(&self) -> Timestamp;

    /// Last sample timestamp plus one sampling interval
    fn end_date(&self) -> Timestamp;

    /// Sample at position `index` (must be `< num_entries()`)
    fn sample_at(&self, index: usize) -> CarbonSample;

    /// Index of the latest sample at or before `at`.
    ///
    /// Fails with `DataRange` when `at` precedes the first sample or follows
    /// `end_date()`.
    fn index_floor(&self, at: Timestamp) -> Result<usize>;

    fn last_sample(&self) -> CarbonSample {
        self.sample_at(self.num_entries() - 1)
    }
}

/// Read-only model catalog
pub trait ModelCatalogProvider: Send + Sync {
    /// Fails with `Config` when the model is unknown
    fn model_by_name(&self, name: &str) -> Result<Arc<ModelDefinition>>;

    /// Every catalog entry. Callers must not depend on the order.
    fn all_models(&self) -> Vec<Arc<ModelDefinition>>;
}
