//! Core types shared across Carbonshift components

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Simulated wall-clock instant
pub type Timestamp = DateTime<Utc>;

/// Sequential identifier assigned by the job stream generator
pub type JobId = u64;

/// One grid carbon-intensity reading.
///
/// Valid from `timestamp` until the next sample's timestamp; the final
/// sample is extrapolated indefinitely.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CarbonSample {
    pub timestamp: Timestamp,
    /// kgCO2/MWh
    pub intensity: f64,
}

impl CarbonSample {
    pub fn new(timestamp: Timestamp, intensity: f64) -> Self {
        Self { timestamp, intensity }
    }
}

/// An AI model that jobs can be served with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDefinition {
    pub model_name: String,
    /// Mean runtime in seconds
    pub mean_run_time: f64,
    /// Runtime standard deviation in seconds
    pub std_dev_run_time: f64,
    /// Power draw in MW
    pub energy_usage: f64,
    /// Accuracy in [0, 1]
    #[serde(default)]
    pub accuracy: f64,
    /// Seconds added to arrival to form the due time when a run names no
    /// explicit due offset; `0` means unset
    #[serde(default)]
    pub slo_threshold: f64,

    // Carried through from catalog files; the engine ignores them
    #[serde(default)]
    pub number_of_runs: usize,
    #[serde(default)]
    pub workload_policy: Option<String>,
}

impl ModelDefinition {
    pub fn new(
        model_name: impl Into<String>,
        mean_run_time: f64,
        std_dev_run_time: f64,
        energy_usage: f64,
        accuracy: f64,
    ) -> Self {
        ModelDefinition {
            model_name: model_name.into(),
            mean_run_time,
            std_dev_run_time,
            energy_usage,
            accuracy,
            slo_threshold: 0.0,
            number_of_runs: 0,
            workload_policy: None,
        }
    }

    /// Mean runtime padded by `safeguard_std_devs` standard deviations
    pub fn buffered_runtime(&self, safeguard_std_devs: f64) -> Duration {
        seconds_to_duration(self.mean_run_time + safeguard_std_devs * self.std_dev_run_time)
    }
}

/// Where a job currently lives in the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobStage {
    Incoming,
    Queued,
    Running,
    Completed,
}

/// A request to be scheduled.
///
/// Created with only start/due times set. The active policy assigns the
/// model and end time (and may move the start) when the job leaves
/// `Incoming`; afterwards it is only moved between collections.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// When the job is queued to dispatch
    pub start_time: Timestamp,
    /// Deadline; never modified
    pub due_time: Timestamp,
    pub end_time: Option<Timestamp>,
    pub model: Option<Arc<ModelDefinition>>,
}

impl Job {
    pub fn new(id: JobId, start_time: Timestamp, due_time: Timestamp) -> Self {
        Job {
            id,
            start_time,
            due_time,
            end_time: None,
            model: None,
        }
    }

    /// Assigned execution duration, if an end time is set
    pub fn duration(&self) -> Option<Duration> {
        self.end_time.map(|end| end - self.start_time)
    }

    pub fn model_name(&self) -> Option<&str> {
        self.model.as_deref().map(|m| m.model_name.as_str())
    }

    /// Completion after the due time
    pub fn violates_deadline(&self) -> bool {
        self.end_time.is_some_and(|end| self.due_time < end)
    }
}

/// Convert fractional seconds to a millisecond-precision duration
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::milliseconds((seconds * 1000.0).round() as i64)
}
