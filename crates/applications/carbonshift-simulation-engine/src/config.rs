//! Run configuration
//!
//! Describes one simulation run: where the carbon data comes from, which
//! model catalog to use, how the job stream is generated and which policy
//! schedules it. Loaded from JSON or assembled from CLI flags, validated
//! before any simulator object is built.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use carbonshift_core::{ModelCatalogProvider, Result, SimError, Timestamp, seconds_to_duration};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::ModelCatalog;
use crate::grid_data::{GridIntensityGenerator, MAX_SYNTHETIC_DAYS};
use crate::intensity::{CarbonSeries, DEFAULT_RESOLUTION_MINUTES};
use crate::policies::{
    FifoPolicy, HybridSelectionPolicy, ModelSelectionPolicy, PolicyContext, SchedulingPolicy, TemporalPolicy,
};
use crate::simulator::Simulator;
use crate::workload::{JobStreamGenerator, WorkloadPattern};

/// 2024-01-01T00:00:00Z
const DEFAULT_SYNTHETIC_START_SECS: i64 = 1_704_067_200;

/// Due offset when neither the run nor the catalog names one
const DEFAULT_DUE: &str = "6hr";

/// Source of the carbon-intensity trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IntensitySource {
    /// Regional CSV trace (`start_date,generated_rate_kg_per_mwh`)
    Csv { path: PathBuf },
    /// Generated mean-reverting trace with a daily solar dip
    Synthetic {
        days: u32,
        mean_intensity: f64,
        #[serde(default)]
        seed: u64,
        #[serde(default = "default_synthetic_start")]
        start: Timestamp,
    },
}

impl IntensitySource {
    /// Synthetic trace starting 2024-01-01 UTC
    pub fn synthetic(days: u32, mean_intensity: f64, seed: u64) -> Self {
        IntensitySource::Synthetic {
            days,
            mean_intensity,
            seed,
            start: default_synthetic_start(),
        }
    }
}

/// Scheduling policy and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PolicyConfig {
    Fifo {
        model: String,
    },
    Temporal {
        model: String,
        #[serde(default)]
        safeguard_std_devs: f64,
    },
    ModelSelection {
        required_accuracy: f64,
    },
    HybridSelection {
        required_accuracy: f64,
        #[serde(default)]
        safeguard_std_devs: f64,
    },
}

impl PolicyConfig {
    /// Build from a CLI policy name (`fifo`, `temporal`, `model_selection`,
    /// `hybrid_selection`; dashes accepted)
    pub fn from_name(name: &str, model: &str, required_accuracy: f64, safeguard_std_devs: f64) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "fifo" => Ok(PolicyConfig::Fifo { model: model.to_string() }),
            "temporal" => Ok(PolicyConfig::Temporal {
                model: model.to_string(),
                safeguard_std_devs,
            }),
            "model_selection" | "selection" => Ok(PolicyConfig::ModelSelection { required_accuracy }),
            "hybrid_selection" | "hybrid" => Ok(PolicyConfig::HybridSelection {
                required_accuracy,
                safeguard_std_devs,
            }),
            _ => Err(SimError::config(format!(
                "unknown policy '{name}' (expected fifo, temporal, model_selection or hybrid_selection)"
            ))),
        }
    }

    fn validate(&self, catalog: &dyn ModelCatalogProvider) -> Result<()> {
        match self {
            PolicyConfig::Fifo { model } => catalog.model_by_name(model).map(|_| ()),
            PolicyConfig::Temporal {
                model,
                safeguard_std_devs,
            } => {
                validate_safeguard(*safeguard_std_devs)?;
                catalog.model_by_name(model).map(|_| ())
            }
            PolicyConfig::ModelSelection { required_accuracy } => validate_accuracy(*required_accuracy),
            PolicyConfig::HybridSelection {
                required_accuracy,
                safeguard_std_devs,
            } => {
                validate_accuracy(*required_accuracy)?;
                validate_safeguard(*safeguard_std_devs)
            }
        }
    }

    /// Instantiate the policy against `catalog`
    pub fn build(&self, catalog: &dyn ModelCatalogProvider, seed: u64) -> Result<Box<dyn SchedulingPolicy>> {
        let policy: Box<dyn SchedulingPolicy> = match self {
            PolicyConfig::Fifo { model } => Box::new(FifoPolicy::new(catalog.model_by_name(model)?, seed)),
            PolicyConfig::Temporal {
                model,
                safeguard_std_devs,
            } => Box::new(TemporalPolicy::new(
                catalog.model_by_name(model)?,
                *safeguard_std_devs,
                seed,
            )),
            PolicyConfig::ModelSelection { required_accuracy } => {
                Box::new(ModelSelectionPolicy::new(*required_accuracy, seed))
            }
            PolicyConfig::HybridSelection {
                required_accuracy,
                safeguard_std_devs,
            } => Box::new(HybridSelectionPolicy::new(*required_accuracy, *safeguard_std_devs, seed)),
        };
        Ok(policy)
    }
}

/// One simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub intensity: IntensitySource,
    /// Catalog JSON; the built-in catalog when absent
    #[serde(default)]
    pub catalog: Option<PathBuf>,
    /// Deadline offset after arrival, e.g. `30min`, `6hr`, `90s`. When
    /// absent the catalog's SLO threshold applies
    #[serde(default)]
    pub due: Option<String>,
    pub job_count: usize,
    #[serde(default = "default_workload")]
    pub workload: String,
    /// Share of jobs placed in the spike window of spike patterns
    #[serde(default)]
    pub spike_fraction: Option<f64>,
    pub policy: PolicyConfig,
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_workload() -> String {
    WorkloadPattern::Uniform.name().to_string()
}

fn default_seed() -> u64 {
    42
}

fn default_synthetic_start() -> Timestamp {
    DateTime::<Utc>::from_timestamp(DEFAULT_SYNTHETIC_START_SECS, 0).unwrap_or_default()
}

impl RunConfig {
    /// Load a JSON run configuration
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Explicit `due` setting, else the SLO threshold of the fixed model
    /// (the tightest threshold in the catalog for the selection policies),
    /// else six hours
    pub fn due_offset(&self, catalog: &dyn ModelCatalogProvider) -> Result<Duration> {
        if let Some(due) = &self.due {
            return parse_due_offset(due);
        }
        let threshold = match &self.policy {
            PolicyConfig::Fifo { model } | PolicyConfig::Temporal { model, .. } => {
                Some(catalog.model_by_name(model)?.slo_threshold)
            }
            PolicyConfig::ModelSelection { .. } | PolicyConfig::HybridSelection { .. } => catalog
                .all_models()
                .iter()
                .map(|m| m.slo_threshold)
                .filter(|t| *t > 0.0)
                .min_by(f64::total_cmp),
        };
        match threshold.filter(|t| t.is_finite() && *t > 0.0) {
            Some(seconds) => Ok(seconds_to_duration(seconds)),
            None => parse_due_offset(DEFAULT_DUE),
        }
    }

    pub fn workload_pattern(&self) -> Result<WorkloadPattern> {
        self.workload.parse()
    }

    /// Reject unusable settings before anything is built
    pub fn validate(&self, catalog: &dyn ModelCatalogProvider) -> Result<()> {
        if self.job_count == 0 {
            return Err(SimError::config("job count must be positive"));
        }
        self.policy.validate(catalog)?;
        self.due_offset(catalog)?;
        self.workload_pattern()?;
        if let Some(fraction) = self.spike_fraction {
            if !(0.0..=1.0).contains(&fraction) {
                return Err(SimError::config(format!("spike fraction {fraction} outside [0, 1]")));
            }
        }
        if let IntensitySource::Synthetic {
            days, mean_intensity, ..
        } = &self.intensity
        {
            if *days == 0 || *days > MAX_SYNTHETIC_DAYS {
                return Err(SimError::config(format!(
                    "synthetic trace length {days} days outside 1..={MAX_SYNTHETIC_DAYS}"
                )));
            }
            if !mean_intensity.is_finite() || *mean_intensity <= 0.0 {
                return Err(SimError::config(format!(
                    "synthetic mean intensity must be positive, got {mean_intensity}"
                )));
            }
        }
        Ok(())
    }

    pub fn load_catalog(&self) -> Result<ModelCatalog> {
        match &self.catalog {
            Some(path) => ModelCatalog::from_json_path(path),
            None => Ok(ModelCatalog::builtin()),
        }
    }

    pub fn load_series(&self) -> Result<CarbonSeries> {
        match &self.intensity {
            IntensitySource::Csv { path } => CarbonSeries::from_csv_path(path),
            IntensitySource::Synthetic {
                days,
                mean_intensity,
                seed,
                start,
            } => GridIntensityGenerator::new(*mean_intensity, *seed).generate(
                *start,
                *days,
                Duration::minutes(DEFAULT_RESOLUTION_MINUTES),
            ),
        }
    }

    /// Load data, generate the job stream and wire up a ready-to-run simulator
    pub fn build_simulator(&self) -> Result<Simulator> {
        let catalog = self.load_catalog()?;
        self.validate(&catalog)?;

        let series = self.load_series()?;
        let pattern = self.workload_pattern()?;
        let due_offset = self.due_offset(&catalog)?;

        let mut generator = JobStreamGenerator::new(&series, self.seed);
        if let Some(fraction) = self.spike_fraction {
            generator = generator.with_spike_fraction(fraction);
        }
        let jobs = generator.generate(pattern, self.job_count, due_offset)?;
        info!(
            "Generated {} {} jobs due {}s after arrival",
            jobs.len(),
            pattern,
            due_offset.num_seconds()
        );

        let policy = self.policy.build(&catalog, self.seed)?;
        let ctx = PolicyContext::new(Arc::new(series), Arc::new(catalog));
        Ok(Simulator::new(jobs, policy, ctx))
    }
}

/// Parse `30min`, `1hr`, `24hr`, `90s`, `15m`, `2h` into a duration
pub fn parse_due_offset(value: &str) -> Result<Duration> {
    let value = value.trim().to_ascii_lowercase();
    let split = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    let (digits, unit) = value.split_at(split);

    let amount: i64 = digits
        .parse()
        .map_err(|_| SimError::config(format!("due offset '{value}' has no leading number")))?;

    let offset = match unit.trim() {
        "s" | "sec" | "secs" => Duration::try_seconds(amount),
        "m" | "min" | "mins" => Duration::try_minutes(amount),
        "h" | "hr" | "hrs" => Duration::try_hours(amount),
        other => {
            return Err(SimError::config(format!(
                "unknown due offset unit '{other}' in '{value}' (expected s, min or hr)"
            )));
        }
    };
    offset.ok_or_else(|| SimError::config(format!("due offset '{value}' out of range")))
}

fn validate_accuracy(required: f64) -> Result<()> {
    if (0.0..=1.0).contains(&required) {
        Ok(())
    } else {
        Err(SimError::config(format!("required accuracy {required} outside [0, 1]")))
    }
}

fn validate_safeguard(k: f64) -> Result<()> {
    if k.is_finite() && k >= 0.0 {
        Ok(())
    } else {
        Err(SimError::config(format!("safeguard multiplier must be non-negative, got {k}")))
    }
}
