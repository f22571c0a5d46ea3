//! Temporal shifting: delay a job into the lowest-carbon slot that still
//! fits before its deadline.
//!
//! Candidate start times are the job's arrival followed by every later
//! sample boundary `t` with `t + buffered_runtime <= due` and `t` no later
//! than the last sample. The arrival itself is always a candidate, so the
//! chosen slot never predicts more carbon than running immediately.

use std::sync::Arc;

use carbonshift_core::{CarbonIntensityProvider, ModelDefinition, Result, Timestamp};
use chrono::Duration;
use tracing::{debug, trace};

use super::{PolicyContext, RuntimeSampler, SchedulingPolicy};
use crate::carbon::estimate_carbon_at;
use carbonshift_core::Job;

/// Outcome of a start-time search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartChoice {
    pub start_time: Timestamp,
    pub predicted_carbon: f64,
}

/// Search sample boundaries from `start` for the minimum predicted carbon.
///
/// Ties keep the earliest candidate.
pub fn best_start_time<P>(
    series: &P,
    start: Timestamp,
    due: Timestamp,
    model: &ModelDefinition,
    safeguard_std_devs: f64,
) -> Result<StartChoice>
where
    P: CarbonIntensityProvider + ?Sized,
{
    let buffered = model.buffered_runtime(safeguard_std_devs).max(Duration::zero());
    let last = series.num_entries() - 1;

    let mut best = StartChoice {
        start_time: start,
        predicted_carbon: estimate_carbon_at(series, start, model, safeguard_std_devs)?,
    };
    let mut candidate = start;

    loop {
        let idx = series.index_floor(candidate)?;
        if idx >= last {
            break;
        }
        candidate = series.sample_at(idx + 1).timestamp;
        if candidate + buffered > due {
            break;
        }

        let carbon = estimate_carbon_at(series, candidate, model, safeguard_std_devs)?;
        trace!(
            "[TEMPORAL PREDICT] {} at {}: {:.6} gCO2",
            model.model_name, candidate, carbon
        );
        if carbon < best.predicted_carbon {
            best = StartChoice {
                start_time: candidate,
                predicted_carbon: carbon,
            };
        }
    }

    Ok(best)
}

/// Fixed model, start time shifted to the cheapest feasible slot
pub struct TemporalPolicy {
    model: Arc<ModelDefinition>,
    safeguard_std_devs: f64,
    sampler: RuntimeSampler,
    label: String,
}

impl TemporalPolicy {
    pub fn new(model: Arc<ModelDefinition>, safeguard_std_devs: f64, seed: u64) -> Self {
        let label = format!("Temporal({}, k={})", model.model_name, safeguard_std_devs);
        TemporalPolicy {
            model,
            safeguard_std_devs,
            sampler: RuntimeSampler::new(seed),
            label,
        }
    }
}

impl SchedulingPolicy for TemporalPolicy {
    fn handle_incoming(&mut self, job: &mut Job, ctx: &PolicyContext) -> Result<()> {
        let choice = best_start_time(
            ctx.series.as_ref(),
            job.start_time,
            job.due_time,
            &self.model,
            self.safeguard_std_devs,
        )?;
        debug!(
            "[TEMPORAL] job {} shifted {} -> {} ({:.6} gCO2 predicted)",
            job.id, job.start_time, choice.start_time, choice.predicted_carbon
        );

        job.start_time = choice.start_time;
        self.sampler.assign(job, Arc::clone(&self.model));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
