//! Model selection: pick the lowest-carbon model that keeps the running
//! average accuracy at or above the required floor. Start times are never
//! moved.

use std::sync::Arc;

use carbonshift_core::{Job, Result, SimError};
use rayon::prelude::*;
use tracing::debug;

use super::{AccuracyTracker, Candidate, PolicyContext, RuntimeSampler, SchedulingPolicy, qualifying_models, select_best};
use crate::carbon::estimate_carbon_at;

pub struct ModelSelectionPolicy {
    tracker: AccuracyTracker,
    sampler: RuntimeSampler,
    label: String,
}

impl ModelSelectionPolicy {
    pub fn new(required_accuracy: f64, seed: u64) -> Self {
        ModelSelectionPolicy {
            tracker: AccuracyTracker::new(required_accuracy),
            sampler: RuntimeSampler::new(seed),
            label: format!("ModelSelection(acc>={required_accuracy})"),
        }
    }

    pub fn tracker(&self) -> &AccuracyTracker {
        &self.tracker
    }
}

impl SchedulingPolicy for ModelSelectionPolicy {
    fn handle_incoming(&mut self, job: &mut Job, ctx: &PolicyContext) -> Result<()> {
        let models = qualifying_models(ctx, &self.tracker);
        if models.is_empty() {
            return Err(SimError::infeasible(format!(
                "no model keeps average accuracy >= {} for job {}",
                self.tracker.required(),
                job.id
            )));
        }

        let start = job.start_time;
        let candidates = models
            .par_iter()
            .map(|model| -> Result<Candidate> {
                Ok(Candidate {
                    model: Arc::clone(model),
                    start_time: start,
                    predicted_carbon: estimate_carbon_at(ctx.series.as_ref(), start, model, 0.0)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let best = select_best(candidates)
            .ok_or_else(|| SimError::infeasible(format!("no candidate for job {}", job.id)))?;
        debug!(
            "[MODEL SELECT] job {} -> {} ({:.6} gCO2 predicted, {} candidates)",
            job.id,
            best.model.model_name,
            best.predicted_carbon,
            models.len()
        );

        self.tracker.record(&best.model);
        self.sampler.assign(job, best.model);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
