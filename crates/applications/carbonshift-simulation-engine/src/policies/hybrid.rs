//! Hybrid selection: accuracy-filtered model choice combined with
//! start-time shifting. Every qualifying model gets its own start-time
//! search; the overall cheapest (model, start) pair wins.

use std::sync::Arc;

use carbonshift_core::{Job, Result, SimError};
use rayon::prelude::*;
use tracing::debug;

use super::temporal::best_start_time;
use super::{AccuracyTracker, Candidate, PolicyContext, RuntimeSampler, SchedulingPolicy, qualifying_models, select_best};

pub struct HybridSelectionPolicy {
    tracker: AccuracyTracker,
    safeguard_std_devs: f64,
    sampler: RuntimeSampler,
    label: String,
}

impl HybridSelectionPolicy {
    pub fn new(required_accuracy: f64, safeguard_std_devs: f64, seed: u64) -> Self {
        HybridSelectionPolicy {
            tracker: AccuracyTracker::new(required_accuracy),
            safeguard_std_devs,
            sampler: RuntimeSampler::new(seed),
            label: format!("HybridSelection(acc>={required_accuracy}, k={safeguard_std_devs})"),
        }
    }

    pub fn tracker(&self) -> &AccuracyTracker {
        &self.tracker
    }
}

impl SchedulingPolicy for HybridSelectionPolicy {
    fn handle_incoming(&mut self, job: &mut Job, ctx: &PolicyContext) -> Result<()> {
        let models = qualifying_models(ctx, &self.tracker);
        if models.is_empty() {
            return Err(SimError::infeasible(format!(
                "no model keeps average accuracy >= {} for job {}",
                self.tracker.required(),
                job.id
            )));
        }

        let (start, due, k) = (job.start_time, job.due_time, self.safeguard_std_devs);
        let candidates = models
            .par_iter()
            .map(|model| -> Result<Candidate> {
                let choice = best_start_time(ctx.series.as_ref(), start, due, model, k)?;
                Ok(Candidate {
                    model: Arc::clone(model),
                    start_time: choice.start_time,
                    predicted_carbon: choice.predicted_carbon,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let best = select_best(candidates)
            .ok_or_else(|| SimError::infeasible(format!("no candidate for job {}", job.id)))?;
        debug!(
            "[HYBRID] job {} -> {} at {} ({:.6} gCO2 predicted)",
            job.id, best.model.model_name, best.start_time, best.predicted_carbon
        );

        self.tracker.record(&best.model);
        job.start_time = best.start_time;
        self.sampler.assign(job, best.model);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
