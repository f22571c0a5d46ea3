//! FIFO: run every job on one fixed model as soon as it arrives

use std::sync::Arc;

use carbonshift_core::{Job, ModelDefinition, Result};
use tracing::debug;

use super::{PolicyContext, RuntimeSampler, SchedulingPolicy};
use crate::carbon::estimate_carbon;

/// Baseline policy: fixed model, no reordering, no shifting
pub struct FifoPolicy {
    model: Arc<ModelDefinition>,
    sampler: RuntimeSampler,
    label: String,
}

impl FifoPolicy {
    pub fn new(model: Arc<ModelDefinition>, seed: u64) -> Self {
        let label = format!("FIFO({})", model.model_name);
        FifoPolicy {
            model,
            sampler: RuntimeSampler::new(seed),
            label,
        }
    }
}

impl SchedulingPolicy for FifoPolicy {
    fn handle_incoming(&mut self, job: &mut Job, ctx: &PolicyContext) -> Result<()> {
        let predicted = estimate_carbon(ctx.series.as_ref(), job, &self.model, 0.0)?;
        debug!(
            "[FIFO PREDICT] job {} at {} on {}: {:.6} gCO2",
            job.id, job.start_time, self.model.model_name, predicted
        );

        self.sampler.assign(job, Arc::clone(&self.model));
        Ok(())
    }

    fn name(&self) -> &str {
        &self.label
    }
}
