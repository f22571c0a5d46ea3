//! Scheduling policies for carbon-aware job placement
//!
//! Implements multiple policies to compare:
//! - FIFO: one fixed model, run on arrival
//! - Temporal: one fixed model, start shifted to the lowest-carbon slot
//!   that still meets the deadline
//! - ModelSelection: lowest-carbon model that keeps the running average
//!   accuracy above a floor
//! - HybridSelection: ModelSelection's accuracy filter combined with
//!   Temporal's start-time search
//!
//! The selection policies evaluate every qualifying model concurrently
//! (one rayon task per candidate over read-only data) and reduce only after
//! all estimates are in.

use std::cmp::Ordering;
use std::sync::Arc;

use carbonshift_core::{
    CarbonIntensityProvider, Job, ModelCatalogProvider, ModelDefinition, Result, Timestamp, seconds_to_duration,
};
use chrono::Duration;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

pub mod fifo;
pub mod hybrid;
pub mod model_selection;
pub mod temporal;

pub use fifo::FifoPolicy;
pub use hybrid::HybridSelectionPolicy;
pub use model_selection::ModelSelectionPolicy;
pub use temporal::{TemporalPolicy, best_start_time};

/// Read-only data every policy decision may consult
#[derive(Clone)]
pub struct PolicyContext {
    pub series: Arc<dyn CarbonIntensityProvider>,
    pub catalog: Arc<dyn ModelCatalogProvider>,
}

impl PolicyContext {
    pub fn new(series: Arc<dyn CarbonIntensityProvider>, catalog: Arc<dyn ModelCatalogProvider>) -> Self {
        PolicyContext { series, catalog }
    }
}

/// Scheduling policy trait
///
/// Invoked by the simulator at each lifecycle transition. Any error aborts
/// the run.
pub trait SchedulingPolicy {
    /// Assign model and end time (and optionally move the start time)
    fn handle_incoming(&mut self, job: &mut Job, ctx: &PolicyContext) -> Result<()>;

    /// Job is about to start running
    fn handle_queued(&mut self, _job: &mut Job, _ctx: &PolicyContext) -> Result<()> {
        Ok(())
    }

    /// Job has finished running
    fn handle_running(&mut self, _job: &mut Job, _ctx: &PolicyContext) -> Result<()> {
        Ok(())
    }

    /// Get policy name
    fn name(&self) -> &str;
}

/// Draws actual execution times from a model's runtime distribution
#[derive(Debug, Clone)]
pub struct RuntimeSampler {
    rng: StdRng,
}

impl RuntimeSampler {
    pub fn new(seed: u64) -> Self {
        RuntimeSampler {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `max(mean + stddev·z, 0)` with `z ~ N(0, 1)`
    pub fn draw(&mut self, model: &ModelDefinition) -> Duration {
        let z: f64 = StandardNormal.sample(&mut self.rng);
        let seconds = (model.mean_run_time + model.std_dev_run_time * z).max(0.0);
        seconds_to_duration(seconds)
    }

    /// Bind `model` to `job` and set its end time from a fresh draw
    pub fn assign(&mut self, job: &mut Job, model: Arc<ModelDefinition>) {
        let runtime = self.draw(&model);
        job.end_time = Some(job.start_time + runtime);
        job.model = Some(model);
    }
}

/// Running average accuracy across all jobs a policy has placed
#[derive(Debug, Clone, Default)]
pub struct AccuracyTracker {
    required: f64,
    cumulative_accuracy: f64,
    processed: u64,
}

impl AccuracyTracker {
    pub fn new(required: f64) -> Self {
        AccuracyTracker {
            required,
            ..Default::default()
        }
    }

    pub fn required(&self) -> f64 {
        self.required
    }

    /// Average accuracy after placing one more job on `model`
    pub fn average_with(&self, model: &ModelDefinition) -> f64 {
        (self.cumulative_accuracy + model.accuracy) / (self.processed + 1) as f64
    }

    /// Placing the next job on `model` keeps the average at or above the floor
    pub fn admits(&self, model: &ModelDefinition) -> bool {
        self.average_with(model) >= self.required
    }

    pub fn record(&mut self, model: &ModelDefinition) {
        self.cumulative_accuracy += model.accuracy;
        self.processed += 1;
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn average(&self) -> Option<f64> {
        (self.processed > 0).then(|| self.cumulative_accuracy / self.processed as f64)
    }
}

/// One evaluated (model, start time) option
#[derive(Debug, Clone)]
pub struct Candidate {
    pub model: Arc<ModelDefinition>,
    pub start_time: Timestamp,
    pub predicted_carbon: f64,
}

/// Lowest predicted carbon wins. Exact ties go to the higher-accuracy
/// model, then the earlier start, then the lexicographically smaller name,
/// so the result never depends on catalog iteration order.
pub fn select_best(candidates: impl IntoIterator<Item = Candidate>) -> Option<Candidate> {
    candidates.into_iter().min_by(compare_candidates)
}

fn compare_candidates(a: &Candidate, b: &Candidate) -> Ordering {
    a.predicted_carbon
        .total_cmp(&b.predicted_carbon)
        .then_with(|| b.model.accuracy.total_cmp(&a.model.accuracy))
        .then_with(|| a.start_time.cmp(&b.start_time))
        .then_with(|| a.model.model_name.cmp(&b.model.model_name))
}

/// Catalog models that keep `tracker` at or above its floor
fn qualifying_models(ctx: &PolicyContext, tracker: &AccuracyTracker) -> Vec<Arc<ModelDefinition>> {
    ctx.catalog
        .all_models()
        .into_iter()
        .filter(|m| tracker.admits(m))
        .collect()
}


#[cfg(test)]
mod tests {
    use super::testing::t0;
    use super::*;

    fn candidate(name: &str, accuracy: f64, offset_min: i64, carbon: f64) -> Candidate {
        Candidate {
            model: Arc::new(ModelDefinition::new(name, 60.0, 0.0, 1.0, accuracy)),
            start_time: t0() + Duration::minutes(offset_min),
            predicted_carbon: carbon,
        }
    }

    #[test]
    fn test_sampler_zero_stddev_is_exact() {
        let model = ModelDefinition::new("m", 300.0, 0.0, 1.0, 0.9);
        let mut sampler = RuntimeSampler::new(123);

        for _ in 0..20 {
            assert_eq!(sampler.draw(&model), Duration::seconds(300));
        }
    }

    #[test]
    fn test_sampler_clamps_negative_runtimes() {
        // Mean far below the spread: many raw draws are negative
        let model = ModelDefinition::new("m", 1.0, 1000.0, 1.0, 0.9);
        let mut sampler = RuntimeSampler::new(5);

        for _ in 0..200 {
            assert!(sampler.draw(&model) >= Duration::zero());
        }
    }

    #[test]
    fn test_sampler_seeded() {
        let model = ModelDefinition::new("m", 300.0, 40.0, 1.0, 0.9);
        let mut a = RuntimeSampler::new(77);
        let mut b = RuntimeSampler::new(77);

        for _ in 0..10 {
            assert_eq!(a.draw(&model), b.draw(&model));
        }
    }

    #[test]
    fn test_accuracy_tracker() {
        let low = ModelDefinition::new("low", 1.0, 0.0, 1.0, 0.7);
        let high = ModelDefinition::new("high", 1.0, 0.0, 1.0, 0.9);
        let mut tracker = AccuracyTracker::new(0.8);

        assert!(tracker.average().is_none());
        assert!(!tracker.admits(&low));
        assert!(tracker.admits(&high));

        tracker.record(&high);
        // (0.9 + 0.7) / 2 == 0.8
        assert!(tracker.admits(&low));
        tracker.record(&low);

        assert_eq!(tracker.processed(), 2);
        assert!((tracker.average().unwrap() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_select_best_lowest_carbon() {
        let best = select_best(vec![
            candidate("a", 0.9, 0, 5.0),
            candidate("b", 0.8, 0, 2.0),
            candidate("c", 0.95, 0, 3.0),
        ])
        .unwrap();

        assert_eq!(best.model.model_name, "b");
    }

    #[test]
    fn test_select_best_tie_breaks() {
        // Equal carbon: higher accuracy wins
        let best = select_best(vec![candidate("a", 0.8, 0, 1.0), candidate("b", 0.9, 0, 1.0)]).unwrap();
        assert_eq!(best.model.model_name, "b");

        // Equal carbon and accuracy: earlier start wins
        let best = select_best(vec![candidate("a", 0.8, 30, 1.0), candidate("a", 0.8, 10, 1.0)]).unwrap();
        assert_eq!(best.start_time, t0() + Duration::minutes(10));

        // Everything equal but the name: order of input does not matter
        let forward = select_best(vec![candidate("x", 0.8, 0, 1.0), candidate("y", 0.8, 0, 1.0)]).unwrap();
        let reverse = select_best(vec![candidate("y", 0.8, 0, 1.0), candidate("x", 0.8, 0, 1.0)]).unwrap();
        assert_eq!(forward.model.model_name, "x");
        assert_eq!(reverse.model.model_name, "x");

        assert!(select_best(Vec::new()).is_none());
    }
}
