//! Discrete-event simulator for carbon-aware job scheduling
//!
//! Jobs move Incoming -> Queued -> Running -> Completed. Each step picks the
//! earliest pending transition across the three collections, hands the job
//! to the active policy and, on completion, charges the emitted carbon to
//! the job's model.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use carbonshift_core::{Job, JobId, JobStage, Result, SimError, Timestamp};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::carbon::integrate;
use crate::heap::MinHeap;
use crate::policies::{PolicyContext, SchedulingPolicy};

/// Final record of one completed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedJob {
    pub id: JobId,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub due_time: Timestamp,
    pub model: String,
}

/// Result of a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub policy_name: String,
    pub total_jobs: usize,
    pub completed_jobs: usize,
    pub total_carbon_grams: f64,
    pub total_violations: u64,
    pub carbon_by_model: BTreeMap<String, f64>,
    pub violations_by_model: BTreeMap<String, u64>,
    pub completed: Vec<CompletedJob>,
}

/// One processed lifecycle transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimEvent {
    pub job_id: JobId,
    /// Stage the job entered
    pub stage: JobStage,
    pub time: Timestamp,
}

impl fmt::Display for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job {} -> {:?} at {}", self.job_id, self.stage, self.time)
    }
}

/// Collection whose head is processed next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EventSource {
    Incoming,
    Queued,
    Running,
}

/// Discrete-event simulator
pub struct Simulator {
    curr_time: Timestamp,
    incoming: VecDeque<Job>,
    queued: MinHeap<Timestamp, Job>,
    running: MinHeap<Timestamp, Job>,
    completed: Vec<Job>,
    policy: Box<dyn SchedulingPolicy>,
    ctx: PolicyContext,
    total_jobs: usize,

    // Metrics
    carbon_by_model: BTreeMap<String, f64>,
    violations_by_model: BTreeMap<String, u64>,
}

impl Simulator {
    /// Create a simulator over `jobs` (ordered by arrival before use)
    pub fn new(mut jobs: Vec<Job>, policy: Box<dyn SchedulingPolicy>, ctx: PolicyContext) -> Self {
        jobs.sort_by_key(|job| job.start_time);

        let data_start = ctx.series.start_date();
        let curr_time = jobs
            .first()
            .map_or(data_start, |job| job.start_time.min(data_start));
        let total_jobs = jobs.len();

        Simulator {
            curr_time,
            queued: MinHeap::with_capacity(total_jobs),
            running: MinHeap::with_capacity(total_jobs),
            completed: Vec::with_capacity(total_jobs),
            incoming: jobs.into(),
            policy,
            ctx,
            total_jobs,
            carbon_by_model: BTreeMap::new(),
            violations_by_model: BTreeMap::new(),
        }
    }

    pub fn current_time(&self) -> Timestamp {
        self.curr_time
    }

    pub fn incoming_len(&self) -> usize {
        self.incoming.len()
    }

    pub fn queued_len(&self) -> usize {
        self.queued.len()
    }

    pub fn running_len(&self) -> usize {
        self.running.len()
    }

    pub fn completed(&self) -> &[Job] {
        &self.completed
    }

    pub fn total_jobs(&self) -> usize {
        self.total_jobs
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn carbon_by_model(&self) -> &BTreeMap<String, f64> {
        &self.carbon_by_model
    }

    pub fn violations_by_model(&self) -> &BTreeMap<String, u64> {
        &self.violations_by_model
    }

    /// All three collections drained
    pub fn is_finished(&self) -> bool {
        self.incoming.is_empty() && self.queued.is_empty() && self.running.is_empty()
    }

    /// Run until every job has completed
    pub fn run(&mut self) -> Result<SimulationResult> {
        info!(
            "Starting simulation: policy={}, jobs={}",
            self.policy.name(),
            self.total_jobs
        );
        if self.total_jobs == 0 {
            warn!("Job stream is empty; nothing to simulate");
        }

        while self.step()?.is_some() {}

        let result = self.collect_results();
        info!(
            "Simulation finished: policy={}, completed={}, carbon={:.4} g, violations={}",
            result.policy_name, result.completed_jobs, result.total_carbon_grams, result.total_violations
        );
        Ok(result)
    }

    /// Process exactly one event; `None` once all collections are empty
    pub fn step(&mut self) -> Result<Option<SimEvent>> {
        if self.is_finished() {
            return Ok(None);
        }

        let event = match self.select_event()? {
            EventSource::Incoming => self.handle_incoming()?,
            EventSource::Queued => self.handle_queued()?,
            EventSource::Running => self.handle_running()?,
        };
        Ok(Some(event))
    }

    /// Strict precedence Incoming > Queued > Running; a later collection
    /// wins only when its head is strictly earlier.
    fn select_event(&self) -> Result<EventSource> {
        let queued_start = self.queued.peek_key();
        let running_end = self.running.peek_key();

        if let Some(job) = self.incoming.front() {
            let arrival = job.start_time;
            if queued_start.is_none_or(|start| *start > arrival) && running_end.is_none_or(|end| *end > arrival) {
                return Ok(EventSource::Incoming);
            }
        }

        if let Some(start) = queued_start {
            if running_end.is_none_or(|end| end > start) {
                return Ok(EventSource::Queued);
            }
        }

        if !self.running.is_empty() {
            return Ok(EventSource::Running);
        }

        Err(SimError::invariant(format!(
            "no selectable event with {} incoming, {} queued, {} running",
            self.incoming.len(),
            self.queued.len(),
            self.running.len()
        )))
    }

    fn advance_to(&mut self, time: Timestamp) -> Result<()> {
        if time < self.curr_time {
            return Err(SimError::invariant(format!(
                "event at {time} precedes current time {}",
                self.curr_time
            )));
        }
        self.curr_time = time;
        Ok(())
    }

    /// Incoming -> Queued: the policy fixes model, start and end
    fn handle_incoming(&mut self) -> Result<SimEvent> {
        let mut job = self
            .incoming
            .pop_front()
            .ok_or_else(|| SimError::invariant("incoming collection empty"))?;
        self.advance_to(job.start_time)?;
        let arrival = job.start_time;

        self.policy.handle_incoming(&mut job, &self.ctx)?;

        if job.model.is_none() {
            return Err(SimError::invariant(format!("policy left job {} without a model", job.id)));
        }
        let end = job
            .end_time
            .ok_or_else(|| SimError::invariant(format!("policy left job {} without an end time", job.id)))?;
        if job.start_time < arrival {
            return Err(SimError::invariant(format!(
                "policy moved job {} start {} before arrival {arrival}",
                job.id, job.start_time
            )));
        }
        if end < job.start_time {
            return Err(SimError::invariant(format!(
                "policy set job {} end {end} before start {}",
                job.id, job.start_time
            )));
        }

        debug!(
            "[INCOMING] job {} arrived {}, queued for {} on {} (due {})",
            job.id,
            arrival,
            job.start_time,
            job.model_name().unwrap_or("?"),
            job.due_time
        );

        let event = SimEvent {
            job_id: job.id,
            stage: JobStage::Queued,
            time: arrival,
        };
        self.queued.push(job.start_time, job);
        Ok(event)
    }

    /// Queued -> Running
    fn handle_queued(&mut self) -> Result<SimEvent> {
        let (start, mut job) = self
            .queued
            .pop()
            .ok_or_else(|| SimError::invariant("queued collection empty"))?;
        self.advance_to(start)?;

        self.policy.handle_queued(&mut job, &self.ctx)?;

        let end = job
            .end_time
            .ok_or_else(|| SimError::invariant(format!("queued job {} has no end time", job.id)))?;
        debug!("[QUEUED] job {} started at {}, ends {}", job.id, start, end);

        let event = SimEvent {
            job_id: job.id,
            stage: JobStage::Running,
            time: start,
        };
        self.running.push(end, job);
        Ok(event)
    }

    /// Running -> Completed: account emissions and deadline compliance
    fn handle_running(&mut self) -> Result<SimEvent> {
        let (end, mut job) = self
            .running
            .pop()
            .ok_or_else(|| SimError::invariant("running collection empty"))?;
        self.advance_to(end)?;

        self.policy.handle_running(&mut job, &self.ctx)?;

        let model = job
            .model
            .clone()
            .ok_or_else(|| SimError::invariant(format!("running job {} has no model", job.id)))?;
        let carbon = integrate(self.ctx.series.as_ref(), job.start_time, end, model.energy_usage)?;
        *self.carbon_by_model.entry(model.model_name.clone()).or_insert(0.0) += carbon;

        let violations = self.violations_by_model.entry(model.model_name.clone()).or_insert(0);
        if job.violates_deadline() {
            *violations += 1;
            debug!(
                "[SLO VIOLATION] job {} on {} finished {} after due {}",
                job.id, model.model_name, end, job.due_time
            );
        }
        debug!(
            "[COMPLETE] job {} on {} finished at {}: {:.6} gCO2",
            job.id, model.model_name, end, carbon
        );

        let event = SimEvent {
            job_id: job.id,
            stage: JobStage::Completed,
            time: end,
        };
        self.completed.push(job);
        Ok(event)
    }

    /// Snapshot of the statistics gathered so far
    pub fn collect_results(&self) -> SimulationResult {
        let completed: Vec<CompletedJob> = self
            .completed
            .iter()
            .filter_map(|job| {
                Some(CompletedJob {
                    id: job.id,
                    start_time: job.start_time,
                    end_time: job.end_time?,
                    due_time: job.due_time,
                    model: job.model_name()?.to_string(),
                })
            })
            .collect();

        SimulationResult {
            policy_name: self.policy.name().to_string(),
            total_jobs: self.total_jobs,
            completed_jobs: completed.len(),
            total_carbon_grams: self.carbon_by_model.values().sum(),
            total_violations: self.violations_by_model.values().sum(),
            carbon_by_model: self.carbon_by_model.clone(),
            violations_by_model: self.violations_by_model.clone(),
            completed,
        }
    }
}
