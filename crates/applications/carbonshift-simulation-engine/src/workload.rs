//! Synthetic job arrival streams
//!
//! Produces arrival-ordered jobs inside the carbon data range so that every
//! job (arrival plus deadline) can be accounted against real samples.
//!
//! ## Patterns
//!
//! - **uniform**: evenly spaced arrivals
//! - **random**: uniformly random arrivals
//! - **morningSpike / afternoonSpike / eveningSpike / nightSpike**: a share
//!   of the jobs lands in a time-of-day window (05–12, 12–17, 17–24, 00–05),
//!   the rest outside it
//! - **weekdaySpike / weekendSpike**: same idea over day-of-week

use std::fmt;
use std::str::FromStr;

use carbonshift_core::{CarbonIntensityProvider, Job, Result, SimError, Timestamp};
use chrono::{Datelike, Duration, Timelike, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Give up on a spike window after this many rejected draws
const MAX_DRAWS_PER_JOB: usize = 10_000;

/// Arrival distribution of a generated job stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WorkloadPattern {
    Uniform,
    Random,
    MorningSpike,
    AfternoonSpike,
    EveningSpike,
    NightSpike,
    WeekdaySpike,
    WeekendSpike,
}

impl WorkloadPattern {
    pub const ALL: [WorkloadPattern; 8] = [
        WorkloadPattern::Uniform,
        WorkloadPattern::Random,
        WorkloadPattern::MorningSpike,
        WorkloadPattern::AfternoonSpike,
        WorkloadPattern::EveningSpike,
        WorkloadPattern::NightSpike,
        WorkloadPattern::WeekdaySpike,
        WorkloadPattern::WeekendSpike,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            WorkloadPattern::Uniform => "uniform",
            WorkloadPattern::Random => "random",
            WorkloadPattern::MorningSpike => "morningSpike",
            WorkloadPattern::AfternoonSpike => "afternoonSpike",
            WorkloadPattern::EveningSpike => "eveningSpike",
            WorkloadPattern::NightSpike => "nightSpike",
            WorkloadPattern::WeekdaySpike => "weekdaySpike",
            WorkloadPattern::WeekendSpike => "weekendSpike",
        }
    }

    /// Share of jobs placed inside the spike window unless overridden
    pub fn default_spike_fraction(&self) -> f64 {
        match self {
            WorkloadPattern::WeekendSpike => 1.0,
            _ => 0.8,
        }
    }

    /// `[from, to)` hours of day for time-of-day spikes
    fn hour_window(&self) -> Option<(u32, u32)> {
        match self {
            WorkloadPattern::MorningSpike => Some((5, 12)),
            WorkloadPattern::AfternoonSpike => Some((12, 17)),
            WorkloadPattern::EveningSpike => Some((17, 24)),
            WorkloadPattern::NightSpike => Some((0, 5)),
            _ => None,
        }
    }
}

impl fmt::Display for WorkloadPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for WorkloadPattern {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
                SimError::config(format!(
                    "unknown workload pattern '{s}' (expected one of: {})",
                    known.join(", ")
                ))
            })
    }
}

/// Generates jobs whose arrival and deadline fit inside a carbon series
pub struct JobStreamGenerator {
    range_start: Timestamp,
    range_end: Timestamp,
    spike_fraction: Option<f64>,
    rng: StdRng,
}

impl JobStreamGenerator {
    /// Arrivals are drawn from the series' `[start_date, end_date)` range
    pub fn new<P>(series: &P, seed: u64) -> Self
    where
        P: CarbonIntensityProvider + ?Sized,
    {
        JobStreamGenerator {
            range_start: series.start_date(),
            range_end: series.end_date(),
            spike_fraction: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Override the share of jobs placed in the spike window
    pub fn with_spike_fraction(mut self, fraction: f64) -> Self {
        self.spike_fraction = Some(fraction);
        self
    }

    /// Generate `job_count` jobs sorted by start time, each due
    /// `due_offset` after arrival
    pub fn generate(&mut self, pattern: WorkloadPattern, job_count: usize, due_offset: Duration) -> Result<Vec<Job>> {
        if due_offset < Duration::zero() {
            return Err(SimError::config(format!("due offset must be non-negative, got {due_offset}")));
        }
        let latest = self
            .range_end
            .checked_sub_signed(due_offset)
            .filter(|latest| *latest > self.range_start);
        let Some(latest) = latest else {
            return Err(SimError::config(format!(
                "due offset {}s leaves no arrival window inside carbon data {} .. {}",
                due_offset.num_seconds(),
                self.range_start,
                self.range_end
            )));
        };
        if job_count == 0 {
            warn!("Generating an empty job stream");
            return Ok(Vec::new());
        }

        let window = (self.range_start, latest);
        let fraction = self
            .spike_fraction
            .unwrap_or_else(|| pattern.default_spike_fraction())
            .clamp(0.0, 1.0);

        let mut starts = match pattern {
            WorkloadPattern::Uniform => uniform_starts(window, job_count),
            WorkloadPattern::Random => (0..job_count).map(|_| self.random_time(window)).collect(),
            WorkloadPattern::WeekdaySpike | WorkloadPattern::WeekendSpike => {
                let on_spike = ((job_count as f64 * fraction).round() as usize).min(job_count);
                let want_weekend = pattern == WorkloadPattern::WeekendSpike;
                info!(
                    "Putting {} jobs in the {} window and {} outside it",
                    on_spike,
                    pattern,
                    job_count - on_spike
                );
                let mut starts = self.sample_matching(window, on_spike, |t| is_weekend(t) == want_weekend)?;
                starts.extend(self.sample_matching(window, job_count - on_spike, |t| is_weekend(t) != want_weekend)?);
                starts
            }
            _ => {
                let (from, to) = pattern.hour_window().unwrap_or((0, 24));
                let on_spike = ((job_count as f64 * fraction).ceil() as usize).min(job_count);
                info!(
                    "Putting {} jobs in the {} window ({:02}:00-{:02}:00) and {} outside it",
                    on_spike,
                    pattern,
                    from,
                    to,
                    job_count - on_spike
                );
                let in_window = |t: &Timestamp| (from..to).contains(&t.hour());
                let mut starts = self.sample_matching(window, on_spike, in_window)?;
                starts.extend(self.sample_matching(window, job_count - on_spike, |t| !in_window(t))?);
                starts
            }
        };

        starts.sort();
        let jobs: Vec<Job> = starts
            .into_iter()
            .enumerate()
            .map(|(id, start)| Job::new(id as u64, start, start + due_offset))
            .collect();

        debug!(
            "Generated {} {} jobs between {} and {}",
            jobs.len(),
            pattern,
            jobs.first().map(|j| j.start_time.to_string()).unwrap_or_default(),
            jobs.last().map(|j| j.start_time.to_string()).unwrap_or_default()
        );
        Ok(jobs)
    }

    /// Uniformly random instant in `[from, to)` at millisecond precision
    fn random_time(&mut self, (from, to): (Timestamp, Timestamp)) -> Timestamp {
        let span_ms = (to - from).num_milliseconds().max(1);
        from + Duration::milliseconds(self.rng.gen_range(0..span_ms))
    }

    /// Rejection-sample `count` instants satisfying `accept`
    fn sample_matching(
        &mut self,
        window: (Timestamp, Timestamp),
        count: usize,
        accept: impl Fn(&Timestamp) -> bool,
    ) -> Result<Vec<Timestamp>> {
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let mut found = None;
            for _ in 0..MAX_DRAWS_PER_JOB {
                let candidate = self.random_time(window);
                if accept(&candidate) {
                    found = Some(candidate);
                    break;
                }
            }
            match found {
                Some(t) => out.push(t),
                None => {
                    return Err(SimError::config(format!(
                        "arrival window {} .. {} never matches the requested spike period",
                        window.0, window.1
                    )));
                }
            }
        }
        Ok(out)
    }
}

fn uniform_starts((from, to): (Timestamp, Timestamp), count: usize) -> Vec<Timestamp> {
    let interval_ms = (to - from).num_milliseconds() / count as i64;
    (0..count)
        .map(|i| from + Duration::milliseconds(interval_ms * i as i64))
        .collect()
}

fn is_weekend(t: &Timestamp) -> bool {
    matches!(t.weekday(), Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intensity::CarbonSeries;
    use chrono::{TimeZone, Utc};

    // 2024-01-01 is a Monday
    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn two_weeks() -> CarbonSeries {
        CarbonSeries::flat(t0(), 14 * 24, Duration::hours(1), 200.0).unwrap()
    }

    fn assert_sorted_in_range(jobs: &[Job], series: &CarbonSeries, due: Duration) {
        for pair in jobs.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
        }
        for (i, job) in jobs.iter().enumerate() {
            assert_eq!(job.id, i as u64);
            assert!(job.start_time >= series.start_date());
            assert!(job.due_time <= series.end_date());
            assert_eq!(job.due_time - job.start_time, due);
            assert!(job.model.is_none());
            assert!(job.end_time.is_none());
        }
    }

    #[test]
    fn test_pattern_parsing() {
        assert_eq!("uniform".parse::<WorkloadPattern>().unwrap(), WorkloadPattern::Uniform);
        assert_eq!(
            "morningSpike".parse::<WorkloadPattern>().unwrap(),
            WorkloadPattern::MorningSpike
        );
        assert_eq!(
            "WEEKENDSPIKE".parse::<WorkloadPattern>().unwrap(),
            WorkloadPattern::WeekendSpike
        );
        assert!("normal".parse::<WorkloadPattern>().is_err());
        assert_eq!(WorkloadPattern::NightSpike.to_string(), "nightSpike");
    }

    #[test]
    fn test_uniform_spacing() {
        let series = CarbonSeries::flat(t0(), 10, Duration::hours(1), 1.0).unwrap();
        let mut generator = JobStreamGenerator::new(&series, 1);

        let jobs = generator
            .generate(WorkloadPattern::Uniform, 4, Duration::hours(2))
            .unwrap();

        // 8 hour arrival window split four ways
        let starts: Vec<Timestamp> = jobs.iter().map(|j| j.start_time).collect();
        assert_eq!(
            starts,
            vec![t0(), t0() + Duration::hours(2), t0() + Duration::hours(4), t0() + Duration::hours(6)]
        );
        assert_sorted_in_range(&jobs, &series, Duration::hours(2));
    }

    #[test]
    fn test_random_is_seeded() {
        let series = two_weeks();
        let a = JobStreamGenerator::new(&series, 9)
            .generate(WorkloadPattern::Random, 50, Duration::hours(1))
            .unwrap();
        let b = JobStreamGenerator::new(&series, 9)
            .generate(WorkloadPattern::Random, 50, Duration::hours(1))
            .unwrap();

        assert_sorted_in_range(&a, &series, Duration::hours(1));
        let starts_a: Vec<_> = a.iter().map(|j| j.start_time).collect();
        let starts_b: Vec<_> = b.iter().map(|j| j.start_time).collect();
        assert_eq!(starts_a, starts_b);
    }

    #[test]
    fn test_morning_spike_share() {
        let series = two_weeks();
        let jobs = JobStreamGenerator::new(&series, 3)
            .generate(WorkloadPattern::MorningSpike, 100, Duration::minutes(30))
            .unwrap();

        assert_eq!(jobs.len(), 100);
        assert_sorted_in_range(&jobs, &series, Duration::minutes(30));
        let in_window = jobs
            .iter()
            .filter(|j| (5..12).contains(&j.start_time.hour()))
            .count();
        assert_eq!(in_window, 80);
    }

    #[test]
    fn test_weekend_spike_defaults_to_all_weekend() {
        let series = two_weeks();
        let jobs = JobStreamGenerator::new(&series, 5)
            .generate(WorkloadPattern::WeekendSpike, 40, Duration::hours(6))
            .unwrap();

        assert!(jobs.iter().all(|j| is_weekend(&j.start_time)));
    }

    #[test]
    fn test_weekday_spike_with_fraction() {
        let series = two_weeks();
        let jobs = JobStreamGenerator::new(&series, 5)
            .with_spike_fraction(0.5)
            .generate(WorkloadPattern::WeekdaySpike, 40, Duration::hours(1))
            .unwrap();

        let weekdays = jobs.iter().filter(|j| !is_weekend(&j.start_time)).count();
        assert_eq!(weekdays, 20);
    }

    #[test]
    fn test_due_offset_too_large() {
        let series = CarbonSeries::flat(t0(), 2, Duration::hours(1), 1.0).unwrap();
        let err = JobStreamGenerator::new(&series, 1).generate(WorkloadPattern::Random, 3, Duration::hours(2));

        assert!(matches!(err, Err(SimError::Config(_))));
    }

    #[test]
    fn test_due_offset_beyond_calendar_range() {
        let series = CarbonSeries::flat(t0(), 48, Duration::hours(1), 1.0).unwrap();
        let err = JobStreamGenerator::new(&series, 1).generate(
            WorkloadPattern::Uniform,
            3,
            Duration::hours(3_000_000_000),
        );

        assert!(matches!(err, Err(SimError::Config(_))));
    }

    #[test]
    fn test_unreachable_spike_window() {
        // Monday 00:00 - 04:00 never reaches a weekend
        let series = CarbonSeries::flat(t0(), 4, Duration::hours(1), 1.0).unwrap();
        let err = JobStreamGenerator::new(&series, 1).generate(WorkloadPattern::WeekendSpike, 1, Duration::zero());

        assert!(matches!(err, Err(SimError::Config(_))));
    }
}
