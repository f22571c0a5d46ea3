//! Carbon accounting over a piecewise-constant intensity series
//!
//! Each sample's intensity holds from its timestamp until the next sample;
//! the last sample is extrapolated past the end of the data. Emissions for
//! an interval are the sum over the covered sub-intervals of
//! `seconds × MW × kgCO2/MWh × CARBON_CONVERSION`.

use carbonshift_core::{CarbonIntensityProvider, Job, ModelDefinition, Result, SimError, Timestamp};
use chrono::Duration;
use tracing::trace;

/// Converts seconds × MW × kgCO2/MWh into grams of CO2
pub const CARBON_CONVERSION: f64 = 3.6e-6;

/// Grams of CO2 emitted by drawing `power_mw` over `[start, end)`.
///
/// `start` must fall inside the series (see
/// [`CarbonIntensityProvider::index_floor`]); `end` may run past the data.
/// An empty interval emits nothing.
pub fn integrate<P>(series: &P, start: Timestamp, end: Timestamp, power_mw: f64) -> Result<f64>
where
    P: CarbonIntensityProvider + ?Sized,
{
    if end < start {
        return Err(SimError::interval(format!("end {end} precedes start {start}")));
    }
    if end == start {
        return Ok(0.0);
    }

    let last = series.num_entries() - 1;
    let mut idx = series.index_floor(start)?;
    let mut current = start;
    let mut total = 0.0;

    while current < end {
        let next = if idx < last {
            series.sample_at(idx + 1).timestamp.min(end)
        } else {
            // Past the final sample: constant extrapolation
            end
        };

        let seconds = seconds_between(current, next);
        if seconds <= 0.0 {
            return Err(SimError::interval(format!(
                "non-positive sub-interval {current} .. {next}"
            )));
        }

        let intensity = series.sample_at(idx).intensity;
        total += seconds * power_mw * intensity * CARBON_CONVERSION;

        current = next;
        idx += 1;
    }

    Ok(total)
}

/// Predicted carbon for running `model` from `start` for its mean runtime
/// plus `safeguard_std_devs` standard deviations
pub fn estimate_carbon_at<P>(
    series: &P,
    start: Timestamp,
    model: &ModelDefinition,
    safeguard_std_devs: f64,
) -> Result<f64>
where
    P: CarbonIntensityProvider + ?Sized,
{
    let runtime = model.buffered_runtime(safeguard_std_devs).max(Duration::zero());
    let carbon = integrate(series, start, start + runtime, model.energy_usage)?;
    trace!(
        "[PREDICT] {} from {} for {}s: {:.6} gCO2",
        model.model_name,
        start,
        runtime.num_seconds(),
        carbon
    );
    Ok(carbon)
}

/// Predicted carbon for running `job` on `model` at the job's current start time
pub fn estimate_carbon<P>(series: &P, job: &Job, model: &ModelDefinition, safeguard_std_devs: f64) -> Result<f64>
where
    P: CarbonIntensityProvider + ?Sized,
{
    estimate_carbon_at(series, job.start_time, model, safeguard_std_devs)
}

fn seconds_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).num_milliseconds() as f64 / 1000.0
}
