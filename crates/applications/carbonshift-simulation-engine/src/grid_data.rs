//! Synthetic carbon-intensity generation using Ornstein-Uhlenbeck process
//!
//! Models grid intensity as a mean-reverting stochastic process with:
//! - A daily solar dip around midday
//! - Gaussian volatility similar to real balancing-authority traces
//! - A hard floor so intensity never goes negative

use carbonshift_core::{CarbonSample, Result, SimError, Timestamp};
use chrono::{Duration, Timelike};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

use crate::intensity::CarbonSeries;

/// Longest synthetic trace, ten years
pub const MAX_SYNTHETIC_DAYS: u32 = 3660;

const SECONDS_PER_DAY: i64 = 86_400;

/// Carbon-intensity generator using Ornstein-Uhlenbeck process
pub struct GridIntensityGenerator {
    mean_intensity: f64,
    volatility: f64,
    mean_reversion_speed: f64,
    solar_dip: f64,
    current: f64,
    rng: StdRng,
}

impl GridIntensityGenerator {
    /// Create a new generator
    ///
    /// # Arguments
    /// * `mean_intensity` - Long-run mean in kgCO2/MWh (e.g. 250.0)
    /// * `seed` - RNG seed, same seed gives the same trace
    pub fn new(mean_intensity: f64, seed: u64) -> Self {
        GridIntensityGenerator {
            mean_intensity,
            volatility: 0.15 * mean_intensity, // per sqrt(hour)
            mean_reversion_speed: 0.5,
            solar_dip: 0.35, // midday intensity drops 35%
            current: mean_intensity,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Override the volatility (kgCO2/MWh per sqrt(hour))
    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = volatility;
        self
    }

    /// Generate a series covering `days` days at `resolution`
    pub fn generate(&mut self, start: Timestamp, days: u32, resolution: Duration) -> Result<CarbonSeries> {
        if days == 0 || days > MAX_SYNTHETIC_DAYS || resolution <= Duration::zero() {
            return Err(SimError::config(format!(
                "synthetic carbon series needs 1..={MAX_SYNTHETIC_DAYS} days and a positive resolution, got {days} days"
            )));
        }
        let num_samples = (i64::from(days) * SECONDS_PER_DAY / resolution.num_seconds().max(1)) as usize;
        let dt = resolution.num_seconds() as f64 / 3600.0;
        let mut samples = Vec::with_capacity(num_samples);

        let mut timestamp = start;
        for i in 0..num_samples {
            if i > 0 {
                timestamp = timestamp
                    .checked_add_signed(resolution)
                    .ok_or_else(|| SimError::config(format!("synthetic carbon series overflows after {timestamp}")))?;
            }

            // dX = θ(μ - X)dt + σdW
            let dw: f64 = StandardNormal.sample(&mut self.rng);
            let dw = dw * dt.sqrt();
            self.current += self.mean_reversion_speed * (self.mean_intensity - self.current) * dt
                + self.volatility * dw;

            // Solar dip peaks at 13:00 and vanishes at night
            let hour = timestamp.hour() as f64 + timestamp.minute() as f64 / 60.0;
            let solar = (std::f64::consts::PI * (hour - 7.0) / 12.0).sin().max(0.0);
            let daily_factor = 1.0 - self.solar_dip * solar;

            let intensity = (self.current * daily_factor).max(self.mean_intensity * 0.05);
            samples.push(CarbonSample::new(timestamp, intensity));
        }

        CarbonSeries::new(samples, resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carbonshift_core::CarbonIntensityProvider;
    use chrono::{TimeZone, Utc};

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 3, 4, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_generation_shape() {
        let mut generator = GridIntensityGenerator::new(250.0, 7);
        let series = generator.generate(t0(), 2, Duration::minutes(5)).unwrap();

        assert_eq!(series.num_entries(), 2 * 24 * 12);
        assert_eq!(series.resolution(), Duration::minutes(5));
        assert_eq!(series.end_date(), t0() + Duration::days(2));

        for sample in series.samples() {
            assert!(sample.intensity > 0.0);
        }
    }

    #[test]
    fn test_same_seed_same_trace() {
        let a = GridIntensityGenerator::new(300.0, 42)
            .generate(t0(), 1, Duration::hours(1))
            .unwrap();
        let b = GridIntensityGenerator::new(300.0, 42)
            .generate(t0(), 1, Duration::hours(1))
            .unwrap();

        assert_eq!(a.samples(), b.samples());
    }

    #[test]
    fn test_midday_dip_without_noise() {
        let series = GridIntensityGenerator::new(200.0, 1)
            .with_volatility(0.0)
            .generate(t0(), 1, Duration::hours(1))
            .unwrap();

        // No noise: night stays at the mean, 13:00 is the minimum
        assert_eq!(series.sample_at(2).intensity, 200.0);
        let midday = series.sample_at(13).intensity;
        assert!((midday - 200.0 * 0.65).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_empty_range() {
        let mut generator = GridIntensityGenerator::new(200.0, 1);
        assert!(generator.generate(t0(), 0, Duration::hours(1)).is_err());
        assert!(generator.generate(t0(), 1, Duration::zero()).is_err());
    }

    #[test]
    fn test_rejects_oversized_range() {
        let mut generator = GridIntensityGenerator::new(200.0, 1);

        let err = generator.generate(t0(), MAX_SYNTHETIC_DAYS + 1, Duration::minutes(5));
        assert!(matches!(err, Err(SimError::Config(_))));
        assert!(matches!(
            generator.generate(t0(), u32::MAX, Duration::minutes(5)),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_timestamp_overflow_is_config_error() {
        let near_end = Timestamp::MAX_UTC - Duration::hours(2);
        let err = GridIntensityGenerator::new(200.0, 1).generate(near_end, 1, Duration::hours(1));

        assert!(matches!(err, Err(SimError::Config(_))));
    }
}
