//! Grid carbon-intensity time series
//!
//! Holds the ordered `(timestamp, kgCO2/MWh)` samples for one region at a
//! fixed resolution and answers floor lookups for the accounting engine
//! and the temporal policies.
//!
//! Data usually comes from a regional CSV export with the header
//! `start_date,generated_rate_kg_per_mwh`; [`crate::grid_data`] produces
//! synthetic traces with the same shape.

use std::fs;
use std::path::Path;

use carbonshift_core::{CarbonIntensityProvider, CarbonSample, Result, SimError, Timestamp};
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use tracing::info;

/// Sampling resolution assumed when it cannot be inferred
pub const DEFAULT_RESOLUTION_MINUTES: i64 = 5;

const TIMESTAMP_COLUMN: &str = "start_date";
const INTENSITY_COLUMN: &str = "generated_rate_kg_per_mwh";

/// Immutable carbon-intensity series for a single simulation run
#[derive(Debug, Clone)]
pub struct CarbonSeries {
    samples: Vec<CarbonSample>,
    resolution: Duration,
}

impl CarbonSeries {
    /// Build a series from samples sorted by strictly increasing timestamp
    pub fn new(samples: Vec<CarbonSample>, resolution: Duration) -> Result<Self> {
        if samples.is_empty() {
            return Err(SimError::config("carbon series has no samples"));
        }
        if resolution <= Duration::zero() {
            return Err(SimError::config(format!(
                "carbon series resolution must be positive, got {resolution}"
            )));
        }
        for pair in samples.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(SimError::config(format!(
                    "carbon samples must be strictly increasing: {} then {}",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }
        if let Some(bad) = samples
            .iter()
            .find(|s| !s.intensity.is_finite() || s.intensity < 0.0)
        {
            return Err(SimError::config(format!(
                "invalid carbon intensity {} at {}",
                bad.intensity, bad.timestamp
            )));
        }

        Ok(CarbonSeries { samples, resolution })
    }

    /// Build a series, inferring the resolution from the first two samples
    pub fn from_samples(samples: Vec<CarbonSample>) -> Result<Self> {
        let resolution = match samples.as_slice() {
            [first, second, ..] => second.timestamp - first.timestamp,
            _ => Duration::minutes(DEFAULT_RESOLUTION_MINUTES),
        };
        Self::new(samples, resolution)
    }

    /// Evenly spaced samples starting at `start`
    pub fn from_intensities(start: Timestamp, resolution: Duration, intensities: &[f64]) -> Result<Self> {
        let mut samples = Vec::with_capacity(intensities.len());
        let mut timestamp = start;
        for (i, &intensity) in intensities.iter().enumerate() {
            if i > 0 {
                timestamp = timestamp
                    .checked_add_signed(resolution)
                    .ok_or_else(|| SimError::config(format!("carbon series overflows after {timestamp}")))?;
            }
            samples.push(CarbonSample::new(timestamp, intensity));
        }
        Self::new(samples, resolution)
    }

    /// Constant-intensity series (deterministic, for testing)
    pub fn flat(start: Timestamp, entries: usize, resolution: Duration, intensity: f64) -> Result<Self> {
        Self::from_intensities(start, resolution, &vec![intensity; entries])
    }

    /// Load a regional CSV export
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let series = Self::from_csv_str(&content)?;
        info!(
            "Loaded {} carbon samples from {} ({} .. {})",
            series.num_entries(),
            path.display(),
            series.start_date(),
            series.end_date()
        );
        Ok(series)
    }

    /// Parse CSV text with a `start_date` and `generated_rate_kg_per_mwh` column
    ///
    /// Plain comma-separated fields only; quoted fields are rejected.
    pub fn from_csv_str(content: &str) -> Result<Self> {
        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| SimError::config("carbon CSV is empty"))?;
        if header.contains('"') {
            return Err(SimError::config("carbon CSV header: quoted fields are not supported"));
        }
        let columns: Vec<&str> = header.split(',').map(str::trim).collect();
        let column = |name: &str| {
            columns
                .iter()
                .position(|c| *c == name)
                .ok_or_else(|| SimError::config(format!("carbon CSV missing column '{name}'")))
        };
        let ts_col = column(TIMESTAMP_COLUMN)?;
        let intensity_col = column(INTENSITY_COLUMN)?;

        let mut samples = Vec::new();
        for (row, line) in lines.enumerate() {
            if line.contains('"') {
                return Err(SimError::config(format!(
                    "carbon CSV row {}: quoted fields are not supported",
                    row + 2
                )));
            }
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let field = |idx: usize| {
                fields.get(idx).copied().ok_or_else(|| {
                    SimError::config(format!("carbon CSV row {} has too few fields", row + 2))
                })
            };
            let timestamp = parse_timestamp(field(ts_col)?)?;
            let raw = field(intensity_col)?;
            let intensity = raw.parse::<f64>().map_err(|e| {
                SimError::config(format!("carbon CSV row {}: bad intensity '{raw}': {e}", row + 2))
            })?;
            samples.push(CarbonSample::new(timestamp, intensity));
        }

        Self::from_samples(samples)
    }

    pub fn resolution(&self) -> Duration {
        self.resolution
    }

    pub fn samples(&self) -> &[CarbonSample] {
        &self.samples
    }
}

impl CarbonIntensityProvider for CarbonSeries {
    fn num_entries(&self) -> usize {
        self.samples.len()
    }

    fn start_date(&self) -> Timestamp {
        self.samples[0].timestamp
    }

    fn end_date(&self) -> Timestamp {
        self.last_sample().timestamp + self.resolution
    }

    fn sample_at(&self, index: usize) -> CarbonSample {
        self.samples[index]
    }

    fn index_floor(&self, at: Timestamp) -> Result<usize> {
        if at < self.start_date() || at > self.end_date() {
            return Err(SimError::DataRange {
                at,
                start: self.start_date(),
                end: self.end_date(),
            });
        }
        // at >= first timestamp, so at least one sample satisfies the predicate
        Ok(self.samples.partition_point(|s| s.timestamp <= at) - 1)
    }
}

/// RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC
fn parse_timestamp(raw: &str) -> Result<Timestamp> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| SimError::config(format!("bad timestamp '{raw}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn t0() -> Timestamp {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    fn hourly(intensities: &[f64]) -> CarbonSeries {
        CarbonSeries::from_intensities(t0(), Duration::hours(1), intensities).unwrap()
    }

    #[test]
    fn test_bounds() {
        let series = hourly(&[100.0, 200.0, 300.0]);

        assert_eq!(series.num_entries(), 3);
        assert_eq!(series.start_date(), t0());
        // Last sample + one interval
        assert_eq!(series.end_date(), t0() + Duration::hours(3));
        assert_eq!(series.sample_at(1).intensity, 200.0);
    }

    #[test]
    fn test_index_floor() {
        let series = hourly(&[100.0, 200.0, 300.0]);

        assert_eq!(series.index_floor(t0()).unwrap(), 0);
        assert_eq!(series.index_floor(t0() + Duration::minutes(59)).unwrap(), 0);
        assert_eq!(series.index_floor(t0() + Duration::hours(1)).unwrap(), 1);
        assert_eq!(series.index_floor(t0() + Duration::minutes(150)).unwrap(), 2);
        assert_eq!(series.index_floor(series.end_date()).unwrap(), 2);
    }

    #[test]
    fn test_index_floor_out_of_range() {
        let series = hourly(&[100.0, 200.0]);

        let before = series.index_floor(t0() - Duration::seconds(1));
        assert!(matches!(before, Err(SimError::DataRange { .. })));

        let after = series.index_floor(series.end_date() + Duration::seconds(1));
        assert!(matches!(after, Err(SimError::DataRange { .. })));
    }

    #[test]
    fn test_rejects_bad_samples() {
        assert!(CarbonSeries::from_samples(Vec::new()).is_err());

        let unsorted = vec![
            CarbonSample::new(t0() + Duration::hours(1), 1.0),
            CarbonSample::new(t0(), 1.0),
        ];
        assert!(matches!(
            CarbonSeries::from_samples(unsorted),
            Err(SimError::Config(_))
        ));

        let negative = vec![CarbonSample::new(t0(), -5.0)];
        assert!(CarbonSeries::from_samples(negative).is_err());
    }

    #[test]
    fn test_resolution_inferred() {
        let series = CarbonSeries::from_samples(vec![
            CarbonSample::new(t0(), 1.0),
            CarbonSample::new(t0() + Duration::minutes(15), 2.0),
        ])
        .unwrap();
        assert_eq!(series.resolution(), Duration::minutes(15));

        let single = CarbonSeries::from_samples(vec![CarbonSample::new(t0(), 1.0)]).unwrap();
        assert_eq!(single.resolution(), Duration::minutes(DEFAULT_RESOLUTION_MINUTES));
    }

    #[test]
    fn test_csv_parsing() {
        let csv = "\
start_date,generated_rate_kg_per_mwh
2024-01-01T00:00:00Z,250.5
2024-01-01 00:05:00,240
2024-01-01 00:10:00+00:00,230.25
";
        let series = CarbonSeries::from_csv_str(csv).unwrap();

        assert_eq!(series.num_entries(), 3);
        assert_eq!(series.resolution(), Duration::minutes(5));
        assert_eq!(series.sample_at(0).intensity, 250.5);
        assert_eq!(series.sample_at(2).timestamp, t0() + Duration::minutes(10));
    }

    #[test]
    fn test_csv_column_order_and_errors() {
        let csv = "generated_rate_kg_per_mwh,start_date\n10,2024-01-01T00:00:00Z\n";
        let series = CarbonSeries::from_csv_str(csv).unwrap();
        assert_eq!(series.sample_at(0).intensity, 10.0);

        let missing = "start_date,intensity\n2024-01-01T00:00:00Z,10\n";
        assert!(matches!(
            CarbonSeries::from_csv_str(missing),
            Err(SimError::Config(_))
        ));

        let bad_value = "start_date,generated_rate_kg_per_mwh\n2024-01-01T00:00:00Z,abc\n";
        assert!(CarbonSeries::from_csv_str(bad_value).is_err());
    }

    #[test]
    fn test_csv_rejects_quoted_fields() {
        let quoted_row = "start_date,generated_rate_kg_per_mwh\n\"2024-01-01T00:00:00Z\",\"1,024\"\n";
        let err = CarbonSeries::from_csv_str(quoted_row);
        assert!(matches!(err, Err(SimError::Config(ref msg)) if msg.contains("quoted")));

        let quoted_header = "\"start_date\",\"generated_rate_kg_per_mwh\"\n2024-01-01T00:00:00Z,10\n";
        assert!(matches!(
            CarbonSeries::from_csv_str(quoted_header),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn test_csv_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "start_date,generated_rate_kg_per_mwh").unwrap();
        writeln!(file, "2024-01-01T00:00:00Z,100").unwrap();
        writeln!(file, "2024-01-01T00:05:00Z,50").unwrap();

        let series = CarbonSeries::from_csv_path(file.path()).unwrap();
        assert_eq!(series.num_entries(), 2);
        assert_eq!(series.last_sample().intensity, 50.0);
    }
}
