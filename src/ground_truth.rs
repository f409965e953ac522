//! Ground-truth mortality series.
//!
//! The source file is a cumulative daily death table, one row per date, one
//! column per county plus a national total. Revisions occasionally lower a
//! cumulative count, so day differences are clipped at zero, then smoothed
//! with a trailing 7-day moving average.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Name of the national-total column in the source data.
const NATIONAL_COLUMN: &str = "Összesen";

/// Trailing window of the moving average, in days.
const SMOOTHING_DAYS: usize = 7;

/// Per-county and national observed-death series, shared read-only across
/// the whole sweep.
#[derive(Debug)]
pub struct GroundTruthSeries {
    counties: BTreeMap<String, Vec<f64>>,
    national: Vec<f64>,
    len: usize,
    /// Date of sample 0, when the source's date column parses.
    pub start_date: Option<NaiveDate>,
}

/// A length-bounded view used to compare one candidate shift.
#[derive(Debug, Clone, Copy)]
pub struct GroundTruthWindow<'a> {
    series: &'a GroundTruthSeries,
    start: usize,
    len: usize,
}

/// Difference a cumulative series, clipping negative revisions to zero.
fn daily_increments(cumulative: &[f64]) -> Vec<f64> {
    cumulative
        .windows(2)
        .map(|w| (w[1] - w[0]).max(0.0))
        .collect()
}

/// Trailing moving average; the first `window - 1` samples are dropped.
fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if values.len() < window {
        return Vec::new();
    }
    values
        .windows(window)
        .map(|w| w.iter().sum::<f64>() / window as f64)
        .collect()
}

impl GroundTruthSeries {
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("opening ground truth {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("reading ground truth {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        if headers.len() < 2 {
            bail!("ground truth needs a date column and at least one region column");
        }

        let mut dates: Vec<String> = Vec::new();
        // cumulative counts per region column, forward-filled over gaps
        let mut cumulative: Vec<Vec<f64>> = vec![Vec::new(); headers.len() - 1];
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            dates.push(record.get(0).unwrap_or("").to_string());
            for (col, series) in cumulative.iter_mut().enumerate() {
                let cell = record.get(col + 1).unwrap_or("").trim();
                let value = if cell.is_empty() {
                    series.last().copied().unwrap_or(0.0)
                } else {
                    cell.parse().with_context(|| {
                        format!("non-numeric cell {cell:?} at row {row}, column {:?}", &headers[col + 1])
                    })?
                };
                series.push(value);
            }
        }

        let rows = dates.len();
        if rows < SMOOTHING_DAYS + 1 {
            bail!("ground truth has only {rows} rows, need at least {}", SMOOTHING_DAYS + 1);
        }

        let mut counties = BTreeMap::new();
        let mut national = None;
        for (col, series) in cumulative.iter().enumerate() {
            let name = &headers[col + 1];
            let smoothed = smooth(&daily_increments(series), SMOOTHING_DAYS);
            if name == NATIONAL_COLUMN {
                national = Some(smoothed);
            } else {
                counties.insert(name.to_string(), smoothed);
            }
        }
        let national =
            national.with_context(|| format!("missing national column {NATIONAL_COLUMN:?}"))?;
        let len = national.len();

        // smoothing drops the first SMOOTHING_DAYS source rows
        let start_date = dates
            .get(SMOOTHING_DAYS)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());

        Ok(GroundTruthSeries { counties, national, len, start_date })
    }

    /// Number of smoothed samples per series.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn has_county(&self, name: &str) -> bool {
        self.counties.contains_key(name)
    }

    /// County names carrying ground-truth coverage, in name order.
    pub fn county_names(&self) -> impl Iterator<Item = &str> {
        self.counties.keys().map(String::as_str)
    }

    /// A `len`-day view starting at sample `start`, or `None` if it would
    /// run past either end of the series.
    pub fn window(&self, start: usize, len: usize) -> Option<GroundTruthWindow<'_>> {
        if start + len > self.len {
            return None;
        }
        Some(GroundTruthWindow { series: self, start, len })
    }
}

impl<'a> GroundTruthWindow<'a> {
    pub fn national(&self) -> &'a [f64] {
        &self.series.national[self.start..self.start + self.len]
    }

    pub fn national_sum(&self) -> f64 {
        self.national().iter().sum()
    }

    pub fn county(&self, name: &str) -> Option<&'a [f64]> {
        self.series
            .counties
            .get(name)
            .map(|series| &series[self.start..self.start + self.len])
    }
}
