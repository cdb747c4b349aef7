//! Least-squares line fitting of sample files.
//!
//! A fit summarises how far the extracted presentation times stray from a
//! straight line: slope (ns per sample), intercept, maximum deviation and a
//! 1 ns residual histogram. Two fits over the same sample count can be
//! compared to get the frequency difference and time offset of two clocks.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::DEFAULT_COUNT;
use crate::samples::{SampleError, read_points};

mod compare;
mod histogram;
pub mod plot;

pub use compare::{Comparison, DEFAULT_SAMPLE_RATE, compare_fits};
pub use histogram::Histogram;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("Input error: {0}")]
    Input(#[from] SampleError),
    #[error("not enough rows: need {needed}, found {available}")]
    NotEnoughRows { needed: usize, available: usize },
    #[error("cannot fit a line through {count} points with no spread in x")]
    DegenerateFit { count: usize },
    #[error("cannot compare fits over {first} and {second} points")]
    LengthMismatch { first: usize, second: usize },
}

/// Options of a `fitline` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitOptions {
    /// Leading rows of each file to fit.
    pub count: usize,
    /// Audio sample rate used to express offsets in samples.
    pub sample_rate: u32,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT as usize,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Fitted line together with the data it was fitted to.
#[derive(Debug, Clone, PartialEq)]
pub struct LineFit {
    pub source: String,
    pub slope: f64,
    pub intercept: f64,
    pub max_deviation: f64,
    pub histogram: Histogram,
    /// Fitted minus actual y, per point.
    pub residuals: Vec<f64>,
    /// Actual y values, per point.
    pub timestamps: Vec<f64>,
}

/// Serializable view of a [`LineFit`] without the per-point arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub file: String,
    pub count: usize,
    pub slope: f64,
    pub intercept: f64,
    pub max_deviation: f64,
    pub histogram: Histogram,
}

impl LineFit {
    pub fn count(&self) -> usize {
        self.timestamps.len()
    }

    pub fn report(&self) -> FitReport {
        FitReport {
            file: self.source.clone(),
            count: self.count(),
            slope: self.slope,
            intercept: self.intercept,
            max_deviation: self.max_deviation,
            histogram: self.histogram.clone(),
        }
    }
}

/// Fit the first `count` rows of a sample file.
pub fn fit_file(path: &Path, count: usize) -> Result<LineFit, FitError> {
    let points = read_points(path, count)?;
    fit_points(path.display().to_string(), &points, count)
}

/// Ordinary least squares over the first `count` points.
///
/// # Examples
/// ```
/// use astime_core::fit_points;
///
/// let points = [(0.0, 1000.0), (1.0, 1100.0), (2.0, 1200.0), (3.0, 1300.0)];
/// let fit = fit_points("inline", &points, 4).unwrap();
/// assert_eq!(fit.slope, 100.0);
/// assert_eq!(fit.intercept, 1000.0);
/// assert_eq!(fit.max_deviation, 0.0);
/// ```
pub fn fit_points(
    source: impl Into<String>,
    points: &[(f64, f64)],
    count: usize,
) -> Result<LineFit, FitError> {
    if points.len() < count {
        return Err(FitError::NotEnoughRows {
            needed: count,
            available: points.len(),
        });
    }
    let points = &points[..count];
    if count < 2 {
        return Err(FitError::DegenerateFit { count });
    }

    let n = count as f64;
    let (sum_x, sum_y) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    let (mean_x, mean_y) = (sum_x / n, sum_y / n);
    let (sxx, sxy) = points.iter().fold((0.0, 0.0), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if sxx == 0.0 {
        return Err(FitError::DegenerateFit { count });
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    if !(slope.is_finite() && intercept.is_finite()) {
        return Err(FitError::DegenerateFit { count });
    }
    let residuals: Vec<f64> = points
        .iter()
        .map(|(x, y)| x * slope + intercept - y)
        .collect();
    let max_deviation = residuals.iter().fold(0.0f64, |max, r| max.max(r.abs()));
    let histogram = Histogram::of_residuals(&residuals, max_deviation);

    let source = source.into();
    debug!(
        source = %source,
        count,
        slope,
        intercept,
        max_deviation,
        bins = histogram.bin_count(),
        "fitted line"
    );
    Ok(LineFit {
        source,
        slope,
        intercept,
        max_deviation,
        histogram,
        residuals,
        timestamps: points.iter().map(|(_, y)| *y).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::{FitError, fit_points};

    fn line(slope: f64, intercept: f64, n: usize) -> Vec<(f64, f64)> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                (x, slope * x + intercept)
            })
            .collect()
    }

    #[test]
    fn four_point_line() {
        let points = [(0.0, 1000.0), (1.0, 1100.0), (2.0, 1200.0), (3.0, 1300.0)];
        let fit = fit_points("four", &points, 4).unwrap();
        assert_eq!(fit.slope, 100.0);
        assert_eq!(fit.intercept, 1000.0);
        assert_eq!(fit.max_deviation, 0.0);
        assert_eq!(fit.histogram.dense(16), Some((vec![-1, 0, 1], vec![0, 4])));
        assert_eq!(fit.timestamps, vec![1000.0, 1100.0, 1200.0, 1300.0]);
    }

    #[test]
    fn recovers_exact_line_at_capture_scale() {
        let points = line(125_000.0, 4_294_967_396.0, 100);
        let fit = fit_points("exact", &points, 100).unwrap();
        assert!((fit.slope - 125_000.0).abs() < 1e-6);
        assert!((fit.intercept - 4_294_967_396.0).abs() < 1e-3);
        assert!(fit.max_deviation < 1e-3);
        assert_eq!(fit.histogram.total(), 100);
    }

    #[test]
    fn residuals_are_fitted_minus_actual() {
        let points = [(0.0, 0.0), (1.0, 12.0), (2.0, 20.0), (3.0, 30.0)];
        let fit = fit_points("noisy", &points, 4).unwrap();
        for ((x, y), residual) in points.iter().zip(&fit.residuals) {
            let fitted = fit.slope * x + fit.intercept;
            assert!((residual - (fitted - y)).abs() < 1e-9);
        }
        assert!(fit.max_deviation > 0.0);
        assert_eq!(fit.histogram.total(), 4);
        let half = fit.max_deviation.ceil() as i64 + 1;
        assert_eq!((fit.histogram.low, fit.histogram.high), (-half, half));
    }

    #[test]
    fn dropped_packets_still_produce_a_report() {
        // Twenty lost 125 µs packets halfway through shift the tail by 2.5 ms.
        let points: Vec<(f64, f64)> = (0..100)
            .map(|i| {
                let slot = if i >= 50 { i + 20 } else { i };
                (i as f64, 125_000.0 * slot as f64)
            })
            .collect();
        let fit = fit_points("dropped", &points, 100).unwrap();

        assert!(fit.max_deviation > 1_000_000.0);
        assert_eq!(fit.histogram.total(), 100);
        assert_eq!(fit.histogram.high, fit.max_deviation.ceil() as i64 + 1);
        assert!(fit.histogram.bin_count() > 2_000_000);
        assert!(fit.histogram.counts.len() <= 100);
        assert_eq!(fit.histogram.dense(1024), None);
    }

    #[test]
    fn uses_only_leading_rows() {
        let mut points = line(10.0, 5.0, 3);
        points.push((3.0, 1e9));
        let fit = fit_points("prefix", &points, 3).unwrap();
        assert!((fit.slope - 10.0).abs() < 1e-9);
        assert_eq!(fit.count(), 3);
    }

    #[test]
    fn too_few_rows() {
        let err = fit_points("short", &line(1.0, 0.0, 3), 5).unwrap_err();
        assert!(matches!(
            err,
            FitError::NotEnoughRows {
                needed: 5,
                available: 3
            }
        ));
    }

    #[test]
    fn degenerate_inputs() {
        let single = fit_points("one", &[(0.0, 1.0)], 1).unwrap_err();
        assert!(matches!(single, FitError::DegenerateFit { count: 1 }));

        let vertical = [(2.0, 1.0), (2.0, 5.0), (2.0, 9.0)];
        let err = fit_points("vertical", &vertical, 3).unwrap_err();
        assert!(matches!(err, FitError::DegenerateFit { count: 3 }));
    }

    #[test]
    fn report_drops_point_arrays() {
        let fit = fit_points("report", &line(2.0, 1.0, 10), 10).unwrap();
        let report = fit.report();
        assert_eq!(report.file, "report");
        assert_eq!(report.count, 10);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("residuals").is_none());
        assert_eq!(json["histogram"]["counts"].as_object().unwrap().len(), 1);
        assert_eq!(json["histogram"]["counts"]["0"], 10);
    }
}
