use serde::{Deserialize, Serialize};

use super::{FitError, LineFit};

/// Default audio sample rate, in Hz.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

const NANOS_PER_SECOND: f64 = 1e9;
const PARTS_PER_BILLION: f64 = 1e9;

/// Clock relationship between two fitted sample files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub sample_rate: u32,
    pub ppb_frequency_difference: f64,
    /// `|intercept1 - intercept2|`, in ns.
    pub offset_ns: f64,
    pub offset_samples: f64,
    /// Offset rounded to whole samples; negative when the first file starts earlier.
    pub rounded_offset_samples: i64,
    pub rounded_offset_ns: f64,
    pub max_instantaneous_offset_ns: f64,
    /// Maximum instantaneous offset as a fraction of one sample period.
    pub max_instantaneous_offset_fraction: f64,
}

impl Comparison {
    pub fn sample_period_ns(&self) -> f64 {
        sample_period_ns(self.sample_rate)
    }

    pub fn quarter_sample_ns(&self) -> f64 {
        self.sample_period_ns() / 4.0
    }
}

fn sample_period_ns(sample_rate: u32) -> f64 {
    NANOS_PER_SECOND / f64::from(sample_rate)
}

/// Compare two fits over the same number of points.
///
/// The instantaneous offset is measured against the rounded offset, so it
/// shows how far the two streams drift from a whole-sample alignment.
pub fn compare_fits(
    first: &LineFit,
    second: &LineFit,
    sample_rate: u32,
) -> Result<Comparison, FitError> {
    if first.timestamps.len() != second.timestamps.len() {
        return Err(FitError::LengthMismatch {
            first: first.timestamps.len(),
            second: second.timestamps.len(),
        });
    }

    let rate = f64::from(sample_rate);
    let period_ns = sample_period_ns(sample_rate);
    let ppb = (first.slope - second.slope).abs() / first.slope * PARTS_PER_BILLION;
    let offset_ns = (first.intercept - second.intercept).abs();
    let offset_samples = offset_ns * rate / NANOS_PER_SECOND;
    let whole_samples = (offset_samples + 0.5).floor();

    let sign = if first.intercept < second.intercept {
        -1.0
    } else {
        1.0
    };
    let rounded_offset_ns = sign * whole_samples * NANOS_PER_SECOND / rate;
    let max_instantaneous_offset_ns = first
        .timestamps
        .iter()
        .zip(&second.timestamps)
        .map(|(a, b)| ((a - b) - rounded_offset_ns).abs())
        .fold(0.0f64, f64::max);

    Ok(Comparison {
        sample_rate,
        ppb_frequency_difference: ppb,
        offset_ns,
        offset_samples,
        rounded_offset_samples: (sign * whole_samples) as i64,
        rounded_offset_ns,
        max_instantaneous_offset_ns,
        max_instantaneous_offset_fraction: max_instantaneous_offset_ns / period_ns,
    })
}
