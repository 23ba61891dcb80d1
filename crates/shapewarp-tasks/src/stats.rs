//! Reactivity statistics.
//!
//! Missing measurements are NaN. Every aggregate skips them and returns
//! `None` when nothing is left.

use serde::{Deserialize, Serialize};

/// Values that are not NaN.
pub fn valid(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    let valid = valid(values);
    if valid.is_empty() {
        return None;
    }
    Some(valid.iter().sum::<f64>() / valid.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    percentile(values, 50.0)
}

/// Standard deviation with `ddof` delta degrees of freedom.
fn std_dev(values: &[f64], ddof: usize) -> Option<f64> {
    let valid = valid(values);
    if valid.len() <= ddof {
        return None;
    }
    let mean = valid.iter().sum::<f64>() / valid.len() as f64;
    let sum_sq: f64 = valid.iter().map(|v| (v - mean).powi(2)).sum();
    Some((sum_sq / (valid.len() - ddof) as f64).sqrt())
}

/// Population standard deviation.
pub fn population_std(values: &[f64]) -> Option<f64> {
    std_dev(values, 0)
}

/// Sample standard deviation (n - 1). Needs at least two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    std_dev(values, 1)
}

pub fn min(values: &[f64]) -> Option<f64> {
    valid(values).into_iter().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    valid(values).into_iter().reduce(f64::max)
}

/// Percentile `q` in `[0, 100]` with linear interpolation between ranks.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    let mut sorted = valid(values);
    if sorted.is_empty() {
        return None;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Min-max normalise to `[0, 1]`, capping values at `cap` first.
///
/// NaN stays NaN. If every valid value is equal they all become 0.5.
pub fn normalize(values: &[f64], cap: Option<f64>) -> Vec<f64> {
    let capped: Vec<f64> = values
        .iter()
        .map(|v| match cap {
            Some(cap) if !v.is_nan() => v.min(cap),
            _ => *v,
        })
        .collect();

    let (Some(lo), Some(hi)) = (min(&capped), max(&capped)) else {
        return values.to_vec();
    };

    capped
        .iter()
        .map(|v| {
            if v.is_nan() {
                f64::NAN
            } else if hi == lo {
                0.5
            } else {
                (v - lo) / (hi - lo)
            }
        })
        .collect()
}

/// Structural state inferred from a reactivity value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Structured,
    Intermediate,
    Flexible,
    NoData,
}

impl Classification {
    pub const ALL: [Classification; 4] = [
        Classification::Structured,
        Classification::Intermediate,
        Classification::Flexible,
        Classification::NoData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Structured => "structured",
            Classification::Intermediate => "intermediate",
            Classification::Flexible => "flexible",
            Classification::NoData => "no_data",
        }
    }
}

/// Below `low` is structured, above `high` is flexible.
pub fn classify(value: f64, low: f64, high: f64) -> Classification {
    if value.is_nan() {
        Classification::NoData
    } else if value < low {
        Classification::Structured
    } else if value > high {
        Classification::Flexible
    } else {
        Classification::Intermediate
    }
}

/// Aggregates over one sliding window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// 1-based start position.
    pub start: usize,
    /// 1-based inclusive end position.
    pub end: usize,
    pub mean_reactivity: Option<f64>,
    pub median_reactivity: Option<f64>,
    pub std_reactivity: Option<f64>,
    pub min_reactivity: Option<f64>,
    pub max_reactivity: Option<f64>,
    /// Fraction of the window with a measurement.
    pub coverage: f64,
}

/// Statistics for every full window of `size` values.
pub fn sliding_windows(values: &[f64], size: usize) -> Vec<WindowStats> {
    if size == 0 || values.len() < size {
        return Vec::new();
    }

    values
        .windows(size)
        .enumerate()
        .map(|(i, window)| WindowStats {
            start: i + 1,
            end: i + size,
            mean_reactivity: mean(window),
            median_reactivity: median(window),
            std_reactivity: population_std(window),
            min_reactivity: min(window),
            max_reactivity: max(window),
            coverage: valid(window).len() as f64 / size as f64,
        })
        .collect()
}
