use std::collections::HashMap;

use smallvec::SmallVec;

use crate::models::{ColumnDetails, ColumnStat, NumericSummary, TopValue, TOP_VALUES};
use crate::services::dataset::{Column, ColumnValues, Dataset};

pub fn round_to(value: f64, decimals: i32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

pub fn column_stats(dataset: &Dataset) -> Vec<ColumnStat> {
    dataset
        .columns()
        .iter()
        .map(|column| column_stat(column, dataset.height()))
        .collect()
}

pub fn column_stat(column: &Column, total_rows: usize) -> ColumnStat {
    let missing = column.missing();
    let missing_pct = if total_rows == 0 {
        0.0
    } else {
        round_to(missing as f64 / total_rows as f64 * 100.0, 2)
    };

    let (unique, details) = match &column.values {
        ColumnValues::Numeric(values) => {
            let present: Vec<f64> = values.iter().flatten().copied().collect();
            (distinct_floats(&present), ColumnDetails::Numeric(numeric_summary(&present)))
        }
        ColumnValues::Categorical(values) => {
            let counts = value_counts(values);
            let top_values = counts
                .iter()
                .take(TOP_VALUES)
                .map(|(value, count)| TopValue {
                    value: value.to_string(),
                    count: *count,
                    pct: round_to(*count as f64 / total_rows.max(1) as f64 * 100.0, 2),
                })
                .collect::<SmallVec<_>>();
            (counts.len(), ColumnDetails::Categorical { top_values })
        }
    };

    ColumnStat {
        name: column.name.clone(),
        dtype: column.dtype.clone(),
        missing,
        missing_pct,
        unique,
        details,
    }
}

/// Non-missing value frequencies, most frequent first. Ties keep first-appearance order.
pub fn value_counts(values: &[Option<String>]) -> Vec<(&str, usize)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for value in values.iter().flatten() {
        match index.get(value.as_str()) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                index.insert(value.as_str(), counts.len());
                counts.push((value.as_str(), 1));
            }
        }
    }
    // stable sort keeps first-appearance order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

fn distinct_floats(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    sorted.len()
}

pub fn numeric_summary(values: &[f64]) -> NumericSummary {
    if values.is_empty() {
        return NumericSummary::UNDEFINED;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    // a column holding a single distinct value has no defined spread
    let std = if sorted[0] == sorted[sorted.len() - 1] {
        f64::NAN
    } else {
        sample_std(&sorted)
    };

    NumericSummary {
        min: round_to(sorted[0], 4),
        max: round_to(sorted[sorted.len() - 1], 4),
        mean: round_to(mean(&sorted), 4),
        median: round_to(percentile(&sorted, 0.5), 4),
        std: round_to(std, 4),
        q1: round_to(percentile(&sorted, 0.25), 4),
        q3: round_to(percentile(&sorted, 0.75), 4),
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1); `NaN` with fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Linear interpolation between order statistics. `sorted` must be ascending.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let position = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = position.floor() as usize;
            let upper = position.ceil() as usize;
            let weight = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * weight
        }
    }
}
