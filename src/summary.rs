//! Summary statistics of a trimmed case table.
//!
//! Missed cases carry an infinite `time_to_interview`; every delay statistic here is computed
//! over interviewed cases only, and the share of missed cases is reported on its own.

use serde::{Deserialize, Serialize};

use crate::case::CaseRecord;
use crate::define_rng;
use crate::random::RandomStreams;

define_rng!(BootstrapRng);

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub n_cases: usize,
    pub n_interviewed: usize,
    pub n_missed: usize,
    pub missed_proportion: Option<f64>,
    pub mean_time_to_interview: Option<f64>,
    pub median_time_to_interview: Option<f64>,
    pub mean_test_turnaround_time: Option<f64>,
    /// Share of all cases interviewed on their notification day.
    pub interviewed_within_0_days: Option<f64>,
    pub interviewed_within_1_day: Option<f64>,
    pub interviewed_within_2_days: Option<f64>,
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub estimate: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Counts of interviewed cases by whole days from notification to interview, plus missed cases.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DelayHistogram {
    pub counts: Vec<usize>,
    pub missed: usize,
}

fn interview_delays(records: &[CaseRecord]) -> impl Iterator<Item = f64> + '_ {
    records
        .iter()
        .map(|record| record.time_to_interview)
        .filter(|days| days.is_finite())
}

#[allow(clippy::cast_precision_loss)]
fn proportion(count: usize, total: usize) -> Option<f64> {
    (total > 0).then(|| count as f64 / total as f64)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0_usize), |(sum, n), value| (sum + value, n + 1));
    (n > 0).then(|| sum / n as f64)
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

#[must_use]
pub fn missed_proportion(records: &[CaseRecord]) -> Option<f64> {
    let missed = records.iter().filter(|record| record.is_missed()).count();
    proportion(missed, records.len())
}

#[must_use]
pub fn mean_time_to_interview(records: &[CaseRecord]) -> Option<f64> {
    mean(interview_delays(records))
}

fn interviewed_within(records: &[CaseRecord], days: f64) -> Option<f64> {
    let count = interview_delays(records).filter(|&d| d <= days).count();
    proportion(count, records.len())
}

#[must_use]
pub fn summarize(records: &[CaseRecord]) -> Summary {
    let n_missed = records.iter().filter(|record| record.is_missed()).count();
    Summary {
        n_cases: records.len(),
        n_interviewed: records.len() - n_missed,
        n_missed,
        missed_proportion: missed_proportion(records),
        mean_time_to_interview: mean_time_to_interview(records),
        median_time_to_interview: median(interview_delays(records).collect()),
        mean_test_turnaround_time: mean(
            records
                .iter()
                .map(|record| f64::from(record.test_turnaround_time)),
        ),
        interviewed_within_0_days: interviewed_within(records, 0.0),
        interviewed_within_1_day: interviewed_within(records, 1.0),
        interviewed_within_2_days: interviewed_within(records, 2.0),
    }
}

#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn delay_histogram(records: &[CaseRecord]) -> DelayHistogram {
    let mut histogram = DelayHistogram::default();
    for record in records {
        if record.is_missed() {
            histogram.missed += 1;
            continue;
        }
        let days = record.time_to_interview as usize;
        if histogram.counts.len() <= days {
            histogram.counts.resize(days + 1, 0);
        }
        histogram.counts[days] += 1;
    }
    histogram
}

/// Percentile bootstrap confidence interval for `statistic`, resampling cases with replacement.
///
/// Returns `None` when `n_resamples` is zero, the table is empty, or the statistic is undefined
/// on the full table. Resamples on which the statistic is undefined are skipped.
pub fn bootstrap<F>(
    records: &[CaseRecord],
    statistic: F,
    n_resamples: usize,
    confidence_level: f64,
    streams: &mut RandomStreams,
) -> Option<ConfidenceInterval>
where
    F: Fn(&[CaseRecord]) -> Option<f64>,
{
    if n_resamples == 0 || records.is_empty() {
        return None;
    }
    let estimate = statistic(records)?;
    let n = records.len();
    let mut resample = Vec::with_capacity(n);
    let mut estimates = Vec::with_capacity(n_resamples);
    for _ in 0..n_resamples {
        resample.clear();
        resample.extend((0..n).map(|_| records[streams.sample_range(BootstrapRng, 0..n)].clone()));
        if let Some(value) = statistic(&resample) {
            estimates.push(value);
        }
    }
    if estimates.is_empty() {
        return None;
    }
    estimates.sort_by(f64::total_cmp);
    let tail = (1.0 - confidence_level) / 2.0;
    Some(ConfidenceInterval {
        estimate,
        lower: percentile(&estimates, tail),
        upper: percentile(&estimates, 1.0 - tail),
    })
}

/// Nearest-rank percentile of sorted, non-empty `values`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn percentile(values: &[f64], q: f64) -> f64 {
    let index = ((values.len() - 1) as f64 * q).round() as usize;
    values[index.min(values.len() - 1)]
}
