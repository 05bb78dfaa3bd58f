//! Burn-in and burn-out trimming.
//!
//! The queue starts empty and, at the end of the run, the last cases have no future days in
//! which to be interviewed. Both ends are dropped from the reported sample: the first
//! `days_burnin × mean_rate` cases and everything after
//! `(days_burnin + days_samples) × mean_rate` cases, counted in arrival order.

use std::ops::Range;

use crate::case::{Case, CaseRecord};
use crate::parameters::Parameters;

/// The rows kept by the trimmer, as a half-open range of arrival indices.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn sample_window(days_burnin: u32, days_samples: u32, mean_rate: f64) -> Range<usize> {
    let start = (f64::from(days_burnin) * mean_rate).floor() as usize;
    let end = ((f64::from(days_burnin) + f64::from(days_samples)) * mean_rate).floor() as usize;
    start..end
}

/// Returns the sampled slice of `cases`. Shorter inputs give a shorter (possibly empty) slice.
#[must_use]
pub fn trim<'a>(cases: &'a [Case], parameters: &Parameters) -> &'a [Case] {
    let window = sample_window(
        parameters.days_burnin,
        parameters.days_samples,
        parameters.mean_rate,
    );
    let end = window.end.min(cases.len());
    let start = window.start.min(end);
    &cases[start..end]
}

/// The trimmed case table in its output form.
#[must_use]
pub fn trimmed_records(cases: &[Case], parameters: &Parameters) -> Vec<CaseRecord> {
    trim(cases, parameters)
        .iter()
        .map(CaseRecord::from)
        .collect()
}
