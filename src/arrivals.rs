//! Synthetic case arrivals.
//!
//! Daily swab counts are over-dispersed: each day's count is drawn from a negative binomial with
//! mean `mean_rate` and size `mean_rate`, so the variance is twice the mean. Counts are drawn day
//! by day, starting at day 1, until the requested number of cases exists; the last day is
//! truncated. Each case then gets a testing delay, a time of day for its notification and a
//! vaccination status, all drawn independently.

use log::{debug, warn};
use rand::Rng;
use rand_distr::{Distribution, Gamma, Poisson};

use crate::case::{Case, CaseId};
use crate::define_rng;
use crate::error::CtqueueError;
use crate::parameters::Parameters;
use crate::random::RandomStreams;

define_rng!(ArrivalRng);

/// Upper bound on the testing delay in days.
pub const MAX_TESTING_DELAY: u32 = 8;
/// Mean of the Poisson testing delay in days.
pub const MEAN_TESTING_DELAY: f64 = 1.0;
/// Arrival generation gives up after this many days without reaching the requested number of
/// cases.
pub const MAX_ARRIVAL_DAYS: u32 = 1_000_000;

/// Negative binomial parameterized by mean and size, sampled as a gamma-Poisson mixture.
#[derive(Clone, Debug)]
pub struct NegativeBinomial {
    gamma: Gamma<f64>,
}

impl NegativeBinomial {
    /// # Errors
    ///
    /// Returns `CtqueueError::ArrivalGeneration` unless `mean` and `size` are positive and
    /// finite.
    pub fn new(mean: f64, size: f64) -> Result<Self, CtqueueError> {
        if !(mean.is_finite() && mean > 0.0 && size.is_finite() && size > 0.0) {
            return Err(CtqueueError::ArrivalGeneration(format!(
                "negative binomial needs a positive mean and size, got mean={mean} size={size}"
            )));
        }
        let gamma = Gamma::new(size, mean / size)
            .map_err(|e| CtqueueError::ArrivalGeneration(e.to_string()))?;
        Ok(NegativeBinomial { gamma })
    }
}

impl Distribution<u64> for NegativeBinomial {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        let lambda = self.gamma.sample(rng);
        // The gamma draw can underflow to zero for small sizes; that day simply has no arrivals.
        if lambda <= 0.0 {
            return 0;
        }
        Poisson::new(lambda).map_or(0, |poisson| {
            let count: f64 = poisson.sample(rng);
            count as u64
        })
    }
}

/// Draws daily counts until they add up to at least `n_cases`, returning each case's swab day.
///
/// # Errors
///
/// Returns `CtqueueError::ArrivalGeneration` if `mean_rate` is not positive or if
/// `MAX_ARRIVAL_DAYS` pass without producing enough cases.
pub fn generate_swab_dates(
    streams: &mut RandomStreams,
    n_cases: usize,
    mean_rate: f64,
) -> Result<Vec<u32>, CtqueueError> {
    let daily_count = NegativeBinomial::new(mean_rate, mean_rate)?;
    let mut swab_dates = Vec::with_capacity(n_cases);
    let mut day = 0;
    while swab_dates.len() < n_cases {
        day += 1;
        if day > MAX_ARRIVAL_DAYS {
            return Err(CtqueueError::ArrivalGeneration(format!(
                "only {} of {} cases generated after {} days (mean_rate={})",
                swab_dates.len(),
                n_cases,
                MAX_ARRIVAL_DAYS,
                mean_rate
            )));
        }
        let count = streams.sample_distr(ArrivalRng, &daily_count);
        let remaining = n_cases - swab_dates.len();
        let take = usize::try_from(count).map_or(remaining, |count| count.min(remaining));
        swab_dates.extend(std::iter::repeat_n(day, take));
    }
    debug!("generated {} swab dates over {} days", swab_dates.len(), day);
    Ok(swab_dates)
}

/// Testing delay in days: Poisson with mean `MEAN_TESTING_DELAY`, capped at `MAX_TESTING_DELAY`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sample_testing_delay(streams: &mut RandomStreams, delay: &Poisson<f64>) -> u32 {
    let days: f64 = streams.sample_distr(ArrivalRng, delay);
    (days as u32).min(MAX_TESTING_DELAY)
}

/// Generates `n_cases` cases with non-decreasing swab dates, none of them interviewed.
///
/// # Errors
///
/// Returns `CtqueueError::ArrivalGeneration` if the arrival process cannot produce the cases
/// or `proportion_vaccinated` is not a probability.
pub fn generate_cases(
    streams: &mut RandomStreams,
    n_cases: usize,
    mean_rate: f64,
    proportion_vaccinated: f64,
) -> Result<Vec<Case>, CtqueueError> {
    if !(0.0..=1.0).contains(&proportion_vaccinated) {
        return Err(CtqueueError::ArrivalGeneration(format!(
            "proportion vaccinated must be a probability, got {proportion_vaccinated}"
        )));
    }
    if n_cases == 0 {
        warn!("generating an empty population");
        return Ok(Vec::new());
    }
    let swab_dates = generate_swab_dates(streams, n_cases, mean_rate)?;
    let testing_delay = Poisson::new(MEAN_TESTING_DELAY)
        .map_err(|e| CtqueueError::ArrivalGeneration(e.to_string()))?;

    let cases = swab_dates
        .into_iter()
        .enumerate()
        .map(|(index, swab_date)| {
            let notification_date = swab_date + sample_testing_delay(streams, &testing_delay);
            let notification_time = streams.sample_unit(ArrivalRng);
            let vaccinated = streams.sample_bool(ArrivalRng, proportion_vaccinated);
            Case::new(
                CaseId(index),
                swab_date,
                notification_date,
                notification_time,
                vaccinated,
            )
        })
        .collect();
    Ok(cases)
}

/// Generates the population for a scenario.
///
/// # Errors
///
/// See [`generate_cases`].
pub fn generate_population(
    streams: &mut RandomStreams,
    parameters: &Parameters,
) -> Result<Vec<Case>, CtqueueError> {
    generate_cases(
        streams,
        parameters.population_size(),
        parameters.mean_rate,
        parameters.proportion_cases_vaccinated,
    )
}
