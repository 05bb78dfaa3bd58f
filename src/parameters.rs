//! Scenario parameters and experiment configuration.
//!
//! Configuration is read from a JSON file and validated as a whole before any scenario starts, so
//! that a bad value is reported up front rather than part way through a sweep. Every field has a
//! default; a config file only needs to name the values it changes.
//!
//! ```json
//! {
//!     "parameters": { "mean_rate": 50.0, "max_interview_delay": 3 },
//!     "policies": ["oldest_swab_first", "random"],
//!     "capacity_ratios": [0.8, 1.0, 1.2],
//!     "replicates": 10
//! }
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::CtqueueError;
use crate::policy::Policy;

/// Daily capacity above this multiple of the mean arrival rate is treated as a typo.
pub const MAX_CAPACITY_RATIO: f64 = 100.0;
/// Keeps per-day arrival draws well inside the range the Poisson sampler supports.
pub const MAX_MEAN_RATE: f64 = 1.0e6;

/// The options for a single simulated scenario.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Parameters {
    pub seed: u64,
    /// Mean number of cases swabbed per day.
    pub mean_rate: f64,
    /// Daily interview capacity as a multiple of `mean_rate`.
    pub capacity_ratio: f64,
    /// Days after notification during which a case can still be interviewed.
    pub max_interview_delay: u32,
    /// Fraction of each day that counts as after hours.
    pub prop_time_delay: f64,
    pub proportion_cases_vaccinated: f64,
    /// Days whose cases are reported.
    pub days_samples: u32,
    /// Days of cases discarded at the start of the run.
    pub days_burnin: u32,
    /// Days of cases simulated after the reported window and then discarded.
    pub days_burnout: u32,
    pub policy: Policy,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            seed: 0,
            mean_rate: 20.0,
            capacity_ratio: 1.0,
            max_interview_delay: 5,
            prop_time_delay: 0.0,
            proportion_cases_vaccinated: 0.0,
            days_samples: 50,
            days_burnin: 5,
            days_burnout: 5,
            policy: Policy::default(),
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> CtqueueError {
    CtqueueError::InvalidParameter {
        name,
        reason: reason.into(),
    }
}

impl Parameters {
    /// Daily interview capacity. Kept as a real number; admission compares ranks against it
    /// directly.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity_ratio * self.mean_rate
    }

    /// Total simulated days of arrivals: burn-in, sampled window and burn-out.
    #[must_use]
    pub fn total_days(&self) -> u32 {
        self.days_burnin + self.days_samples + self.days_burnout
    }

    /// Number of cases generated for the scenario.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn population_size(&self) -> usize {
        (f64::from(self.total_days()) * self.mean_rate).floor() as usize
    }

    /// Checks every option against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns `CtqueueError::InvalidParameter` naming the first offending option.
    pub fn validate(&self) -> Result<(), CtqueueError> {
        if !self.mean_rate.is_finite() || self.mean_rate <= 0.0 {
            return Err(invalid("mean_rate", "must be a positive number"));
        }
        if self.mean_rate > MAX_MEAN_RATE {
            return Err(invalid(
                "mean_rate",
                format!("must not exceed {MAX_MEAN_RATE}"),
            ));
        }
        if !self.capacity_ratio.is_finite()
            || self.capacity_ratio < 0.0
            || self.capacity_ratio > MAX_CAPACITY_RATIO
        {
            return Err(invalid(
                "capacity_ratio",
                format!("must be between 0 and {MAX_CAPACITY_RATIO}"),
            ));
        }
        if !(0.0..1.0).contains(&self.prop_time_delay) {
            return Err(invalid("prop_time_delay", "must be in [0, 1)"));
        }
        if !(0.0..=1.0).contains(&self.proportion_cases_vaccinated) {
            return Err(invalid(
                "proportion_cases_vaccinated",
                "must be in [0, 1]",
            ));
        }
        for (name, days) in [
            ("days_samples", self.days_samples),
            ("days_burnin", self.days_burnin),
            ("days_burnout", self.days_burnout),
        ] {
            if days == 0 {
                return Err(invalid(name, "must be a positive number of days"));
            }
        }
        self.days_burnin
            .checked_add(self.days_samples)
            .and_then(|days| days.checked_add(self.days_burnout))
            .ok_or_else(|| invalid("days_burnout", "total number of days overflows"))?;
        Ok(())
    }
}

/// A sweep over policies, capacity ratios and mean rates, each combination replicated
/// `replicates` times. An empty axis means "use the value in `parameters`".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExperimentConfig {
    pub parameters: Parameters,
    pub policies: Vec<Policy>,
    pub capacity_ratios: Vec<f64>,
    pub mean_rates: Vec<f64>,
    pub replicates: usize,
    /// Resamples drawn for each bootstrap confidence interval. Zero disables the bootstrap.
    pub bootstrap_resamples: usize,
    pub confidence_level: f64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        ExperimentConfig {
            parameters: Parameters::default(),
            policies: Vec::new(),
            capacity_ratios: Vec::new(),
            mean_rates: Vec::new(),
            replicates: 1,
            bootstrap_resamples: 1000,
            confidence_level: 0.95,
        }
    }
}

impl ExperimentConfig {
    /// Reads a configuration from a JSON file. The result is not validated.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or is not a valid configuration.
    pub fn load(path: &Path) -> Result<Self, CtqueueError> {
        info!("Loading experiment configuration from {}", path.display());
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    #[must_use]
    pub fn policies(&self) -> Vec<Policy> {
        if self.policies.is_empty() {
            vec![self.parameters.policy]
        } else {
            self.policies.clone()
        }
    }

    #[must_use]
    pub fn capacity_ratios(&self) -> Vec<f64> {
        if self.capacity_ratios.is_empty() {
            vec![self.parameters.capacity_ratio]
        } else {
            self.capacity_ratios.clone()
        }
    }

    #[must_use]
    pub fn mean_rates(&self) -> Vec<f64> {
        if self.mean_rates.is_empty() {
            vec![self.parameters.mean_rate]
        } else {
            self.mean_rates.clone()
        }
    }

    /// Validates the base parameters and every value on every axis.
    ///
    /// # Errors
    ///
    /// Returns `CtqueueError::InvalidParameter` for the first offending value.
    pub fn validate(&self) -> Result<(), CtqueueError> {
        self.parameters.validate()?;
        if self.replicates == 0 {
            return Err(invalid("replicates", "must be at least 1"));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(invalid("confidence_level", "must be in (0, 1)"));
        }
        for capacity_ratio in self.capacity_ratios() {
            Parameters {
                capacity_ratio,
                ..self.parameters.clone()
            }
            .validate()?;
        }
        for mean_rate in self.mean_rates() {
            Parameters {
                mean_rate,
                ..self.parameters.clone()
            }
            .validate()?;
        }
        Ok(())
    }
}
