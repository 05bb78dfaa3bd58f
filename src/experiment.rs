//! Experiments: many independent scenarios run in parallel.
//!
//! An [`ExperimentConfig`] expands into one [`Scenario`] per combination of mean rate, capacity
//! ratio, policy and replicate. Each scenario owns its population and its [`RandomStreams`], so
//! scenarios share no mutable state and can run on any worker thread in any order.
//!
//! Scenario seeds are derived from the experiment seed, the mean rate and the replicate number
//! only. Scenarios that differ just in policy or capacity therefore simulate the same arrivals,
//! which keeps comparisons between policies free of arrival noise.

use log::{debug, info};
use rayon::prelude::*;

use crate::arrivals::generate_population;
use crate::case::CaseRecord;
use crate::error::CtqueueError;
use crate::hashing::derive_seed;
use crate::parameters::{ExperimentConfig, Parameters};
use crate::policy::Policy;
use crate::random::RandomStreams;
use crate::simulator::{DailyQueueStats, QueueSimulator};
use crate::summary::{
    bootstrap, delay_histogram, mean_time_to_interview, missed_proportion, summarize,
    ConfidenceInterval, DelayHistogram, Summary,
};
use crate::trimmer::trimmed_records;

#[derive(Clone, Debug, PartialEq)]
pub struct Scenario {
    /// Position of the scenario in the experiment, used to order results.
    pub index: usize,
    pub replicate: usize,
    /// Fully resolved parameters, including the scenario's own seed and policy.
    pub parameters: Parameters,
}

impl Scenario {
    #[must_use]
    pub fn policy(&self) -> Policy {
        self.parameters.policy
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "policy={} capacity_ratio={} mean_rate={} replicate={}",
            self.parameters.policy,
            self.parameters.capacity_ratio,
            self.parameters.mean_rate,
            self.replicate
        )
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ScenarioResult {
    pub scenario: Scenario,
    /// The trimmed case table.
    pub cases: Vec<CaseRecord>,
    pub queue_stats: Vec<DailyQueueStats>,
    pub summary: Summary,
    pub delay_histogram: DelayHistogram,
    pub missed_proportion_ci: Option<ConfidenceInterval>,
    pub mean_time_to_interview_ci: Option<ConfidenceInterval>,
}

/// Options that apply to the analysis of every scenario rather than to the simulation itself.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AnalysisOptions {
    pub bootstrap_resamples: usize,
    pub confidence_level: f64,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        AnalysisOptions {
            bootstrap_resamples: 0,
            confidence_level: 0.95,
        }
    }
}

/// Generates, simulates, trims and summarizes one scenario.
///
/// # Errors
///
/// Returns an error if the parameters are invalid, arrival generation fails or the policy
/// breaks its ordering contract.
pub fn run_scenario(
    scenario: &Scenario,
    options: &AnalysisOptions,
) -> Result<ScenarioResult, CtqueueError> {
    let parameters = &scenario.parameters;
    parameters.validate()?;
    debug!("running scenario {}: {}", scenario.index, scenario.label());

    let mut streams = RandomStreams::new(parameters.seed);
    let cases = generate_population(&mut streams, parameters)?;
    let mut simulator = QueueSimulator::from_parameters(cases, parameters, &parameters.policy);
    simulator.run(&mut streams)?;
    let (cases, queue_stats) = simulator.into_parts();

    let records = trimmed_records(&cases, parameters);
    let summary = summarize(&records);
    let delay_histogram = delay_histogram(&records);
    let missed_proportion_ci = bootstrap(
        &records,
        missed_proportion,
        options.bootstrap_resamples,
        options.confidence_level,
        &mut streams,
    );
    let mean_time_to_interview_ci = bootstrap(
        &records,
        mean_time_to_interview,
        options.bootstrap_resamples,
        options.confidence_level,
        &mut streams,
    );

    Ok(ScenarioResult {
        scenario: scenario.clone(),
        cases: records,
        queue_stats,
        summary,
        delay_histogram,
        missed_proportion_ci,
        mean_time_to_interview_ci,
    })
}

pub struct Experiment {
    scenarios: Vec<Scenario>,
    options: AnalysisOptions,
}

impl Experiment {
    /// Validates `config` and expands it into scenarios.
    ///
    /// # Errors
    ///
    /// Returns `CtqueueError::InvalidParameter` if any value in the configuration is invalid.
    pub fn new(config: &ExperimentConfig) -> Result<Self, CtqueueError> {
        config.validate()?;
        let base = &config.parameters;
        let mut scenarios = Vec::new();
        for mean_rate in config.mean_rates() {
            for replicate in 0..config.replicates {
                let seed = derive_seed(
                    base.seed,
                    &format!("mean_rate={mean_rate} replicate={replicate}"),
                );
                for capacity_ratio in config.capacity_ratios() {
                    for policy in config.policies() {
                        scenarios.push(Scenario {
                            index: scenarios.len(),
                            replicate,
                            parameters: Parameters {
                                seed,
                                mean_rate,
                                capacity_ratio,
                                policy,
                                ..base.clone()
                            },
                        });
                    }
                }
            }
        }
        Ok(Experiment {
            scenarios,
            options: AnalysisOptions {
                bootstrap_resamples: config.bootstrap_resamples,
                confidence_level: config.confidence_level,
            },
        })
    }

    #[must_use]
    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    /// Runs every scenario on the current rayon thread pool. Results come back in scenario
    /// order regardless of which thread finished first.
    ///
    /// # Errors
    ///
    /// Returns the first error reported by any scenario.
    pub fn run(&self) -> Result<Vec<ScenarioResult>, CtqueueError> {
        info!(
            "running {} scenarios on {} threads",
            self.scenarios.len(),
            rayon::current_num_threads()
        );
        self.scenarios
            .par_iter()
            .map(|scenario| run_scenario(scenario, &self.options))
            .collect()
    }
}
