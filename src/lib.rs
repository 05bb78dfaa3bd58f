//! A discrete-time simulation of a contact-tracing interview queue.
//!
//! Newly reported cases arrive every day, wait for their test result, and then join a queue of
//! cases waiting to be interviewed by a fixed-capacity team. Each day a priority policy orders
//! the waiting cases and the team works down the list until its capacity runs out. Cases that
//! are not reached within the interview window are missed.
//!
//! A run is organized as follows:
//! * [`arrivals`] generates the synthetic case population: over-dispersed daily counts, testing
//!   delays, notification times and vaccination status.
//! * [`policy`] defines the priority policies that rank the waiting cases each day.
//! * [`simulator`] advances the queue day by day and records when each case was interviewed.
//! * [`trimmer`] drops the burn-in and burn-out cases so that only the steady state is reported.
//! * [`summary`] and [`report`] turn the trimmed case table into statistics and CSV files.
//! * [`experiment`] runs a grid of scenarios (policy × capacity × arrival rate × replicate) in
//!   parallel, and [`runner`] wraps all of it in a command line interface.
//!
//! Each scenario owns its [`RandomStreams`], so results depend only on the seed and not on the
//! number of worker threads.
pub mod arrivals;
pub mod case;
pub mod error;
pub mod experiment;
pub mod hashing;
pub mod log;
pub mod parameters;
pub mod policy;
pub mod random;
pub mod report;
pub mod runner;
pub mod simulator;
pub mod summary;
pub mod trimmer;

// Re-exports used by `define_rng!`.
pub use paste;
pub use rand;

pub use case::{Case, CaseId, CaseRecord};
pub use error::CtqueueError;
pub use experiment::{run_scenario, Experiment, Scenario, ScenarioResult};
pub use crate::log::{debug, error, info, trace, warn};
pub use parameters::{ExperimentConfig, Parameters};
pub use policy::{Policy, PriorityPolicy};
pub use random::RandomStreams;
pub use report::ReportOptions;
pub use runner::{run_with_args, BaseArgs};
pub use simulator::QueueSimulator;
