use std::path::{Path, PathBuf};

use clap::{Args, Command, FromArgMatches as _};

use crate::error::CtqueueError;
use crate::experiment::{Experiment, ScenarioResult};
use crate::log::{configure_from_arg, info};
use crate::parameters::ExperimentConfig;
use crate::policy::Policy;
use crate::report::{write_experiment_reports, ReportOptions};

/// Command line arguments for the ctqueue runner. Values given here override the
/// corresponding values in the config file.
#[derive(Args, Debug, Default)]
pub struct BaseArgs {
    /// Random seed. Overrides the seed in the config file.
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Optional path to a JSON experiment config file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Optional path for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Prefix added to every report file name
    #[arg(long, default_value = "")]
    pub file_prefix: String,

    /// Overwrite existing report files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Enable logging: a level (`info`) or a list of `module=level` filters
    #[arg(long)]
    pub log_level: Option<String>,

    /// Policies to compare, comma separated
    #[arg(long, value_enum, value_delimiter = ',')]
    pub policy: Vec<Policy>,

    /// Interview capacities as multiples of the mean arrival rate, comma separated
    #[arg(long, value_delimiter = ',')]
    pub capacity_ratio: Vec<f64>,

    /// Number of replicates of each scenario
    #[arg(long)]
    pub replicates: Option<usize>,

    /// Worker threads. Defaults to one per core.
    #[arg(short, long)]
    pub threads: Option<usize>,
}

fn create_ctqueue_cli() -> Command {
    let cli = Command::new("ctqueue")
        .about("Simulates a contact-tracing interview queue under different priority policies");
    BaseArgs::augment_args(cli)
}

/// Parses the command line and runs the experiment it describes.
///
/// # Errors
/// Returns an error if argument parsing, configuration, the simulation or report writing fails
pub fn run_with_args() -> Result<Vec<ScenarioResult>, Box<dyn std::error::Error>> {
    let matches = create_ctqueue_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    run_with_args_internal(&args)
}

/// Reads the config file named by `args`, if any, and applies the command line overrides.
///
/// # Errors
/// Returns an error if the config file cannot be read or parsed
pub fn load_config(args: &BaseArgs) -> Result<ExperimentConfig, CtqueueError> {
    let mut config = if args.config.is_empty() {
        ExperimentConfig::default()
    } else {
        ExperimentConfig::load(Path::new(&args.config))?
    };
    if let Some(seed) = args.random_seed {
        config.parameters.seed = seed;
    }
    if !args.policy.is_empty() {
        config.policies.clone_from(&args.policy);
    }
    if !args.capacity_ratio.is_empty() {
        config.capacity_ratios.clone_from(&args.capacity_ratio);
    }
    if let Some(replicates) = args.replicates {
        config.replicates = replicates;
    }
    Ok(config)
}

fn report_options(args: &BaseArgs) -> ReportOptions {
    let mut options = ReportOptions::new();
    if !args.output_dir.is_empty() {
        options.directory(PathBuf::from(&args.output_dir));
    }
    options
        .file_prefix(args.file_prefix.clone())
        .overwrite(args.force_overwrite);
    options
}

fn run_experiment(
    experiment: &Experiment,
    threads: Option<usize>,
) -> Result<Vec<ScenarioResult>, CtqueueError> {
    match threads {
        None => experiment.run(),
        Some(0) => Err(CtqueueError::IllegalArgument(
            "--threads must be at least 1".to_string(),
        )),
        Some(n) => rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build()
            .map_err(|e| {
                CtqueueError::CtqueueError(format!("failed to start worker threads: {e}"))
            })?
            .install(|| experiment.run()),
    }
}

/// One line per scenario for the terminal.
#[must_use]
pub fn format_result(result: &ScenarioResult) -> String {
    let fmt = |value: Option<f64>| value.map_or_else(|| "NA".to_string(), |v| format!("{v:.4}"));
    format!(
        "{}: cases={} missed={} mean_time_to_interview={}",
        result.scenario.label(),
        result.summary.n_cases,
        fmt(result.summary.missed_proportion),
        fmt(result.summary.mean_time_to_interview),
    )
}

/// Runs an experiment from already parsed arguments.
///
/// # Errors
/// Returns an error if configuration, the simulation or report writing fails
pub fn run_with_args_internal(
    args: &BaseArgs,
) -> Result<Vec<ScenarioResult>, Box<dyn std::error::Error>> {
    if let Some(log_level) = &args.log_level {
        let parsed = configure_from_arg(log_level)?;
        if let Some(level) = parsed.global {
            println!("Logging enabled at level {level}");
        }
        for (module, level) in &parsed.modules {
            println!("Logging enabled for {module} at level {level}");
        }
    }

    let config = load_config(args)?;
    let experiment = Experiment::new(&config)?;
    let results = run_experiment(&experiment, args.threads)?;

    let options = report_options(args);
    let paths = write_experiment_reports(&options, &results)?;
    for path in &paths {
        info!("report written to {}", path.display());
    }

    for result in &results {
        println!("{}", format_result(result));
    }
    Ok(results)
}
