//! CSV reports of experiment results.
//!
//! Four reports are written, each with one block of rows per scenario and the scenario's
//! identifying columns repeated on every row:
//! * `cases`: the trimmed case table, one row per case. Missed cases have
//!   `time_to_interview = inf`.
//! * `queue`: one row per simulated day.
//! * `summary`: one row per scenario.
//! * `delays`: the delay histogram, one row per whole day from notification to interview and a
//!   final row, with `days_to_interview` left empty, counting missed cases.
//!
//! File names are `{file_prefix}{short_name}.csv` inside the configured directory.

use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use csv::Writer;
use log::{info, trace};
use serde::{Deserialize, Serialize};

use crate::error::CtqueueError;
use crate::experiment::ScenarioResult;
use crate::policy::Policy;
use crate::summary::DelayHistogram;

pub trait Report: Serialize {
    /// Used to build the report's file name.
    fn short_name() -> &'static str;
}

pub struct ReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportOptions {
    /// Creates a new `ReportOptions` with default values: no prefix, the current working
    /// directory, and no overwriting of existing files.
    #[must_use]
    pub fn new() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            directory: std::env::current_dir().unwrap_or_default(),
            overwrite: false,
        }
    }

    pub fn file_prefix(&mut self, file_prefix: String) -> &mut ReportOptions {
        self.file_prefix = file_prefix;
        self
    }

    pub fn directory(&mut self, directory: PathBuf) -> &mut ReportOptions {
        self.directory = directory;
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn get_file_path(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{}.csv", self.file_prefix, short_name))
    }
}

/// Creates the report file and its parent directories. Refuses to replace an existing file
/// unless `overwrite` is set.
fn create_report_file(
    options: &ReportOptions,
    short_name: &str,
) -> Result<(File, PathBuf), CtqueueError> {
    let path = options.get_file_path(short_name);
    if path.exists() && !options.overwrite {
        return Err(CtqueueError::ReportError(format!(
            "File already exists: {}. Please set `overwrite` to true in the file configuration and rerun.",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    Ok((file, path))
}

/// Writes `rows` to the report file for `T`.
///
/// # Errors
///
/// Returns an error if the file exists and `overwrite` is not set, or if writing fails.
pub fn write_report<T: Report>(
    options: &ReportOptions,
    rows: impl IntoIterator<Item = T>,
) -> Result<PathBuf, CtqueueError> {
    let (file, path) = create_report_file(options, T::short_name())?;
    let mut writer = Writer::from_writer(file);
    let mut n_rows = 0_usize;
    for row in rows {
        writer.serialize(row)?;
        n_rows += 1;
    }
    writer.flush()?;
    trace!("wrote {} rows to {}", n_rows, path.display());
    Ok(path)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseReportItem {
    pub scenario: usize,
    pub policy: Policy,
    pub capacity_ratio: f64,
    pub mean_rate: f64,
    pub replicate: usize,
    pub swab_date: u32,
    pub notification_date: u32,
    pub test_turnaround_time: u32,
    pub vaccinated: bool,
    pub time_to_interview: f64,
}

impl Report for CaseReportItem {
    fn short_name() -> &'static str {
        "cases"
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueReportItem {
    pub scenario: usize,
    pub policy: Policy,
    pub capacity_ratio: f64,
    pub mean_rate: f64,
    pub replicate: usize,
    pub day: u32,
    pub eligible: usize,
    pub admitted: usize,
    pub expired: usize,
    pub backlog: usize,
}

impl Report for QueueReportItem {
    fn short_name() -> &'static str {
        "queue"
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryReportItem {
    pub scenario: usize,
    pub policy: Policy,
    pub capacity_ratio: f64,
    pub mean_rate: f64,
    pub replicate: usize,
    pub seed: u64,
    pub n_cases: usize,
    pub n_interviewed: usize,
    pub n_missed: usize,
    pub missed_proportion: Option<f64>,
    pub missed_proportion_lower: Option<f64>,
    pub missed_proportion_upper: Option<f64>,
    pub mean_time_to_interview: Option<f64>,
    pub mean_time_to_interview_lower: Option<f64>,
    pub mean_time_to_interview_upper: Option<f64>,
    pub median_time_to_interview: Option<f64>,
    pub mean_test_turnaround_time: Option<f64>,
    pub interviewed_within_0_days: Option<f64>,
    pub interviewed_within_1_day: Option<f64>,
    pub interviewed_within_2_days: Option<f64>,
}

impl Report for SummaryReportItem {
    fn short_name() -> &'static str {
        "summary"
    }
}

impl From<&ScenarioResult> for SummaryReportItem {
    fn from(result: &ScenarioResult) -> Self {
        let parameters = &result.scenario.parameters;
        let summary = &result.summary;
        SummaryReportItem {
            scenario: result.scenario.index,
            policy: parameters.policy,
            capacity_ratio: parameters.capacity_ratio,
            mean_rate: parameters.mean_rate,
            replicate: result.scenario.replicate,
            seed: parameters.seed,
            n_cases: summary.n_cases,
            n_interviewed: summary.n_interviewed,
            n_missed: summary.n_missed,
            missed_proportion: summary.missed_proportion,
            missed_proportion_lower: result.missed_proportion_ci.map(|ci| ci.lower),
            missed_proportion_upper: result.missed_proportion_ci.map(|ci| ci.upper),
            mean_time_to_interview: summary.mean_time_to_interview,
            mean_time_to_interview_lower: result.mean_time_to_interview_ci.map(|ci| ci.lower),
            mean_time_to_interview_upper: result.mean_time_to_interview_ci.map(|ci| ci.upper),
            median_time_to_interview: summary.median_time_to_interview,
            mean_test_turnaround_time: summary.mean_test_turnaround_time,
            interviewed_within_0_days: summary.interviewed_within_0_days,
            interviewed_within_1_day: summary.interviewed_within_1_day,
            interviewed_within_2_days: summary.interviewed_within_2_days,
        }
    }
}

fn case_rows(result: &ScenarioResult) -> impl Iterator<Item = CaseReportItem> + '_ {
    let parameters = &result.scenario.parameters;
    result.cases.iter().map(move |case| CaseReportItem {
        scenario: result.scenario.index,
        policy: parameters.policy,
        capacity_ratio: parameters.capacity_ratio,
        mean_rate: parameters.mean_rate,
        replicate: result.scenario.replicate,
        swab_date: case.swab_date,
        notification_date: case.notification_date,
        test_turnaround_time: case.test_turnaround_time,
        vaccinated: case.vaccinated,
        time_to_interview: case.time_to_interview,
    })
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DelayReportItem {
    pub scenario: usize,
    pub policy: Policy,
    pub capacity_ratio: f64,
    pub mean_rate: f64,
    pub replicate: usize,
    /// Empty for the missed-case row.
    pub days_to_interview: Option<usize>,
    pub count: usize,
}

impl Report for DelayReportItem {
    fn short_name() -> &'static str {
        "delays"
    }
}

fn delay_rows(result: &ScenarioResult) -> impl Iterator<Item = DelayReportItem> + '_ {
    let parameters = &result.scenario.parameters;
    let DelayHistogram { counts, missed } = &result.delay_histogram;
    let bins = counts
        .iter()
        .enumerate()
        .map(|(days, &count)| (Some(days), count));
    bins.chain(std::iter::once((None, *missed)))
        .map(move |(days_to_interview, count)| DelayReportItem {
            scenario: result.scenario.index,
            policy: parameters.policy,
            capacity_ratio: parameters.capacity_ratio,
            mean_rate: parameters.mean_rate,
            replicate: result.scenario.replicate,
            days_to_interview,
            count,
        })
}

fn queue_rows(result: &ScenarioResult) -> impl Iterator<Item = QueueReportItem> + '_ {
    let parameters = &result.scenario.parameters;
    result.queue_stats.iter().map(move |stats| QueueReportItem {
        scenario: result.scenario.index,
        policy: parameters.policy,
        capacity_ratio: parameters.capacity_ratio,
        mean_rate: parameters.mean_rate,
        replicate: result.scenario.replicate,
        day: stats.day,
        eligible: stats.eligible,
        admitted: stats.admitted,
        expired: stats.expired,
        backlog: stats.backlog,
    })
}

/// Writes the case, queue, summary and delay reports for `results`.
///
/// # Errors
///
/// Returns the first error encountered; reports already written are left in place.
pub fn write_experiment_reports(
    options: &ReportOptions,
    results: &[ScenarioResult],
) -> Result<Vec<PathBuf>, CtqueueError> {
    let paths = vec![
        write_report(options, results.iter().flat_map(case_rows))?,
        write_report(options, results.iter().flat_map(queue_rows))?,
        write_report(options, results.iter().map(SummaryReportItem::from))?,
        write_report(options, results.iter().flat_map(delay_rows))?,
    ];
    info!(
        "wrote {} reports to {}",
        paths.len(),
        options.directory.display()
    );
    Ok(paths)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::experiment::{run_scenario, AnalysisOptions, Scenario};
    use crate::parameters::Parameters;
    use tempfile::tempdir;

    fn results() -> Vec<ScenarioResult> {
        [Policy::OldestSwabFirst, Policy::NewestSwabFirst]
            .into_iter()
            .enumerate()
            .map(|(index, policy)| {
                let scenario = Scenario {
                    index,
                    replicate: 0,
                    parameters: Parameters {
                        mean_rate: 5.0,
                        capacity_ratio: 0.6,
                        days_samples: 10,
                        seed: 11,
                        policy,
                        ..Parameters::default()
                    },
                };
                let options = AnalysisOptions {
                    bootstrap_resamples: 20,
                    confidence_level: 0.9,
                };
                run_scenario(&scenario, &options).unwrap()
            })
            .collect()
    }

    #[test]
    fn file_paths_use_prefix() {
        let mut options = ReportOptions::new();
        options
            .directory(PathBuf::from("out"))
            .file_prefix("run1_".to_string());
        assert_eq!(
            options.get_file_path("cases"),
            PathBuf::from("out").join("run1_cases.csv")
        );
    }

    #[test]
    fn writes_all_reports() {
        let temp_dir = tempdir().unwrap();
        let mut options = ReportOptions::new();
        options.directory(temp_dir.path().join("nested"));
        let results = results();
        let paths = write_experiment_reports(&options, &results).unwrap();
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.exists()));

        let mut reader = csv::Reader::from_path(options.get_file_path("cases")).unwrap();
        let rows: Vec<CaseReportItem> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), results[0].cases.len() + results[1].cases.len());
        assert_eq!(rows[0].policy, Policy::OldestSwabFirst);
        assert!(rows.iter().any(|row| row.time_to_interview.is_infinite()));

        let mut reader = csv::Reader::from_path(options.get_file_path("summary")).unwrap();
        let rows: Vec<SummaryReportItem> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].policy, Policy::NewestSwabFirst);
        assert_eq!(rows[0].n_cases, 50);

        let mut reader = csv::Reader::from_path(options.get_file_path("queue")).unwrap();
        let rows: Vec<QueueReportItem> = reader.deserialize().map(Result::unwrap).collect();
        assert_eq!(
            rows.len(),
            results[0].queue_stats.len() + results[1].queue_stats.len()
        );
    }

    #[test]
    fn delay_report_accounts_for_every_case() {
        let temp_dir = tempdir().unwrap();
        let mut options = ReportOptions::new();
        options.directory(temp_dir.path().to_path_buf());
        let results = results();
        write_experiment_reports(&options, &results).unwrap();

        let mut reader = csv::Reader::from_path(options.get_file_path("delays")).unwrap();
        let rows: Vec<DelayReportItem> = reader.deserialize().map(Result::unwrap).collect();
        for result in &results {
            let rows: Vec<_> = rows
                .iter()
                .filter(|row| row.scenario == result.scenario.index)
                .collect();
            let total: usize = rows.iter().map(|row| row.count).sum();
            assert_eq!(total, result.cases.len());
            let missed = rows.last().unwrap();
            assert_eq!(missed.days_to_interview, None);
            assert_eq!(missed.count, result.summary.n_missed);
            for (days, row) in rows[..rows.len() - 1].iter().enumerate() {
                assert_eq!(row.days_to_interview, Some(days));
            }
        }
    }

    #[test]
    fn missed_cases_are_written_as_inf() {
        let temp_dir = tempdir().unwrap();
        let mut options = ReportOptions::new();
        options.directory(temp_dir.path().to_path_buf());
        let results = results();
        write_report(&options, results.iter().flat_map(case_rows)).unwrap();
        let contents = std::fs::read_to_string(options.get_file_path("cases")).unwrap();
        assert!(contents.starts_with(
            "scenario,policy,capacity_ratio,mean_rate,replicate,swab_date,notification_date,\
             test_turnaround_time,vaccinated,time_to_interview"
        ));
        assert!(contents.contains(",inf\n"));
    }

    #[test]
    fn refuses_to_overwrite() {
        let temp_dir = tempdir().unwrap();
        let mut options = ReportOptions::new();
        options.directory(temp_dir.path().to_path_buf());
        let results = results();
        write_experiment_reports(&options, &results).unwrap();
        assert!(matches!(
            write_experiment_reports(&options, &results),
            Err(CtqueueError::ReportError(_))
        ));
        options.overwrite(true);
        assert!(write_experiment_reports(&options, &results).is_ok());
    }
}
