//! Logging for the simulator. Logging is about the internal behavior of a run (scenarios
//! starting, populations generated, reports written) and is separate from _reporting_, which
//! writes the results of an experiment to CSV files.
//!
//! This module (re)exports the five logging macros: `error!`, `warn!`, `info!`, `debug!` and
//! `trace!`. Logging is _disabled_ by default and is enabled from the command line with
//! `--log-level`, which takes either a single level or a comma separated list of
//! `module=level` filters:
//!
//! ```text
//! ctqueue --log-level info
//! ctqueue --log-level ctqueue::simulator=trace,ctqueue::report=debug
//! ```
//!
//! It can also be controlled programmatically:
//!
//! ```rust
//! use ctqueue::log::{set_log_level, set_module_filter, LevelFilter};
//!
//! set_log_level(LevelFilter::Info);
//! set_module_filter("ctqueue::simulator", LevelFilter::Trace);
//! ```
#[cfg(feature = "logging")]
mod standard_logger;

#[cfg(not(feature = "logging"))]
mod null_logger;

pub use log::{debug, error, info, trace, warn, LevelFilter};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str::FromStr;

use crate::error::CtqueueError;
#[cfg(feature = "logging")]
use log4rs::Handle;
use std::sync::LazyLock;
use std::sync::{Mutex, MutexGuard};

// Logging disabled
const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::Off;

/// A global instance of the logging configuration.
static LOG_CONFIGURATION: LazyLock<Mutex<LogConfiguration>> = LazyLock::new(Mutex::default);

/// A level filter for the log messages emitted from one module path (e.g.
/// `"ctqueue::simulator"`).
#[derive(Debug, PartialEq)]
struct ModuleLogConfiguration {
    module: String,
    level: LevelFilter,
}

impl From<(&str, LevelFilter)> for ModuleLogConfiguration {
    fn from((module, level): (&str, LevelFilter)) -> Self {
        Self {
            module: module.to_string(),
            level,
        }
    }
}

/// Keeps track of the global and per-module filter levels and holds the handle to the global
/// logger. Loggers are installed globally, so there is a single instance behind
/// `LOG_CONFIGURATION`; the public API is the free functions below.
#[derive(Debug)]
pub(in crate::log) struct LogConfiguration {
    /// Level for modules without their own filter. `LevelFilter::Off` disables logging.
    pub(in crate::log) global_log_level: LevelFilter,
    pub(in crate::log) module_configurations: HashMap<String, ModuleLogConfiguration>,

    #[cfg(feature = "logging")]
    root_handle: Option<Handle>,
}

impl Default for LogConfiguration {
    fn default() -> Self {
        Self {
            global_log_level: DEFAULT_LOG_LEVEL,
            module_configurations: HashMap::new(),

            #[cfg(feature = "logging")]
            root_handle: None,
        }
    }
}

impl LogConfiguration {
    pub(in crate::log) fn set_log_level(&mut self, level: LevelFilter) {
        self.global_log_level = level;
        self.set_config();
    }

    /// Returns true if the configuration was mutated, false otherwise.
    fn insert_module_filter(&mut self, module: &str, level: LevelFilter) -> bool {
        match self.module_configurations.entry(module.to_string()) {
            Entry::Occupied(mut entry) => {
                let module_config = entry.get_mut();
                if module_config.level == level {
                    return false;
                }
                module_config.level = level;
            }
            Entry::Vacant(entry) => {
                entry.insert((module, level).into());
            }
        }
        true
    }

    pub(in crate::log) fn set_module_filter(&mut self, module: &str, level: LevelFilter) {
        if self.insert_module_filter(module, level) {
            self.set_config();
        }
    }

    pub(in crate::log) fn set_module_filters(&mut self, module_filters: &[(&str, LevelFilter)]) {
        let mut mutated = false;
        for (module, level) in module_filters {
            mutated |= self.insert_module_filter(module, *level);
        }
        if mutated {
            self.set_config();
        }
    }

    pub(in crate::log) fn remove_module_filter(&mut self, module: &str) {
        if self.module_configurations.remove(module).is_some() {
            self.set_config();
        }
    }
}

// The public API

/// Enables all log messages. Equivalent to `set_log_level(LevelFilter::Trace)`.
pub fn enable_logging() {
    set_log_level(LevelFilter::Trace);
}

/// Disables logging completely. Equivalent to `set_log_level(LevelFilter::Off)`.
pub fn disable_logging() {
    set_log_level(LevelFilter::Off);
}

/// Sets the global log level. A global filter level of `LevelFilter::Off` disables logging.
pub fn set_log_level(level: LevelFilter) {
    get_log_configuration().set_log_level(level);
}

/// Sets a level filter for the given module path.
pub fn set_module_filter(module_path: &str, level_filter: LevelFilter) {
    get_log_configuration().set_module_filter(module_path, level_filter);
}

/// Removes the filter for the given module path so that the global level applies to it again.
pub fn remove_module_filter(module_path: &str) {
    get_log_configuration().remove_module_filter(module_path);
}

/// Sets filters for several modules at once, rebuilding the logger only once.
pub fn set_module_filters(module_filters: &[(&str, LevelFilter)]) {
    get_log_configuration().set_module_filters(module_filters);
}

/// A parsed `--log-level` argument.
#[derive(Debug, Default, PartialEq)]
pub struct LogLevelArg {
    pub global: Option<LevelFilter>,
    pub modules: Vec<(String, LevelFilter)>,
}

fn parse_level(level: &str) -> Result<LevelFilter, CtqueueError> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| CtqueueError::IllegalArgument(format!("invalid log level `{level}`")))
}

impl FromStr for LogLevelArg {
    type Err = CtqueueError;

    /// Accepts `level`, or a comma separated list of `module=level` entries, optionally mixed
    /// with one bare `level` for the global filter.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parsed = LogLevelArg::default();
        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((module, level)) if !module.trim().is_empty() => {
                    parsed
                        .modules
                        .push((module.trim().to_string(), parse_level(level)?));
                }
                Some(_) => {
                    return Err(CtqueueError::IllegalArgument(format!(
                        "missing module name in log filter `{entry}`"
                    )));
                }
                None => parsed.global = Some(parse_level(entry)?),
            }
        }
        Ok(parsed)
    }
}

/// Installs the filters described by a `--log-level` argument. When only module filters are
/// given, the global level is left unchanged.
///
/// # Errors
///
/// Returns `CtqueueError::IllegalArgument` if the argument cannot be parsed.
pub fn configure_from_arg(arg: &str) -> Result<LogLevelArg, CtqueueError> {
    let parsed: LogLevelArg = arg.parse()?;
    if let Some(level) = parsed.global {
        set_log_level(level);
    }
    let filters: Vec<(&str, LevelFilter)> = parsed
        .modules
        .iter()
        .map(|(module, level)| (module.as_str(), *level))
        .collect();
    set_module_filters(&filters);
    Ok(parsed)
}

/// Fetches the global `LogConfiguration`. A poisoned lock only means another thread panicked
/// while logging; the configuration itself is still usable.
fn get_log_configuration() -> MutexGuard<'static, LogConfiguration> {
    LOG_CONFIGURATION
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
