use std::fmt::{self, Debug, Display};
use std::io;

/// Provides `CtqueueError` and maps to other errors to
/// convert to a `CtqueueError`
#[derive(Debug)]
#[allow(clippy::module_name_repetitions)]
pub enum CtqueueError {
    IoError(io::Error),
    JsonError(serde_json::Error),
    CSVError(csv::Error),
    /// A configuration value is outside its accepted range. Raised before any simulation runs.
    InvalidParameter {
        name: &'static str,
        reason: String,
    },
    /// A priority policy ranked an ineligible case ahead of an eligible one.
    PolicyContract {
        policy: String,
        day: u32,
        rank: usize,
    },
    ArrivalGeneration(String),
    ReportError(String),
    IllegalArgument(String),
    CtqueueError(String),
}

impl From<io::Error> for CtqueueError {
    fn from(error: io::Error) -> Self {
        CtqueueError::IoError(error)
    }
}

impl From<serde_json::Error> for CtqueueError {
    fn from(error: serde_json::Error) -> Self {
        CtqueueError::JsonError(error)
    }
}

impl From<csv::Error> for CtqueueError {
    fn from(error: csv::Error) -> Self {
        CtqueueError::CSVError(error)
    }
}

impl From<String> for CtqueueError {
    fn from(error: String) -> Self {
        CtqueueError::CtqueueError(error)
    }
}

impl From<&str> for CtqueueError {
    fn from(error: &str) -> Self {
        CtqueueError::CtqueueError(error.to_string())
    }
}

impl std::error::Error for CtqueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CtqueueError::IoError(e) => Some(e),
            CtqueueError::JsonError(e) => Some(e),
            CtqueueError::CSVError(e) => Some(e),
            _ => None,
        }
    }
}

impl Display for CtqueueError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CtqueueError::InvalidParameter { name, reason } => {
                write!(f, "Error: invalid parameter `{name}`: {reason}")
            }
            CtqueueError::PolicyContract { policy, day, rank } => write!(
                f,
                "Error: policy `{policy}` ranked an ineligible case ahead of an eligible one \
                 (day {day}, rank {rank})"
            ),
            _ => write!(f, "Error: {self:?}"),
        }
    }
}
