//! Cases and their per-day interview eligibility.
//!
//! A [`Case`] is created by the arrival generator with no interview date. The queue simulator is
//! the only code that sets the interview date, and it does so at most once. Everything else about
//! a case is fixed at creation.

use serde::{Deserialize, Serialize};

use crate::parameters::Parameters;

/// Value of `time_to_interview` for a case whose eligibility window closed before it was
/// interviewed. Downstream scoring branches on `is_finite()`, so this must never be a large
/// finite number.
pub const MISSED_TIME_TO_INTERVIEW: f64 = f64::INFINITY;

/// Stable identifier of a case: its position in arrival order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CaseId(pub usize);

impl CaseId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The rules that decide whether a notified case may be interviewed on a given day.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EligibilityRules {
    /// Number of days after notification during which a case can still be interviewed.
    pub max_interview_delay: u32,
    /// Cases notified on the current day with a `notification_time` below this fraction arrived
    /// after hours and must wait until the next day.
    pub prop_time_delay: f64,
}

impl From<&Parameters> for EligibilityRules {
    fn from(parameters: &Parameters) -> Self {
        EligibilityRules {
            max_interview_delay: parameters.max_interview_delay,
            prop_time_delay: parameters.prop_time_delay,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CaseState {
    NotNotified,
    /// Notified and still inside the eligibility window. May be blocked for the day by the
    /// after-hours rule.
    Waiting,
    Interviewed,
    Missed,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Case {
    pub id: CaseId,
    pub swab_date: u32,
    pub notification_date: u32,
    pub notification_time: f64,
    pub vaccinated: bool,
    interview_date: Option<u32>,
}

impl Case {
    #[must_use]
    pub fn new(
        id: CaseId,
        swab_date: u32,
        notification_date: u32,
        notification_time: f64,
        vaccinated: bool,
    ) -> Self {
        Case {
            id,
            swab_date,
            notification_date,
            notification_time,
            vaccinated,
            interview_date: None,
        }
    }

    #[must_use]
    pub fn interview_date(&self) -> Option<u32> {
        self.interview_date
    }

    #[must_use]
    pub fn is_interviewed(&self) -> bool {
        self.interview_date.is_some()
    }

    /// Records the interview. Only the queue simulator calls this, and only for cases that are
    /// eligible on `day`.
    pub(crate) fn admit(&mut self, day: u32) {
        debug_assert!(
            self.interview_date.is_none(),
            "case {:?} admitted twice",
            self.id
        );
        if self.interview_date.is_none() {
            self.interview_date = Some(day);
        }
    }

    #[must_use]
    pub fn is_notified(&self, day: u32) -> bool {
        self.notification_date <= day
    }

    /// True once `day` is past the last day on which the case could be interviewed.
    #[must_use]
    pub fn is_expired(&self, day: u32, rules: &EligibilityRules) -> bool {
        u64::from(self.notification_date) + u64::from(rules.max_interview_delay) < u64::from(day)
    }

    /// The after-hours rule only applies on the notification day itself.
    #[must_use]
    pub fn is_after_hours(&self, day: u32, rules: &EligibilityRules) -> bool {
        self.notification_date == day && self.notification_time < rules.prop_time_delay
    }

    /// Notified, not interviewed, not expired and not blocked by the after-hours rule.
    #[must_use]
    pub fn is_eligible(&self, day: u32, rules: &EligibilityRules) -> bool {
        self.is_queued(day, rules) && !self.is_after_hours(day, rules)
    }

    /// Notified, not interviewed and not expired. Queued cases form the pool the priority
    /// policy ranks each day; some of them may still be ineligible for the day.
    #[must_use]
    pub fn is_queued(&self, day: u32, rules: &EligibilityRules) -> bool {
        !self.is_interviewed() && self.is_notified(day) && !self.is_expired(day, rules)
    }

    #[must_use]
    pub fn state(&self, day: u32, rules: &EligibilityRules) -> CaseState {
        if self.is_interviewed() {
            CaseState::Interviewed
        } else if !self.is_notified(day) {
            CaseState::NotNotified
        } else if self.is_expired(day, rules) {
            CaseState::Missed
        } else {
            CaseState::Waiting
        }
    }

    #[must_use]
    pub fn test_turnaround_time(&self) -> u32 {
        self.notification_date - self.swab_date
    }

    /// Days from notification to interview, or `None` if the case was never interviewed.
    #[must_use]
    pub fn time_to_interview(&self) -> Option<u32> {
        self.interview_date
            .map(|interview_date| interview_date - self.notification_date)
    }
}

/// One row of the case table handed to scoring and plotting. Column names are part of the
/// interface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub swab_date: u32,
    pub notification_date: u32,
    pub test_turnaround_time: u32,
    pub vaccinated: bool,
    /// Days from notification to interview; [`MISSED_TIME_TO_INTERVIEW`] for missed cases.
    pub time_to_interview: f64,
}

impl CaseRecord {
    #[must_use]
    pub fn is_missed(&self) -> bool {
        !self.time_to_interview.is_finite()
    }
}

impl From<&Case> for CaseRecord {
    fn from(case: &Case) -> Self {
        CaseRecord {
            swab_date: case.swab_date,
            notification_date: case.notification_date,
            test_turnaround_time: case.test_turnaround_time(),
            vaccinated: case.vaccinated,
            time_to_interview: case
                .time_to_interview()
                .map_or(MISSED_TIME_TO_INTERVIEW, f64::from),
        }
    }
}
