//! Priority policies decide the order in which queued cases are offered an interview.
//!
//! A policy receives the day's pool (every queued case together with its eligibility for the
//! day) and reorders it in place. All policies must rank every eligible entry ahead of every
//! ineligible one; the queue simulator checks this with [`check_partition`] after each call and
//! aborts the run if it does not hold. Ties that a policy does not break itself fall back to the
//! case identifier, i.e. arrival order, so orderings are reproducible.

use std::cmp::Reverse;
use std::fmt::{self, Display};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::case::{Case, CaseId};
use crate::define_rng;
use crate::rand::RngCore;
use crate::random::RandomStreams;

define_rng!(PolicyRng);

/// A queued case and whether it may be interviewed today.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PoolEntry {
    pub id: CaseId,
    pub eligible: bool,
}

/// An ordering over the day's pool. Implementations must not keep state between days; the
/// random source is passed in so that randomized policies stay reproducible per scenario.
pub trait PriorityPolicy: Send + Sync {
    fn name(&self) -> String;

    /// Reorders `pool` into admission order. `cases` is the whole population, indexed by
    /// [`CaseId`].
    fn order(&self, cases: &[Case], pool: &mut [PoolEntry], streams: &mut RandomStreams);
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Policy {
    /// Ascending swab date.
    #[default]
    OldestSwabFirst,
    /// Descending swab date.
    NewestSwabFirst,
    /// Descending notification date.
    NewestNotificationFirst,
    /// A fresh uniform key per case, redrawn every day.
    Random,
    /// Descending swab date, unvaccinated cases ahead of vaccinated ones on the same day.
    VaccineAwareNewestSwab,
}

impl Policy {
    pub const ALL: [Policy; 5] = [
        Policy::OldestSwabFirst,
        Policy::NewestSwabFirst,
        Policy::NewestNotificationFirst,
        Policy::Random,
        Policy::VaccineAwareNewestSwab,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::OldestSwabFirst => "oldest_swab_first",
            Policy::NewestSwabFirst => "newest_swab_first",
            Policy::NewestNotificationFirst => "newest_notification_first",
            Policy::Random => "random",
            Policy::VaccineAwareNewestSwab => "vaccine_aware_newest_swab",
        }
    }
}

impl Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PriorityPolicy for Policy {
    fn name(&self) -> String {
        self.as_str().to_string()
    }

    fn order(&self, cases: &[Case], pool: &mut [PoolEntry], streams: &mut RandomStreams) {
        let case = |entry: &PoolEntry| &cases[entry.id.index()];
        match self {
            Policy::OldestSwabFirst => {
                pool.sort_by_key(|e| (Reverse(e.eligible), case(e).swab_date, e.id));
            }
            Policy::NewestSwabFirst => {
                pool.sort_by_key(|e| (Reverse(e.eligible), Reverse(case(e).swab_date), e.id));
            }
            Policy::NewestNotificationFirst => {
                pool.sort_by_key(|e| {
                    (
                        Reverse(e.eligible),
                        Reverse(case(e).notification_date),
                        e.id,
                    )
                });
            }
            Policy::Random => {
                // The key function runs exactly once per entry, in pool order.
                pool.sort_by_cached_key(|e| {
                    (
                        Reverse(e.eligible),
                        streams.sample(PolicyRng, RngCore::next_u64),
                        e.id,
                    )
                });
            }
            Policy::VaccineAwareNewestSwab => {
                pool.sort_by_key(|e| {
                    let case = case(e);
                    (
                        Reverse(e.eligible),
                        Reverse(case.swab_date),
                        case.vaccinated,
                        e.id,
                    )
                });
            }
        }
    }
}

/// Returns the 1-based rank of the first eligible entry that follows an ineligible one, if any.
#[must_use]
pub fn check_partition(pool: &[PoolEntry]) -> Option<usize> {
    let first_ineligible = pool.iter().position(|entry| !entry.eligible)?;
    pool[first_ineligible..]
        .iter()
        .position(|entry| entry.eligible)
        .map(|offset| first_ineligible + offset + 1)
}
