//! The day-by-day interview queue.
//!
//! Each simulated day, from day 1 to the last notification day in the population:
//! 1. Every case that is notified, not yet interviewed and still inside its eligibility window
//!    joins the day's pool, flagged as eligible unless the after-hours rule blocks it today.
//! 2. The priority policy orders the pool. The returned pool must be a reordering of the one
//!    handed in, and eligibility is re-read from the cases rather than trusted from the policy.
//!    The simulator rejects any order that ranks an ineligible case ahead of an eligible one.
//! 3. Walking the order, every eligible case whose 1-based rank is at most the daily capacity is
//!    interviewed today. Capacity is a real number and the comparison is `rank <= capacity`, so a
//!    capacity of 4.8 admits at most four cases.
//!
//! Days run strictly in order: today's interviews decide tomorrow's pool.

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::case::{Case, CaseState, EligibilityRules};
use crate::error::CtqueueError;
use crate::parameters::Parameters;
use crate::policy::{check_partition, PoolEntry, PriorityPolicy};
use crate::random::RandomStreams;

/// Queue activity on one simulated day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyQueueStats {
    pub day: u32,
    /// Cases in the pool that could be interviewed today.
    pub eligible: usize,
    pub admitted: usize,
    /// Cases whose eligibility window closed at the end of the previous day.
    pub expired: usize,
    /// Queued cases left waiting at the end of the day.
    pub backlog: usize,
}

pub struct QueueSimulator<'a> {
    cases: Vec<Case>,
    rules: EligibilityRules,
    capacity: f64,
    policy: &'a dyn PriorityPolicy,
    queue_stats: Vec<DailyQueueStats>,
}

impl<'a> QueueSimulator<'a> {
    #[must_use]
    pub fn new(
        cases: Vec<Case>,
        rules: EligibilityRules,
        capacity: f64,
        policy: &'a dyn PriorityPolicy,
    ) -> Self {
        QueueSimulator {
            cases,
            rules,
            capacity,
            policy,
            queue_stats: Vec::new(),
        }
    }

    /// A simulator using the capacity and eligibility rules in `parameters`.
    #[must_use]
    pub fn from_parameters(
        cases: Vec<Case>,
        parameters: &Parameters,
        policy: &'a dyn PriorityPolicy,
    ) -> Self {
        QueueSimulator::new(
            cases,
            EligibilityRules::from(parameters),
            parameters.capacity(),
            policy,
        )
    }

    /// The last simulated day: the latest notification date, or 0 for an empty population.
    #[must_use]
    pub fn horizon(&self) -> u32 {
        self.cases
            .iter()
            .map(|case| case.notification_date)
            .max()
            .unwrap_or(0)
    }

    #[must_use]
    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    #[must_use]
    pub fn queue_stats(&self) -> &[DailyQueueStats] {
        &self.queue_stats
    }

    #[must_use]
    pub fn into_parts(self) -> (Vec<Case>, Vec<DailyQueueStats>) {
        (self.cases, self.queue_stats)
    }

    /// Runs every day up to and including the horizon.
    ///
    /// # Errors
    ///
    /// Returns `CtqueueError::PolicyContract` if the policy ever ranks an ineligible case ahead
    /// of an eligible one. The run stops at that day.
    pub fn run(&mut self, streams: &mut RandomStreams) -> Result<(), CtqueueError> {
        let horizon = self.horizon();
        if horizon == 0 {
            warn!("nothing to simulate: empty population");
            return Ok(());
        }
        debug!(
            "simulating {} cases over {} days with capacity {} using {}",
            self.cases.len(),
            horizon,
            self.capacity,
            self.policy.name()
        );
        for day in 1..=horizon {
            let stats = self.step(day, streams)?;
            self.queue_stats.push(stats);
        }
        Ok(())
    }

    /// Builds the day's pool of queued cases. Ids come out in arrival order.
    fn pool(&self, day: u32) -> Vec<PoolEntry> {
        self.cases
            .iter()
            .filter(|case| case.is_queued(day, &self.rules))
            .map(|case| PoolEntry {
                id: case.id,
                eligible: case.is_eligible(day, &self.rules),
            })
            .collect()
    }

    /// Checks that `ordered` holds exactly the ids of `pool`, each once, and resets every
    /// entry's eligibility from the case itself. Returns the 1-based rank of the first entry
    /// that breaks this.
    fn verify_reordering(
        &self,
        day: u32,
        pool: &[PoolEntry],
        ordered: &mut [PoolEntry],
    ) -> Option<usize> {
        let mut unseen = vec![false; self.cases.len()];
        for entry in pool {
            unseen[entry.id.index()] = true;
        }
        for (index, entry) in ordered.iter_mut().enumerate() {
            match unseen.get_mut(entry.id.index()) {
                Some(slot) if *slot => *slot = false,
                _ => return Some(index + 1),
            }
            entry.eligible = self.cases[entry.id.index()].is_eligible(day, &self.rules);
        }
        None
    }

    /// Simulates one day.
    fn step(
        &mut self,
        day: u32,
        streams: &mut RandomStreams,
    ) -> Result<DailyQueueStats, CtqueueError> {
        let pool = self.pool(day);
        let eligible = pool.iter().filter(|entry| entry.eligible).count();
        let expired = self
            .cases
            .iter()
            .filter(|case| {
                case.state(day, &self.rules) == CaseState::Missed
                    && case.state(day - 1, &self.rules) != CaseState::Missed
            })
            .count();

        let mut ordered = pool.clone();
        self.policy.order(&self.cases, &mut ordered, streams);
        if let Some(rank) = self
            .verify_reordering(day, &pool, &mut ordered)
            .or_else(|| check_partition(&ordered))
        {
            return Err(CtqueueError::PolicyContract {
                policy: self.policy.name(),
                day,
                rank,
            });
        }
        let pool = ordered;

        let mut admitted = 0;
        for (index, entry) in pool.iter().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let rank = (index + 1) as f64;
            if rank > self.capacity {
                break;
            }
            if entry.eligible {
                self.cases[entry.id.index()].admit(day);
                admitted += 1;
            }
        }

        let stats = DailyQueueStats {
            day,
            eligible,
            admitted,
            expired,
            backlog: pool.len() - admitted,
        };
        trace!(
            "day {}: eligible={} admitted={} expired={} backlog={}",
            day,
            stats.eligible,
            stats.admitted,
            stats.expired,
            stats.backlog
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrivals::generate_population;
    use crate::case::{CaseId, CaseRecord};
    use crate::policy::Policy;
    use std::collections::HashMap;

    fn rules(max_interview_delay: u32, prop_time_delay: f64) -> EligibilityRules {
        EligibilityRules {
            max_interview_delay,
            prop_time_delay,
        }
    }

    fn cases_on(notification_date: u32, n: usize) -> Vec<Case> {
        (0..n)
            .map(|i| Case::new(CaseId(i), notification_date, notification_date, 0.5, false))
            .collect()
    }

    fn simulate(parameters: &Parameters) -> (Vec<Case>, Vec<DailyQueueStats>) {
        let mut streams = RandomStreams::new(parameters.seed);
        let cases = generate_population(&mut streams, parameters).unwrap();
        let mut simulator = QueueSimulator::from_parameters(cases, parameters, &parameters.policy);
        simulator.run(&mut streams).unwrap();
        simulator.into_parts()
    }

    fn missed_proportion(cases: &[Case]) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        let missed = cases.iter().filter(|c| !c.is_interviewed()).count() as f64;
        #[allow(clippy::cast_precision_loss)]
        let total = cases.len() as f64;
        missed / total
    }

    #[test]
    fn fractional_capacity_truncates() {
        let policy = Policy::OldestSwabFirst;
        let mut simulator = QueueSimulator::new(cases_on(1, 5), rules(0, 0.0), 4.8, &policy);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        let interviewed = simulator
            .cases()
            .iter()
            .filter(|c| c.is_interviewed())
            .count();
        assert_eq!(interviewed, 4);
        assert!(!simulator.cases()[4].is_interviewed());
    }

    #[test]
    fn capacity_below_one_admits_nobody() {
        let policy = Policy::OldestSwabFirst;
        let mut simulator = QueueSimulator::new(cases_on(1, 3), rules(3, 0.0), 0.99, &policy);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        assert!(simulator.cases().iter().all(|c| !c.is_interviewed()));
    }

    #[test]
    fn backlog_carries_over_to_later_days() {
        let policy = Policy::OldestSwabFirst;
        let mut cases = cases_on(1, 3);
        // A late case extends the horizon to day 3.
        cases.push(Case::new(CaseId(3), 3, 3, 0.5, false));
        let mut simulator = QueueSimulator::new(cases, rules(5, 0.0), 1.0, &policy);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        let dates: Vec<_> = simulator
            .cases()
            .iter()
            .map(Case::interview_date)
            .collect();
        assert_eq!(dates, vec![Some(1), Some(2), Some(3), None]);
        let stats = simulator.queue_stats();
        assert_eq!(stats.len(), 3);
        assert_eq!(stats[0].backlog, 2);
        assert_eq!(stats[2].eligible, 2);
        assert_eq!(stats[2].backlog, 1);
    }

    #[test]
    fn after_hours_cases_wait_a_day() {
        let policy = Policy::OldestSwabFirst;
        let cases = vec![
            Case::new(CaseId(0), 1, 1, 0.1, false),
            Case::new(CaseId(1), 2, 2, 0.9, false),
        ];
        let mut simulator = QueueSimulator::new(cases, rules(3, 0.5), 10.0, &policy);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        assert_eq!(simulator.cases()[0].interview_date(), Some(2));
        assert_eq!(simulator.cases()[1].interview_date(), Some(2));
    }

    #[test]
    fn expired_cases_are_counted_once() {
        let policy = Policy::OldestSwabFirst;
        let mut cases = cases_on(1, 2);
        cases.push(Case::new(CaseId(2), 5, 5, 0.5, false));
        let mut simulator = QueueSimulator::new(cases, rules(1, 0.0), 0.0, &policy);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        let expired: Vec<_> = simulator.queue_stats().iter().map(|s| s.expired).collect();
        assert_eq!(expired, vec![0, 0, 2, 0, 0]);
    }

    #[test]
    fn empty_population_runs_zero_days() {
        let policy = Policy::Random;
        let mut simulator = QueueSimulator::new(Vec::new(), rules(5, 0.0), 10.0, &policy);
        assert_eq!(simulator.horizon(), 0);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        assert!(simulator.queue_stats().is_empty());
        assert!(simulator.cases().is_empty());
    }

    struct IneligibleFirst;

    impl PriorityPolicy for IneligibleFirst {
        fn name(&self) -> String {
            "ineligible_first".to_string()
        }

        fn order(&self, _cases: &[Case], pool: &mut [PoolEntry], _streams: &mut RandomStreams) {
            pool.sort_by_key(|entry| entry.eligible);
        }
    }

    #[test]
    fn policy_contract_violation_is_fatal() {
        let cases = vec![
            Case::new(CaseId(0), 1, 1, 0.9, false),
            Case::new(CaseId(1), 1, 1, 0.1, false),
        ];
        let policy = IneligibleFirst;
        let mut simulator = QueueSimulator::new(cases, rules(3, 0.5), 5.0, &policy);
        match simulator.run(&mut RandomStreams::new(0)) {
            Err(CtqueueError::PolicyContract { policy, day, rank }) => {
                assert_eq!(policy, "ineligible_first");
                assert_eq!(day, 1);
                assert_eq!(rank, 2);
            }
            other => panic!("expected a policy contract error, got {other:?}"),
        }
    }

    struct EveryoneEligible;

    impl PriorityPolicy for EveryoneEligible {
        fn name(&self) -> String {
            "everyone_eligible".to_string()
        }

        fn order(&self, _cases: &[Case], pool: &mut [PoolEntry], _streams: &mut RandomStreams) {
            for entry in pool.iter_mut() {
                entry.eligible = true;
            }
        }
    }

    #[test]
    fn policies_cannot_change_eligibility() {
        let cases = vec![Case::new(CaseId(0), 1, 1, 0.1, false)];
        let policy = EveryoneEligible;
        let mut simulator = QueueSimulator::new(cases, rules(3, 0.5), 5.0, &policy);
        simulator.run(&mut RandomStreams::new(0)).unwrap();
        // After hours on day 1, so the interview waits for day 2.
        assert_eq!(simulator.cases()[0].interview_date(), Some(2));
        assert_eq!(simulator.queue_stats()[0].admitted, 0);
        assert_eq!(simulator.queue_stats()[0].backlog, 1);
    }

    struct RepeatFirst;

    impl PriorityPolicy for RepeatFirst {
        fn name(&self) -> String {
            "repeat_first".to_string()
        }

        fn order(&self, _cases: &[Case], pool: &mut [PoolEntry], _streams: &mut RandomStreams) {
            let first = pool[0];
            pool.fill(first);
        }
    }

    #[test]
    fn duplicated_entries_are_a_contract_violation() {
        let policy = RepeatFirst;
        let mut simulator = QueueSimulator::new(cases_on(1, 3), rules(3, 0.0), 5.0, &policy);
        match simulator.run(&mut RandomStreams::new(0)) {
            Err(CtqueueError::PolicyContract { policy, day, rank }) => {
                assert_eq!(policy, "repeat_first");
                assert_eq!(day, 1);
                assert_eq!(rank, 2);
            }
            other => panic!("expected a policy contract error, got {other:?}"),
        }
        assert!(simulator.cases().iter().all(|c| !c.is_interviewed()));
    }

    struct SwapInUnqueued;

    impl PriorityPolicy for SwapInUnqueued {
        fn name(&self) -> String {
            "swap_in_unqueued".to_string()
        }

        fn order(&self, cases: &[Case], pool: &mut [PoolEntry], _streams: &mut RandomStreams) {
            pool[0].id = cases[cases.len() - 1].id;
        }
    }

    #[test]
    fn cases_outside_the_pool_are_a_contract_violation() {
        let policy = SwapInUnqueued;
        let mut cases = cases_on(1, 2);
        cases.push(Case::new(CaseId(2), 4, 4, 0.5, false));
        let mut simulator = QueueSimulator::new(cases, rules(3, 0.0), 5.0, &policy);
        assert!(matches!(
            simulator.run(&mut RandomStreams::new(0)),
            Err(CtqueueError::PolicyContract { day: 1, rank: 1, .. })
        ));
        assert!(!simulator.cases()[2].is_interviewed());
    }

    #[test]
    fn daily_admissions_never_exceed_capacity() {
        for policy in Policy::ALL {
            let parameters = Parameters {
                mean_rate: 13.0,
                capacity_ratio: 0.7,
                max_interview_delay: 3,
                prop_time_delay: 0.3,
                proportion_cases_vaccinated: 0.4,
                seed: 17,
                policy,
                ..Parameters::default()
            };
            let (cases, stats) = simulate(&parameters);
            let mut per_day: HashMap<u32, usize> = HashMap::new();
            for case in &cases {
                if let Some(day) = case.interview_date() {
                    *per_day.entry(day).or_default() += 1;
                }
            }
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let cutoff = parameters.capacity().floor() as usize;
            assert!(per_day.values().all(|&n| n <= cutoff), "{policy}");
            assert!(stats.iter().all(|s| s.admitted <= cutoff), "{policy}");
        }
    }

    #[test]
    fn interviews_fall_inside_the_eligibility_window() {
        for policy in Policy::ALL {
            let parameters = Parameters {
                capacity_ratio: 0.9,
                max_interview_delay: 2,
                prop_time_delay: 0.4,
                seed: 3,
                policy,
                ..Parameters::default()
            };
            let (cases, _) = simulate(&parameters);
            for case in &cases {
                if let Some(day) = case.interview_date() {
                    assert!(day >= case.notification_date);
                    assert!(day <= case.notification_date + parameters.max_interview_delay);
                    if day == case.notification_date {
                        assert!(case.notification_time >= parameters.prop_time_delay);
                    }
                }
            }
        }
    }

    #[test]
    fn same_seed_same_outcome() {
        let parameters = Parameters {
            capacity_ratio: 0.8,
            policy: Policy::Random,
            seed: 99,
            ..Parameters::default()
        };
        let (a, stats_a) = simulate(&parameters);
        let (b, stats_b) = simulate(&parameters);
        assert_eq!(a, b);
        assert_eq!(stats_a, stats_b);
    }

    #[test]
    fn more_capacity_never_misses_more() {
        for policy in Policy::ALL {
            let mut previous = f64::INFINITY;
            for capacity_ratio in [0.0, 0.3, 0.6, 0.9, 1.2, 1.5] {
                let parameters = Parameters {
                    capacity_ratio,
                    max_interview_delay: 2,
                    seed: 1234,
                    policy,
                    ..Parameters::default()
                };
                let (cases, _) = simulate(&parameters);
                let missed = missed_proportion(&cases);
                assert!(missed <= previous, "{policy} at {capacity_ratio}");
                previous = missed;
            }
        }
    }

    fn trimmed_missed_proportion(parameters: &Parameters) -> f64 {
        let (cases, _) = simulate(parameters);
        let window = crate::trimmer::trim(&cases, parameters);
        let records: Vec<CaseRecord> = window.iter().map(CaseRecord::from).collect();
        assert!(!records.is_empty());
        #[allow(clippy::cast_precision_loss)]
        let missed = records.iter().filter(|r| r.is_missed()).count() as f64 / records.len() as f64;
        missed
    }

    /// Rate 20, capacity equal to demand, five-day window, no after-hours delay. Oldest-first
    /// keeps up with demand; the newest-first orderings leave old cases behind whenever a busy
    /// day pushes them down the list, and miss around five percent.
    #[test]
    fn capacity_matching_demand() {
        let seeds = 0..10_u64;
        for policy in Policy::ALL {
            let mut total = 0.0;
            for seed in seeds.clone() {
                let parameters = Parameters {
                    mean_rate: 20.0,
                    capacity_ratio: 1.0,
                    max_interview_delay: 5,
                    prop_time_delay: 0.0,
                    proportion_cases_vaccinated: 0.0,
                    days_samples: 50,
                    days_burnin: 5,
                    days_burnout: 5,
                    seed,
                    policy,
                };
                total += trimmed_missed_proportion(&parameters);
            }
            #[allow(clippy::cast_precision_loss)]
            let mean = total / seeds.clone().count() as f64;
            let tolerance = match policy {
                Policy::OldestSwabFirst => 0.02,
                _ => 0.10,
            };
            assert!(mean < tolerance, "{policy}: mean missed {mean}");
        }
    }

    #[test]
    fn spare_capacity_misses_almost_nothing_for_any_policy() {
        for policy in Policy::ALL {
            let parameters = Parameters {
                capacity_ratio: 1.5,
                seed: 2024,
                policy,
                ..Parameters::default()
            };
            let missed = trimmed_missed_proportion(&parameters);
            assert!(missed < 0.01, "{policy}: {missed}");
        }
    }

    #[test]
    fn zero_capacity_misses_everything() {
        for policy in Policy::ALL {
            for seed in [1, 2, 3] {
                let parameters = Parameters {
                    capacity_ratio: 0.0,
                    seed,
                    policy,
                    ..Parameters::default()
                };
                let (cases, _) = simulate(&parameters);
                assert!(!cases.is_empty());
                assert_eq!(missed_proportion(&cases), 1.0);
            }
        }
    }

    #[test]
    fn zero_delay_interviews_on_notification_day() {
        for policy in Policy::ALL {
            let parameters = Parameters {
                capacity_ratio: 0.8,
                max_interview_delay: 0,
                prop_time_delay: 0.0,
                seed: 5,
                policy,
                ..Parameters::default()
            };
            let (cases, _) = simulate(&parameters);
            assert!(cases.iter().any(Case::is_interviewed));
            assert!(cases
                .iter()
                .filter_map(Case::time_to_interview)
                .all(|days| days == 0));
        }
    }

    #[test]
    fn oldest_first_admits_in_swab_order_each_day() {
        let parameters = Parameters {
            capacity_ratio: 0.5,
            max_interview_delay: 4,
            seed: 8,
            policy: Policy::OldestSwabFirst,
            ..Parameters::default()
        };
        let (cases, _) = simulate(&parameters);
        let mut by_day: HashMap<u32, Vec<u32>> = HashMap::new();
        for case in &cases {
            if let Some(day) = case.interview_date() {
                by_day.entry(day).or_default().push(case.swab_date);
            }
        }
        // Under contention nobody left waiting was swabbed before an admitted case.
        let rules = EligibilityRules::from(&parameters);
        for (day, admitted) in &by_day {
            let newest_admitted = admitted.iter().max().unwrap();
            let passed_over = cases.iter().filter(|c| {
                c.interview_date().is_none_or(|d| d > *day)
                    && c.is_notified(*day)
                    && !c.is_expired(*day, &rules)
                    && !c.is_after_hours(*day, &rules)
            });
            for case in passed_over {
                assert!(case.swab_date >= *newest_admitted);
            }
        }
    }
}
