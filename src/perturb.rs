//! Load perturbation source: transient execution-cost overrides.
//!
//! Runs on its own timer, decoupled from the scheduler tick. Each window it
//! overwrites the configured jobs' execution costs, holds them for the dwell
//! period, then restores the values it replaced. Because the scheduler reads
//! costs fresh at dispatch time, the override takes effect on the very next
//! tick; no synchronization beyond the job-table guard is needed, and a tick
//! that raced ahead with the old value is fine.

use crate::clock::{duration_us, Micros};
use crate::config::PerturbationConfig;
use crate::job::JobTable;
use crate::threading::sleep_while_running;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub struct LoadPerturbation {
    interval: Duration,
    dwell: Duration,
    overrides: Vec<(usize, Micros)>,
    jobs: Arc<JobTable>,
}

impl LoadPerturbation {
    pub fn new(config: &PerturbationConfig, jobs: Arc<JobTable>) -> Self {
        Self {
            interval: config.interval,
            dwell: config.dwell,
            overrides: config
                .overrides
                .iter()
                .map(|over| (over.job_id, duration_us(over.cost)))
                .collect(),
            jobs,
        }
    }

    /// Apply every override, returning the costs that were replaced so they
    /// can be restored after the dwell window.
    pub fn apply(&self) -> Vec<(usize, Micros)> {
        let mut saved = Vec::with_capacity(self.overrides.len());
        for &(job_id, cost_us) in &self.overrides {
            if let Some(previous) = self.jobs.set_cost_us(job_id, cost_us) {
                warn!(job_id, cost_us, previous_us = previous, "load window: cost raised");
                saved.push((job_id, previous));
            }
        }
        saved
    }

    /// Put back the costs captured by [`LoadPerturbation::apply`].
    pub fn restore(&self, saved: &[(usize, Micros)]) {
        for &(job_id, cost_us) in saved {
            self.jobs.set_cost_us(job_id, cost_us);
            warn!(job_id, cost_us, "load window: cost restored");
        }
    }

    /// Alternate between quiet intervals and dwell windows until shutdown.
    /// Costs are always restored before exiting, even mid-window.
    pub fn run(&self, running: Arc<AtomicBool>) {
        while sleep_while_running(&running, self.interval) {
            let saved = self.apply();
            let finished = sleep_while_running(&running, self.dwell);
            self.restore(&saved);
            if !finished {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CostOverride, SchedulerConfig};

    #[test]
    fn apply_and_restore_round_trip_costs() {
        let config = SchedulerConfig::default();
        let jobs = Arc::new(JobTable::new(&config.jobs, 0));
        let perturb = LoadPerturbation::new(&PerturbationConfig::default(), jobs.clone());

        let saved = perturb.apply();
        assert_eq!(jobs.cost_us(1), Some(35_000));
        assert_eq!(jobs.cost_us(2), Some(90_000));

        perturb.restore(&saved);
        assert_eq!(jobs.cost_us(1), Some(20_000));
        assert_eq!(jobs.cost_us(2), Some(60_000));
    }

    #[test]
    fn unknown_override_target_is_skipped() {
        let config = SchedulerConfig::default();
        let jobs = Arc::new(JobTable::new(&config.jobs, 0));
        let perturb = LoadPerturbation::new(
            &PerturbationConfig {
                overrides: vec![CostOverride {
                    job_id: 42,
                    cost: Duration::from_millis(1),
                }],
                ..PerturbationConfig::default()
            },
            jobs,
        );
        assert!(perturb.apply().is_empty());
    }
}
