//! Job table: static recurring-job descriptors plus per-job runtime accounting.
//!
//! The table is the only state shared outside the dispatch/completion queues.
//! A single mutex guards all of it: the scheduler mutates counters and reads
//! costs through that guard, the perturbation source writes costs through it,
//! and the monitor takes whole-table snapshots through it. Nobody ever holds
//! raw references into the table across the guard.

use crate::clock::{duration_us, Micros};
use crate::config::JobSpec;
use crate::worker::CompletionReport;
use parking_lot::Mutex;
use serde::Serialize;

/// One concrete, time-stamped release of a job awaiting dispatch within a tick.
///
/// Created fresh each tick during the release phase and consumed by the same
/// tick's dispatch phase; never persisted across ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyInstance {
    pub job_id: usize,
    /// Priority copied at release time.
    pub priority: i32,
    /// Release timestamp plus the job's relative deadline.
    pub abs_deadline_us: Micros,
    pub release_us: Micros,
}

/// Static parameters and mutable runtime state of one recurring job.
#[derive(Debug)]
struct JobState {
    id: usize,
    name: String,
    priority: i32,
    period_us: Micros,
    deadline_us: Micros,
    /// Estimated execution cost; overwritten by the perturbation source and
    /// read fresh at every dispatch.
    cost_us: Micros,

    next_release_us: Micros,
    releases: u64,
    completions: u64,
    deadline_misses: u64,
    sum_response_us: i64,
    max_response_us: Micros,
}

impl JobState {
    fn from_spec(spec: &JobSpec, start_us: Micros) -> Self {
        Self {
            id: spec.id,
            name: spec.name.clone(),
            priority: spec.priority,
            period_us: duration_us(spec.period),
            deadline_us: duration_us(spec.deadline),
            cost_us: duration_us(spec.cost),
            // All jobs release simultaneously at scheduler start.
            next_release_us: start_us,
            releases: 0,
            completions: 0,
            deadline_misses: 0,
            sum_response_us: 0,
            max_response_us: 0,
        }
    }
}

/// Read-only view of one job's state and derived metrics.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: usize,
    pub name: String,
    pub priority: i32,
    pub period_us: Micros,
    pub cost_us: Micros,
    pub deadline_us: Micros,
    pub releases: u64,
    pub completions: u64,
    pub deadline_misses: u64,
    /// Execution cost over period, as a fraction.
    pub utilization: f64,
    pub avg_response_us: f64,
    pub max_response_us: Micros,
}

/// The shared job table.
pub struct JobTable {
    inner: Mutex<Vec<JobState>>,
}

impl JobTable {
    /// Build the table from a validated job set; every job's first release is
    /// `start_us`.
    pub fn new(specs: &[JobSpec], start_us: Micros) -> Self {
        let jobs = specs
            .iter()
            .map(|spec| JobState::from_spec(spec, start_us))
            .collect();
        Self {
            inner: Mutex::new(jobs),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Release phase: append a [`ReadyInstance`] for every job whose next
    /// release is due, advance its next release by one period, and bump its
    /// release counter. Returns the number of instances appended.
    ///
    /// Non-catch-up semantics: a job that is several periods overdue still
    /// releases exactly once, and its next release moves forward by a single
    /// period. Overload sheds load instead of bursting.
    pub fn release_due(&self, now_us: Micros, out: &mut Vec<ReadyInstance>) -> usize {
        let mut jobs = self.inner.lock();
        let before = out.len();
        for job in jobs.iter_mut() {
            if now_us >= job.next_release_us {
                out.push(ReadyInstance {
                    job_id: job.id,
                    priority: job.priority,
                    abs_deadline_us: job.next_release_us + job.deadline_us,
                    release_us: job.next_release_us,
                });
                job.next_release_us += job.period_us;
                job.releases += 1;
            }
        }
        out.len() - before
    }

    /// Current execution cost, read at dispatch time.
    pub fn cost_us(&self, job_id: usize) -> Option<Micros> {
        let jobs = self.inner.lock();
        jobs.iter().find(|job| job.id == job_id).map(|job| job.cost_us)
    }

    /// Overwrite a job's execution cost. Returns the previous value, or `None`
    /// when the id is unknown.
    pub fn set_cost_us(&self, job_id: usize, cost_us: Micros) -> Option<Micros> {
        let mut jobs = self.inner.lock();
        let job = jobs.iter_mut().find(|job| job.id == job_id)?;
        let previous = job.cost_us;
        job.cost_us = cost_us;
        Some(previous)
    }

    /// Completion phase accounting for one report.
    ///
    /// Increments the completion counter, classifies the deadline outcome
    /// (finishing exactly at the deadline is not a miss) and folds the response
    /// time into the running sum and maximum. Returns `true` when the report is
    /// a deadline miss. Reports for unknown jobs are ignored.
    pub fn record_completion(&self, report: &CompletionReport) -> bool {
        let mut jobs = self.inner.lock();
        let Some(job) = jobs.iter_mut().find(|job| job.id == report.job_id) else {
            return false;
        };
        job.completions += 1;

        let miss = report.finish_us > report.abs_deadline_us;
        if miss {
            job.deadline_misses += 1;
        }

        let response_us = report.finish_us - report.release_us;
        job.sum_response_us += response_us;
        if response_us > job.max_response_us {
            job.max_response_us = response_us;
        }
        miss
    }

    /// Consistent snapshot of every job, taken under the table guard.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        let jobs = self.inner.lock();
        jobs.iter()
            .map(|job| JobSnapshot {
                id: job.id,
                name: job.name.clone(),
                priority: job.priority,
                period_us: job.period_us,
                cost_us: job.cost_us,
                deadline_us: job.deadline_us,
                releases: job.releases,
                completions: job.completions,
                deadline_misses: job.deadline_misses,
                utilization: job.cost_us as f64 / job.period_us as f64,
                avg_response_us: if job.completions > 0 {
                    job.sum_response_us as f64 / job.completions as f64
                } else {
                    0.0
                },
                max_response_us: job.max_response_us,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchedulerConfig;
    use std::time::Duration;

    fn single_job(period_ms: u64, deadline_ms: u64) -> JobTable {
        let spec = JobSpec::new(
            0,
            "solo",
            1,
            Duration::from_millis(period_ms),
            Duration::from_millis(10),
            Duration::from_millis(deadline_ms),
        );
        JobTable::new(&[spec], 0)
    }

    #[test]
    fn all_jobs_release_together_at_start() {
        let config = SchedulerConfig::default();
        let table = JobTable::new(&config.jobs, 5_000);
        let mut ready = Vec::new();

        assert_eq!(table.release_due(4_999, &mut ready), 0);
        assert_eq!(table.release_due(5_000, &mut ready), 3);
        for instance in &ready {
            assert_eq!(instance.release_us, 5_000);
        }
    }

    #[test]
    fn absolute_deadline_is_release_plus_relative_deadline() {
        let table = single_job(50, 40);
        let mut ready = Vec::new();
        table.release_due(0, &mut ready);
        assert_eq!(ready[0].abs_deadline_us, 40_000);

        ready.clear();
        table.release_due(50_000, &mut ready);
        assert_eq!(ready[0].release_us, 50_000);
        assert_eq!(ready[0].abs_deadline_us, 90_000);
    }

    #[test]
    fn overdue_job_releases_once_without_catch_up() {
        let table = single_job(50, 40);
        let mut ready = Vec::new();

        // Three full periods elapse before the first observation.
        assert_eq!(table.release_due(150_000, &mut ready), 1);
        // The next release is one period after the original schedule, not
        // re-anchored to "now" and not burst-released.
        ready.clear();
        assert_eq!(table.release_due(150_000, &mut ready), 1);
        assert_eq!(ready[0].release_us, 50_000);

        let snapshot = &table.snapshot()[0];
        assert_eq!(snapshot.releases, 2);
    }

    #[test]
    fn finish_at_deadline_is_not_a_miss() {
        let table = single_job(50, 40);
        let on_time = CompletionReport {
            job_id: 0,
            finish_us: 40_000,
            abs_deadline_us: 40_000,
            release_us: 0,
        };
        assert!(!table.record_completion(&on_time));

        let late = CompletionReport {
            job_id: 0,
            finish_us: 40_001,
            abs_deadline_us: 40_000,
            release_us: 0,
        };
        assert!(table.record_completion(&late));

        let snapshot = &table.snapshot()[0];
        assert_eq!(snapshot.completions, 2);
        assert_eq!(snapshot.deadline_misses, 1);
    }

    #[test]
    fn response_time_folds_into_sum_and_max() {
        let table = single_job(50, 40);
        for (release, finish) in [(0, 15_000), (50_000, 58_000)] {
            table.record_completion(&CompletionReport {
                job_id: 0,
                finish_us: finish,
                abs_deadline_us: release + 40_000,
                release_us: release,
            });
        }
        let snapshot = &table.snapshot()[0];
        assert_eq!(snapshot.avg_response_us, 11_500.0);
        assert_eq!(snapshot.max_response_us, 15_000);
    }

    #[test]
    fn cost_override_is_visible_immediately() {
        let table = single_job(50, 40);
        assert_eq!(table.cost_us(0), Some(10_000));
        assert_eq!(table.set_cost_us(0, 36_000), Some(10_000));
        assert_eq!(table.cost_us(0), Some(36_000));
        assert_eq!(table.set_cost_us(99, 1), None);
    }

    #[test]
    fn snapshot_reports_utilization() {
        let table = single_job(50, 40);
        let snapshot = &table.snapshot()[0];
        assert!((snapshot.utilization - 0.2).abs() < 1e-9);
    }
}
