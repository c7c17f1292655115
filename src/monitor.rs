//! Periodic read-only observability over the job table and worker backlogs.
//!
//! The monitor never mutates scheduling state: it snapshots the job table under
//! its guard, queries worker queue depths, and logs the result. Derived metrics
//! (utilization, average/max response) come straight from the table counters.

use crate::config::MonitorConfig;
use crate::job::{JobSnapshot, JobTable};
use crate::threading::sleep_while_running;
use crate::worker::WorkerPool;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One monitor observation: per-job stats plus queue and drop state.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorReport {
    pub jobs: Vec<JobSnapshot>,
    pub worker_backlogs: Vec<usize>,
    pub dispatch_drops: u64,
    pub completion_drops: u64,
}

pub struct Monitor {
    interval: Duration,
    emit_json: bool,
    jobs: Arc<JobTable>,
    pool: Arc<WorkerPool>,
    dispatch_drops: Arc<AtomicU64>,
}

impl Monitor {
    pub fn new(
        config: &MonitorConfig,
        jobs: Arc<JobTable>,
        pool: Arc<WorkerPool>,
        dispatch_drops: Arc<AtomicU64>,
    ) -> Self {
        Self {
            interval: config.interval,
            emit_json: config.emit_json,
            jobs,
            pool,
            dispatch_drops,
        }
    }

    /// Take one observation.
    pub fn report(&self) -> MonitorReport {
        MonitorReport {
            jobs: self.jobs.snapshot(),
            worker_backlogs: self.pool.backlogs(),
            dispatch_drops: self.dispatch_drops.load(Ordering::Relaxed),
            completion_drops: self.pool.completion_drops(),
        }
    }

    fn log_report(&self, report: &MonitorReport) {
        for job in &report.jobs {
            info!(
                name = %job.name,
                priority = job.priority,
                period_ms = job.period_us / 1_000,
                cost_ms = job.cost_us / 1_000,
                deadline_ms = job.deadline_us / 1_000,
                releases = job.releases,
                completions = job.completions,
                misses = job.deadline_misses,
                util_pct = job.utilization * 100.0,
                avg_resp_ms = job.avg_response_us / 1_000.0,
                max_resp_ms = job.max_response_us / 1_000,
                "job stats"
            );
        }
        for (worker, depth) in report.worker_backlogs.iter().enumerate() {
            info!(worker, depth, "worker backlog");
        }
        if report.dispatch_drops > 0 || report.completion_drops > 0 {
            info!(
                dispatch_drops = report.dispatch_drops,
                completion_drops = report.completion_drops,
                "drop counters"
            );
        }
    }

    /// Observe and log on a fixed interval until shutdown.
    pub fn run(&self, running: Arc<AtomicBool>) {
        while sleep_while_running(&running, self.interval) {
            let report = self.report();
            self.log_report(&report);
            if self.emit_json {
                match serde_json::to_string(&report) {
                    Ok(line) => info!(target: "rtsched::metrics", "{line}"),
                    Err(error) => warn!(%error, "failed to serialize monitor report"),
                }
            }
        }
    }
}
