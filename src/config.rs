//! Startup-time configuration for the scheduler core.
//!
//! Nothing here is runtime-reconfigurable: the job set, worker count and queue
//! capacities are fixed once the threads are spawned. The defaults reproduce the
//! three-job demo workload (a tight high-priority job, a medium one and a slow
//! background one).

use crate::error::{ConfigError, Result};
use std::time::Duration;

/// Static description of one recurring job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: usize,
    pub name: String,
    /// Higher value means more important.
    pub priority: i32,
    /// Time between recurring releases.
    pub period: Duration,
    /// Estimated execution cost; may be overridden at runtime by the
    /// perturbation source.
    pub cost: Duration,
    /// Relative deadline, measured from release.
    pub deadline: Duration,
}

impl JobSpec {
    pub fn new(
        id: usize,
        name: &str,
        priority: i32,
        period: Duration,
        cost: Duration,
        deadline: Duration,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            priority,
            period,
            cost,
            deadline,
        }
    }
}

/// Configuration of the scheduler loop and worker pool.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between scheduler ticks (not a job period).
    pub tick_interval: Duration,
    /// Maximum number of successful dispatches per tick.
    pub dispatch_budget: usize,
    pub workers: usize,
    pub worker_queue_capacity: usize,
    pub completion_queue_capacity: usize,
    pub jobs: Vec<JobSpec>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(10),
            dispatch_budget: 8,
            workers: 2,
            worker_queue_capacity: 16,
            completion_queue_capacity: 32,
            jobs: vec![
                JobSpec::new(
                    0,
                    "A",
                    3,
                    Duration::from_millis(50),
                    Duration::from_millis(12),
                    Duration::from_millis(40),
                ),
                JobSpec::new(
                    1,
                    "B",
                    2,
                    Duration::from_millis(100),
                    Duration::from_millis(20),
                    Duration::from_millis(60),
                ),
                JobSpec::new(
                    2,
                    "C",
                    1,
                    Duration::from_millis(200),
                    Duration::from_millis(60),
                    Duration::from_millis(150),
                ),
            ],
        }
    }
}

impl SchedulerConfig {
    /// Reject configurations the scheduler must not start with.
    pub fn validate(&self) -> Result<()> {
        if self.jobs.is_empty() {
            return Err(ConfigError::NoJobs);
        }
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.worker_queue_capacity == 0 || self.completion_queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        if self.dispatch_budget == 0 {
            return Err(ConfigError::ZeroDispatchBudget);
        }
        for (index, job) in self.jobs.iter().enumerate() {
            if job.period.is_zero() {
                return Err(ConfigError::ZeroPeriod(job.name.clone()));
            }
            if job.deadline.is_zero() {
                return Err(ConfigError::ZeroDeadline(job.name.clone()));
            }
            if self.jobs[..index].iter().any(|other| other.id == job.id) {
                return Err(ConfigError::DuplicateJobId(job.id));
            }
        }
        Ok(())
    }
}

/// One execution-cost override applied during a perturbation window.
#[derive(Debug, Clone)]
pub struct CostOverride {
    pub job_id: usize,
    pub cost: Duration,
}

/// Configuration of the load perturbation source.
#[derive(Debug, Clone)]
pub struct PerturbationConfig {
    /// Time between perturbation windows, measured from restore to apply.
    pub interval: Duration,
    /// How long the overridden costs stay in effect.
    pub dwell: Duration,
    pub overrides: Vec<CostOverride>,
}

impl Default for PerturbationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            dwell: Duration::from_secs(6),
            overrides: vec![
                CostOverride {
                    job_id: 1,
                    cost: Duration::from_millis(35),
                },
                CostOverride {
                    job_id: 2,
                    cost: Duration::from_millis(90),
                },
            ],
        }
    }
}

impl PerturbationConfig {
    /// Every override must target a job that exists in the scheduler config.
    pub fn validate(&self, jobs: &[JobSpec]) -> Result<()> {
        for over in &self.overrides {
            if !jobs.iter().any(|job| job.id == over.job_id) {
                return Err(ConfigError::UnknownOverrideJob(over.job_id));
            }
        }
        Ok(())
    }
}

/// Configuration of the monitor thread.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub interval: Duration,
    /// Also emit each report as one JSON line.
    pub emit_json: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            emit_json: false,
        }
    }
}
