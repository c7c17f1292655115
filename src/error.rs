//! Startup error taxonomy.
//!
//! Only configuration and resource-creation problems are errors here; runtime
//! conditions (full queues, deadline misses) are absorbed as counters and never
//! surface as `Err`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("job set is empty")]
    NoJobs,

    #[error("job {0:?} has a zero period")]
    ZeroPeriod(String),

    #[error("job {0:?} has a zero relative deadline")]
    ZeroDeadline(String),

    #[error("duplicate job id {0}")]
    DuplicateJobId(usize),

    #[error("worker count must be at least 1")]
    NoWorkers,

    #[error("queue capacity must be at least 1")]
    ZeroQueueCapacity,

    #[error("tick interval must be non-zero")]
    ZeroTickInterval,

    #[error("dispatch budget must be at least 1")]
    ZeroDispatchBudget,

    #[error("cost override references unknown job id {0}")]
    UnknownOverrideJob(usize),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
