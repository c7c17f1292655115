//! Periodic, priority-driven real-time job scheduler with a load-balanced
//! worker pool and deadline-miss accounting.
//!
//! A single scheduler thread releases recurring jobs on a fixed tick, orders
//! them by priority and earliest deadline, dispatches a bounded number per tick
//! to the least-loaded worker, and drains completion reports into per-job
//! response-time and miss statistics. Independent perturbation and monitor
//! threads exercise and observe the core through the shared job table.

pub mod clock;
pub mod config;
pub mod error;
pub mod job;
pub mod monitor;
pub mod perturb;
pub mod scheduler;
pub mod threading;
pub mod worker;

pub use clock::{Clock, ManualClock, Micros, MonotonicClock};
pub use config::{JobSpec, MonitorConfig, PerturbationConfig, SchedulerConfig};
pub use job::JobTable;
pub use monitor::Monitor;
pub use perturb::LoadPerturbation;
pub use scheduler::{Scheduler, TickSummary};
pub use worker::WorkerPool;
