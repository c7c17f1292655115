//! The scheduler control loop.
//!
//! A fixed-interval tick runs four phases in strict order: release due jobs,
//! order the ready instances (priority descending, earliest deadline breaking
//! ties), dispatch up to the per-tick budget to the least-loaded worker, then
//! drain completion reports into the job table.
//!
//! The loop never blocks on a queue. A full worker queue drops the instance for
//! this tick and counts it; instances left over when the budget runs out are
//! dropped too, not carried into the next tick. This is a load-shedding policy:
//! under overload the release counters keep advancing while dispatch falls
//! behind, which is exactly what the miss/drop statistics are there to show.

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::job::{JobTable, ReadyInstance};
use crate::worker::{DispatchCommand, WorkerPool};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Per-tick outcome counters, mainly for tests and tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub released: usize,
    pub dispatched: usize,
    pub dispatch_drops: usize,
    pub completions: usize,
    pub deadline_misses: usize,
}

pub struct Scheduler {
    tick_interval: Duration,
    dispatch_budget: usize,
    jobs: Arc<JobTable>,
    pool: Arc<WorkerPool>,
    clock: Arc<dyn Clock>,
    /// Reusable staging buffer for ready instances, sized to the job count so
    /// the dispatch phase never allocates.
    ready: Vec<ReadyInstance>,
    dispatch_drops: Arc<AtomicU64>,
}

impl Scheduler {
    pub fn new(
        config: &SchedulerConfig,
        jobs: Arc<JobTable>,
        pool: Arc<WorkerPool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let capacity = config.jobs.len();
        Self {
            tick_interval: config.tick_interval,
            dispatch_budget: config.dispatch_budget,
            jobs,
            pool,
            clock,
            ready: Vec::with_capacity(capacity),
            dispatch_drops: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Cumulative count of instances dropped because a worker queue was full.
    pub fn dispatch_drop_counter(&self) -> Arc<AtomicU64> {
        self.dispatch_drops.clone()
    }

    /// Run one scheduling tick at the clock's current time.
    pub fn tick(&mut self) -> TickSummary {
        let now_us = self.clock.now_us();
        let mut summary = TickSummary::default();

        // Phase 1: release.
        self.ready.clear();
        summary.released = self.jobs.release_due(now_us, &mut self.ready);

        // Phase 2: order. Priority descending, then earliest absolute deadline.
        self.ready.sort_unstable_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(a.abs_deadline_us.cmp(&b.abs_deadline_us))
        });

        // Phase 3: dispatch under the per-tick budget. Only successful sends
        // consume budget; a full worker queue drops the instance for this tick.
        for instance in &self.ready {
            if summary.dispatched >= self.dispatch_budget {
                break;
            }
            // Cost is read fresh here so perturbation writes take effect on the
            // very next dispatch.
            let Some(exec_us) = self.jobs.cost_us(instance.job_id) else {
                continue;
            };
            let worker = self.pool.least_loaded();
            let command = DispatchCommand {
                job_id: instance.job_id,
                priority: instance.priority,
                exec_us,
                abs_deadline_us: instance.abs_deadline_us,
                release_us: instance.release_us,
            };
            match self.pool.try_dispatch(worker, command) {
                Ok(()) => {
                    summary.dispatched += 1;
                    debug!(
                        job_id = instance.job_id,
                        worker,
                        priority = instance.priority,
                        deadline_us = instance.abs_deadline_us,
                        "dispatched"
                    );
                }
                Err(_) => {
                    summary.dispatch_drops += 1;
                    self.dispatch_drops.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        job_id = instance.job_id,
                        worker, "worker queue full, instance dropped"
                    );
                }
            }
        }

        // Phase 4: drain completions.
        while let Some(report) = self.pool.try_next_completion() {
            summary.completions += 1;
            if self.jobs.record_completion(&report) {
                summary.deadline_misses += 1;
                warn!(
                    job_id = report.job_id,
                    late_us = report.finish_us - report.abs_deadline_us,
                    "deadline miss"
                );
            }
        }

        summary
    }

    /// Tick until the running flag clears.
    pub fn run(mut self, running: Arc<AtomicBool>) {
        info!(
            tick_ms = self.tick_interval.as_millis() as u64,
            budget = self.dispatch_budget,
            workers = self.pool.worker_count(),
            jobs = self.jobs.len(),
            "scheduler started"
        );
        while running.load(Ordering::Relaxed) {
            self.tick();
            thread::sleep(self.tick_interval);
        }
        info!("scheduler stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::JobSpec;
    use crate::worker::CompletionReport;
    use std::time::Duration;

    fn spec(id: usize, name: &str, priority: i32, period_ms: u64, deadline_ms: u64) -> JobSpec {
        JobSpec::new(
            id,
            name,
            priority,
            Duration::from_millis(period_ms),
            Duration::from_millis(5),
            Duration::from_millis(deadline_ms),
        )
    }

    struct Fixture {
        scheduler: Scheduler,
        pool: Arc<WorkerPool>,
        jobs: Arc<JobTable>,
        clock: Arc<ManualClock>,
    }

    /// Scheduler wired to an un-spawned pool so ticks run synchronously and the
    /// worker queues can be inspected.
    fn fixture(specs: Vec<JobSpec>, workers: usize, capacity: usize, budget: usize) -> Fixture {
        let config = SchedulerConfig {
            workers,
            worker_queue_capacity: capacity,
            dispatch_budget: budget,
            jobs: specs,
            ..SchedulerConfig::default()
        };
        config.validate().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let jobs = Arc::new(JobTable::new(&config.jobs, 0));
        let pool = Arc::new(WorkerPool::new(
            config.workers,
            config.worker_queue_capacity,
            config.completion_queue_capacity,
        ));
        let scheduler = Scheduler::new(&config, jobs.clone(), pool.clone(), clock.clone());
        Fixture {
            scheduler,
            pool,
            jobs,
            clock,
        }
    }

    #[test]
    fn higher_priority_dispatches_first() {
        let mut fx = fixture(
            vec![spec(0, "lo", 1, 100, 80), spec(1, "hi", 5, 100, 80)],
            1,
            8,
            8,
        );
        let summary = fx.scheduler.tick();
        assert_eq!(summary.released, 2);
        assert_eq!(summary.dispatched, 2);

        let rx = fx.pool.take_command_receiver(0).unwrap();
        assert_eq!(rx.try_recv().unwrap().job_id, 1);
        assert_eq!(rx.try_recv().unwrap().job_id, 0);
    }

    #[test]
    fn equal_priority_breaks_ties_by_earliest_deadline() {
        let mut fx = fixture(
            vec![spec(0, "late", 2, 100, 80), spec(1, "soon", 2, 100, 30)],
            1,
            8,
            8,
        );
        fx.scheduler.tick();

        let rx = fx.pool.take_command_receiver(0).unwrap();
        assert_eq!(rx.try_recv().unwrap().job_id, 1);
        assert_eq!(rx.try_recv().unwrap().job_id, 0);
    }

    #[test]
    fn dispatch_targets_least_loaded_worker() {
        let mut fx = fixture(vec![spec(0, "a", 1, 100, 80)], 2, 8, 8);
        // Pre-load worker 0 with two commands.
        for _ in 0..2 {
            fx.pool
                .try_dispatch(
                    0,
                    DispatchCommand {
                        job_id: 0,
                        priority: 1,
                        exec_us: 0,
                        abs_deadline_us: 0,
                        release_us: 0,
                    },
                )
                .unwrap();
        }
        fx.scheduler.tick();
        assert_eq!(fx.pool.queue_depth(1), 1);
    }

    #[test]
    fn budget_caps_dispatches_per_tick() {
        let specs = (0..5).map(|i| spec(i, "j", 2, 100, 80)).collect();
        let mut fx = fixture(specs, 1, 16, 2);
        let summary = fx.scheduler.tick();
        assert_eq!(summary.released, 5);
        assert_eq!(summary.dispatched, 2);
        // Undispatched instances are shed, not carried over: the next tick
        // releases nothing and dispatches nothing.
        fx.clock.advance(10_000);
        let next = fx.scheduler.tick();
        assert_eq!(next.released, 0);
        assert_eq!(next.dispatched, 0);
    }

    #[test]
    fn full_worker_queue_drops_instances_without_consuming_budget() {
        let specs = (0..5).map(|i| spec(i, "j", 2, 100, 80)).collect();
        let mut fx = fixture(specs, 1, 1, 8);
        let summary = fx.scheduler.tick();
        assert_eq!(summary.dispatched, 1);
        assert_eq!(summary.dispatch_drops, 4);
        assert_eq!(fx.scheduler.dispatch_drop_counter().load(Ordering::Relaxed), 4);
    }

    #[test]
    fn completions_drain_in_arrival_order_and_classify_misses() {
        let mut fx = fixture(vec![spec(0, "a", 1, 100, 80)], 1, 8, 8);
        // First tick flushes the simultaneous start release.
        fx.scheduler.tick();

        let tx = fx.pool.completion_sender();
        tx.try_send(CompletionReport {
            job_id: 0,
            finish_us: 80_000,
            abs_deadline_us: 80_000,
            release_us: 0,
        })
        .unwrap();
        tx.try_send(CompletionReport {
            job_id: 0,
            finish_us: 80_001,
            abs_deadline_us: 80_000,
            release_us: 0,
        })
        .unwrap();

        fx.clock.advance(10_000);
        let summary = fx.scheduler.tick();
        assert_eq!(summary.completions, 2);
        assert_eq!(summary.deadline_misses, 1);

        let snapshot = &fx.jobs.snapshot()[0];
        assert_eq!(snapshot.completions, 2);
        assert_eq!(snapshot.deadline_misses, 1);
    }

    #[test]
    fn fixed_clock_run_releases_once_per_period() {
        // Period 50ms, tick 10ms, run 500ms => releases at 0,50,...,450.
        let mut fx = fixture(vec![spec(0, "solo", 1, 50, 40)], 1, 16, 8);
        for _ in 0..50 {
            fx.scheduler.tick();
            fx.clock.advance(10_000);
        }
        let snapshot = &fx.jobs.snapshot()[0];
        assert_eq!(snapshot.releases, 10);
    }

    #[test]
    fn perturbed_cost_is_used_on_the_next_dispatch() {
        let mut fx = fixture(vec![spec(0, "a", 1, 50, 40)], 1, 8, 8);
        fx.scheduler.tick();
        fx.jobs.set_cost_us(0, 36_000);
        fx.clock.advance(50_000);
        fx.scheduler.tick();

        let rx = fx.pool.take_command_receiver(0).unwrap();
        assert_eq!(rx.try_recv().unwrap().exec_us, 5_000);
        assert_eq!(rx.try_recv().unwrap().exec_us, 36_000);
    }
}
