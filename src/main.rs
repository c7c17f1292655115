// Scheduler binary: wires the clock, job table, worker pool and control
// threads together, then runs until Ctrl+C.

use rtsched::clock::{Clock, MonotonicClock};
use rtsched::config::{MonitorConfig, PerturbationConfig, SchedulerConfig};
use rtsched::job::JobTable;
use rtsched::monitor::Monitor;
use rtsched::perturb::LoadPerturbation;
use rtsched::scheduler::Scheduler;
use rtsched::threading;
use rtsched::worker::WorkerPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Command-line options parsed from program arguments.
struct CliOptions {
    workers: Option<usize>,
    tick_ms: Option<u64>,
    budget: Option<usize>,
    /// Disable the load perturbation thread.
    no_load_gen: bool,
    /// Have the monitor also emit JSON report lines.
    json_metrics: bool,
}

fn parse_cli_options() -> CliOptions {
    let mut options = CliOptions {
        workers: None,
        tick_ms: None,
        budget: None,
        no_load_gen: false,
        json_metrics: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let (key, value) = match arg.split_once('=') {
            Some((key, value)) => (key.to_string(), Some(value.to_string())),
            None => (arg, None),
        };
        match key.as_str() {
            "--workers" => {
                let value = value.or_else(|| args.next());
                options.workers = value.and_then(|v| v.parse().ok());
            }
            "--tick-ms" => {
                let value = value.or_else(|| args.next());
                options.tick_ms = value.and_then(|v| v.parse().ok());
            }
            "--budget" => {
                let value = value.or_else(|| args.next());
                options.budget = value.and_then(|v| v.parse().ok());
            }
            "--no-load-gen" => options.no_load_gen = true,
            "--json-metrics" => options.json_metrics = true,
            _ => {}
        }
    }
    options
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let options = parse_cli_options();

    let mut config = SchedulerConfig::default();
    if let Some(workers) = options.workers {
        config.workers = workers;
    }
    if let Some(tick_ms) = options.tick_ms {
        config.tick_interval = std::time::Duration::from_millis(tick_ms);
    }
    if let Some(budget) = options.budget {
        config.dispatch_budget = budget;
    }
    let perturb_config = PerturbationConfig::default();
    let monitor_config = MonitorConfig {
        emit_json: options.json_metrics,
        ..MonitorConfig::default()
    };

    // Startup failures are fatal: no scheduling with a broken configuration.
    config.validate()?;
    perturb_config.validate(&config.jobs)?;

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
    let jobs = Arc::new(JobTable::new(&config.jobs, clock.now_us()));
    let pool = Arc::new(WorkerPool::new(
        config.workers,
        config.worker_queue_capacity,
        config.completion_queue_capacity,
    ));

    let running = Arc::new(AtomicBool::new(true));
    let ctrlc_flag = running.clone();
    ctrlc::set_handler(move || {
        ctrlc_flag.store(false, Ordering::Relaxed);
    })?;

    info!(
        workers = config.workers,
        jobs = config.jobs.len(),
        "real-time scheduler starting"
    );

    // Workers pinned round-robin over the first cores, as many as we have.
    let cores: Vec<usize> = (0..config.workers).collect();
    pool.spawn(clock.clone(), running.clone(), &cores);

    let scheduler = Scheduler::new(&config, jobs.clone(), pool.clone(), clock.clone());
    let monitor = Monitor::new(
        &monitor_config,
        jobs.clone(),
        pool.clone(),
        scheduler.dispatch_drop_counter(),
    );
    let perturb = LoadPerturbation::new(&perturb_config, jobs.clone());

    let scheduler_running = running.clone();
    let scheduler_handle = thread::Builder::new()
        .name("scheduler".to_string())
        .spawn(move || {
            threading::set_thread_priority(3);
            scheduler.run(scheduler_running);
        })?;

    let monitor_running = running.clone();
    let monitor_handle = thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || monitor.run(monitor_running))?;

    let perturb_handle = if options.no_load_gen {
        None
    } else {
        let perturb_running = running.clone();
        Some(
            thread::Builder::new()
                .name("load-gen".to_string())
                .spawn(move || perturb.run(perturb_running))?,
        )
    };

    let _ = scheduler_handle.join();
    let _ = monitor_handle.join();
    if let Some(handle) = perturb_handle {
        let _ = handle.join();
    }
    pool.join();

    info!("real-time scheduler stopped");
    Ok(())
}
