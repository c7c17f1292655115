//! Worker execution units and the bounded queues that connect them to the
//! scheduler loop.
//!
//! Each worker owns one bounded command channel and pulls one command at a time:
//! blocked on receive while idle, sleeping for the command's execution cost
//! while "executing". Sleeping rather than spinning models real work and leaves
//! the core free for the scheduler and the other workers. Completions flow back
//! through a single shared bounded channel; when that channel is full the report
//! is dropped and counted, never blocked on.

use crate::clock::{Clock, Micros};
use crate::threading;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::info;

/// How long an idle worker blocks before re-checking the running flag.
const IDLE_RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// One unit of work handed from the scheduler to a worker.
///
/// Ownership transfers to the worker queue at send time; the worker owns the
/// command until execution completes.
#[derive(Debug, Clone)]
pub struct DispatchCommand {
    pub job_id: usize,
    pub priority: i32,
    /// Execution cost to simulate, read fresh from the job table at dispatch.
    pub exec_us: Micros,
    pub abs_deadline_us: Micros,
    pub release_us: Micros,
}

/// Result of one executed command, sent back to the scheduler.
#[derive(Debug, Clone)]
pub struct CompletionReport {
    pub job_id: usize,
    pub finish_us: Micros,
    pub abs_deadline_us: Micros,
    pub release_us: Micros,
}

/// Fixed-size pool of worker units plus the channels wiring them to the
/// scheduler.
///
/// Channel creation happens in [`WorkerPool::new`]; thread spawning is a
/// separate step so tests can exercise the dispatch fabric synchronously
/// without live workers.
pub struct WorkerPool {
    command_txs: Vec<Sender<DispatchCommand>>,
    command_rxs: Mutex<Vec<Option<Receiver<DispatchCommand>>>>,
    completion_tx: Sender<CompletionReport>,
    completion_rx: Receiver<CompletionReport>,
    completion_drops: Arc<AtomicU64>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    pub fn new(
        workers: usize,
        worker_queue_capacity: usize,
        completion_queue_capacity: usize,
    ) -> Self {
        let mut command_txs = Vec::with_capacity(workers);
        let mut command_rxs = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = bounded(worker_queue_capacity);
            command_txs.push(tx);
            command_rxs.push(Some(rx));
        }
        let (completion_tx, completion_rx) = bounded(completion_queue_capacity);
        Self {
            command_txs,
            command_rxs: Mutex::new(command_rxs),
            completion_tx,
            completion_rx,
            completion_drops: Arc::new(AtomicU64::new(0)),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.command_txs.len()
    }

    /// Messages waiting in one worker's command queue.
    pub fn queue_depth(&self, worker: usize) -> usize {
        self.command_txs[worker].len()
    }

    /// Queue depth of every worker, by index.
    pub fn backlogs(&self) -> Vec<usize> {
        self.command_txs.iter().map(|tx| tx.len()).collect()
    }

    /// Index of the worker with the shortest backlog; ties go to the lowest
    /// index.
    pub fn least_loaded(&self) -> usize {
        let mut best = 0;
        let mut best_len = self.command_txs[0].len();
        for (index, tx) in self.command_txs.iter().enumerate().skip(1) {
            let len = tx.len();
            if len < best_len {
                best = index;
                best_len = len;
            }
        }
        best
    }

    /// Non-blocking send of a command to one worker.
    pub fn try_dispatch(
        &self,
        worker: usize,
        command: DispatchCommand,
    ) -> Result<(), TrySendError<DispatchCommand>> {
        self.command_txs[worker].try_send(command)
    }

    /// Non-blocking pop from the shared completion queue.
    pub fn try_next_completion(&self) -> Option<CompletionReport> {
        self.completion_rx.try_recv().ok()
    }

    /// Producer side of the completion queue (held by every worker).
    pub fn completion_sender(&self) -> Sender<CompletionReport> {
        self.completion_tx.clone()
    }

    /// Completions dropped because the completion queue was full.
    pub fn completion_drops(&self) -> u64 {
        self.completion_drops.load(Ordering::Relaxed)
    }

    /// Take ownership of one worker's command receiver.
    ///
    /// Used by [`WorkerPool::spawn`]; tests use it to inspect dispatched
    /// commands directly. Returns `None` once taken.
    pub fn take_command_receiver(&self, worker: usize) -> Option<Receiver<DispatchCommand>> {
        self.command_rxs.lock()[worker].take()
    }

    /// Spawn one thread per worker, pinned round-robin over `cores` when the
    /// platform supports it.
    ///
    /// # Panics
    /// Panics if a worker's receiver has already been taken or a thread cannot
    /// be spawned; both are startup-fatal conditions.
    pub fn spawn(&self, clock: Arc<dyn Clock>, running: Arc<AtomicBool>, cores: &[usize]) {
        let mut handles = self.handles.lock();
        for worker_id in 0..self.worker_count() {
            let rx = self
                .take_command_receiver(worker_id)
                .expect("worker receiver already taken");
            let completion_tx = self.completion_tx.clone();
            let drops = self.completion_drops.clone();
            let clock = clock.clone();
            let running = running.clone();
            let core = cores.get(worker_id % cores.len().max(1)).copied();
            let handle = thread::Builder::new()
                .name(format!("worker-{worker_id}"))
                .spawn(move || {
                    threading::set_thread_priority(2);
                    if let Some(core) = core {
                        threading::set_thread_core(core);
                    }
                    run_worker(worker_id, rx, completion_tx, drops, clock, running);
                })
                .expect("failed to spawn worker thread");
            handles.push(handle);
        }
    }

    /// Wait for all spawned workers to exit.
    pub fn join(&self) {
        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    worker_id: usize,
    commands: Receiver<DispatchCommand>,
    completion_tx: Sender<CompletionReport>,
    completion_drops: Arc<AtomicU64>,
    clock: Arc<dyn Clock>,
    running: Arc<AtomicBool>,
) {
    info!(worker_id, "worker started");
    while running.load(Ordering::Relaxed) {
        match commands.recv_timeout(IDLE_RECV_TIMEOUT) {
            Ok(command) => {
                if command.exec_us > 0 {
                    thread::sleep(Duration::from_micros(command.exec_us as u64));
                }
                let report = CompletionReport {
                    job_id: command.job_id,
                    finish_us: clock.now_us(),
                    abs_deadline_us: command.abs_deadline_us,
                    release_us: command.release_us,
                };
                if completion_tx.try_send(report).is_err() {
                    completion_drops.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(worker_id, "worker stopped");
}
