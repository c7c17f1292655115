//! Thread scheduling helpers shared by the worker pool and the control threads.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Granularity at which sleeping control threads re-check the running flag.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Sleep for `duration`, waking early when the running flag clears.
///
/// Returns `true` when the full duration elapsed and the flag is still set,
/// `false` when shutdown was requested mid-sleep.
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    let wake_at = Instant::now() + duration;
    loop {
        if !running.load(Ordering::Relaxed) {
            return false;
        }
        let now = Instant::now();
        if now >= wake_at {
            return true;
        }
        std::thread::sleep(SLEEP_SLICE.min(wake_at - now));
    }
}

/// Raise the current thread's scheduling priority where the platform allows.
///
/// On Linux, levels map to real-time policies: 3 and above to `SCHED_FIFO` at
/// priority 90 (scheduler thread), 2 to `SCHED_FIFO` at 70 (workers), 1 to
/// `SCHED_RR` at 30, anything else to `SCHED_OTHER`. Real-time policies need
/// the right capabilities; the call fails silently without them. Elsewhere this
/// is a no-op.
pub fn set_thread_priority(level: i32) {
    #[cfg(target_os = "linux")]
    {
        use libc::{
            pthread_self, pthread_setschedparam, sched_param, SCHED_FIFO, SCHED_OTHER, SCHED_RR,
        };

        let (policy, sched_priority) = match level {
            l if l >= 3 => (SCHED_FIFO, 90),
            2 => (SCHED_FIFO, 70),
            1 => (SCHED_RR, 30),
            _ => (SCHED_OTHER, 0),
        };
        unsafe {
            let mut param: sched_param = std::mem::zeroed();
            param.sched_priority = sched_priority;
            let _ = pthread_setschedparam(pthread_self(), policy, &param);
        }
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = level;
    }
}

/// Pin the current thread to one core where the platform allows; no-op
/// elsewhere. Fails silently when the operation is not permitted.
pub fn set_thread_core(core_id: usize) {
    #[cfg(target_os = "linux")]
    unsafe {
        use libc::{cpu_set_t, pthread_self, pthread_setaffinity_np, CPU_SET, CPU_ZERO};

        let mut set: cpu_set_t = std::mem::zeroed();
        CPU_ZERO(&mut set);
        CPU_SET(core_id, &mut set);
        let _ = pthread_setaffinity_np(pthread_self(), std::mem::size_of::<cpu_set_t>(), &set);
    }
    #[cfg(not(target_os = "linux"))]
    {
        let _ = core_id;
    }
}
