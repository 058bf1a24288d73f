use crate::abort_client::ClearingAbort;
use crate::task::ReversalTask;
use edgepay_metrics::Metrics;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct Shared {
    tasks: Vec<ReversalTask>,
    stopping: bool,
}

/// Background single-consumer compensation queue. Runs its own dedicated
/// thread as a single-threaded cooperative loop, so it never blocks or
/// competes with the worker pool. `enqueue` is safe to call from any
/// worker thread.
pub struct ReversalQueue {
    state: Arc<(Mutex<Shared>, Condvar)>,
    worker: Option<JoinHandle<()>>,
}

impl ReversalQueue {
    pub fn start(
        abort_client: Arc<dyn ClearingAbort>,
        metrics: Arc<Metrics>,
        max_attempts: u32,
        base_delay: Duration,
    ) -> Self {
        let state = Arc::new((
            Mutex::new(Shared {
                tasks: Vec::new(),
                stopping: false,
            }),
            Condvar::new(),
        ));

        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("edgepay-reversal".to_string())
            .spawn(move || run_loop(worker_state, abort_client, metrics, max_attempts, base_delay))
            .expect("spawning reversal worker thread");

        ReversalQueue {
            state,
            worker: Some(worker),
        }
    }

    /// Appends a task and wakes the worker. Safe from any thread.
    pub fn enqueue(&self, task: ReversalTask) {
        let (mutex, condvar) = &*self.state;
        let mut shared = mutex.lock();
        if shared.stopping {
            return;
        }
        shared.tasks.push(task);
        condvar.notify_one();
    }

    pub fn pending_count(&self) -> usize {
        self.state.0.lock().tasks.len()
    }

    /// Stops accepting new work, lets the current in-flight task finish,
    /// then releases (drops) anything still queued.
    pub fn shutdown(mut self) {
        {
            let (mutex, condvar) = &*self.state;
            let mut shared = mutex.lock();
            shared.stopping = true;
            condvar.notify_one();
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReversalQueue {
    fn drop(&mut self) {
        let (mutex, condvar) = &*self.state;
        mutex.lock().stopping = true;
        condvar.notify_one();
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }
}

fn run_loop(
    state: Arc<(Mutex<Shared>, Condvar)>,
    abort_client: Arc<dyn ClearingAbort>,
    metrics: Arc<Metrics>,
    max_attempts: u32,
    base_delay: Duration,
) {
    let (mutex, condvar) = &*state;
    loop {
        let mut task = {
            let mut shared = mutex.lock();
            loop {
                if shared.stopping {
                    return;
                }
                let now = Instant::now();
                let ready_index = shared
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.next_attempt_at <= now)
                    .min_by_key(|(_, t)| t.next_attempt_at)
                    .map(|(i, _)| i);

                if let Some(index) = ready_index {
                    break shared.tasks.remove(index);
                }

                match shared.tasks.iter().map(|t| t.next_attempt_at).min() {
                    Some(next) => {
                        let wait = next.saturating_duration_since(now);
                        let _ = condvar.wait_for(&mut shared, wait);
                    }
                    None => condvar.wait(&mut shared),
                }
            }
        };

        if abort_client.abort(&task) {
            metrics.incr_reversal_succeeded();
            log::info!(target: "edgepay_reversal", "reversal succeeded for txn {}", task.txn_id);
            continue;
        }

        task.attempts += 1;
        if task.attempts >= max_attempts {
            metrics.incr_reversal_failed();
            log::error!(
                target: "edgepay_reversal",
                "reversal exhausted after {} attempts for txn {}",
                task.attempts,
                task.txn_id
            );
            continue;
        }

        let backoff = base_delay.saturating_mul(1u32 << (task.attempts - 1).min(20));
        task.next_attempt_at = Instant::now() + backoff;
        mutex.lock().tasks.push(task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingAbort {
        succeed_after: u32,
        calls: AtomicU32,
    }

    impl ClearingAbort for CountingAbort {
        fn abort(&self, _task: &ReversalTask) -> bool {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            n >= self.succeed_after
        }
    }

    #[test]
    fn succeeds_eventually_and_increments_metric() {
        let metrics = Arc::new(Metrics::new());
        let abort_client = Arc::new(CountingAbort {
            succeed_after: 1,
            calls: AtomicU32::new(0),
        });
        let queue = ReversalQueue::start(
            abort_client,
            Arc::clone(&metrics),
            5,
            Duration::from_millis(1),
        );
        queue.enqueue(ReversalTask::new("txn1", "411111******1111", 1000, "M1"));

        let deadline = Instant::now() + Duration::from_secs(2);
        while metrics.reversal_succeeded() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(metrics.reversal_succeeded(), 1);
        queue.shutdown();
    }

    #[test]
    fn exhausts_after_max_attempts() {
        let metrics = Arc::new(Metrics::new());
        let abort_client = Arc::new(CountingAbort {
            succeed_after: u32::MAX,
            calls: AtomicU32::new(0),
        });
        let queue = ReversalQueue::start(
            abort_client,
            Arc::clone(&metrics),
            2,
            Duration::from_millis(1),
        );
        queue.enqueue(ReversalTask::new("txn1", "411111******1111", 1000, "M1"));

        let deadline = Instant::now() + Duration::from_secs(2);
        while metrics.reversal_failed() == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(metrics.reversal_failed(), 1);
        assert_eq!(metrics.reversal_succeeded(), 0);
        queue.shutdown();
    }

    #[test]
    fn shutdown_joins_the_worker_thread_cleanly() {
        let metrics = Arc::new(Metrics::new());
        let abort_client = Arc::new(CountingAbort {
            succeed_after: 1,
            calls: AtomicU32::new(0),
        });
        let queue = ReversalQueue::start(abort_client, metrics, 5, Duration::from_millis(1));
        queue.shutdown();
    }
}
