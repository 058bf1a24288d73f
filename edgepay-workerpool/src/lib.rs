//! Bounded FIFO worker pool. `submit` never blocks: when
//! the queue is at capacity it returns `SubmitError::Busy` immediately so
//! the accept loop can fast-fail (`server_busy`) and keep tail latency
//! stable, pushing backpressure onto the caller instead of queueing
//! unboundedly.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: VecDeque<Job>,
    capacity: usize,
    shutting_down: bool,
}

/// Returned by `submit` when the queue is already at `capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Busy;

/// A fixed pool of worker threads draining a bounded FIFO queue through
/// one mutex and one condition variable.
pub struct WorkerPool {
    shared: Arc<(Mutex<Shared>, Condvar)>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(workers: usize, capacity: usize) -> Self {
        let shared = Arc::new((
            Mutex::new(Shared {
                queue: VecDeque::with_capacity(capacity),
                capacity,
                shutting_down: false,
            }),
            Condvar::new(),
        ));

        let handles = (0..workers.max(1))
            .map(|idx| {
                let shared = Arc::clone(&shared);
                thread::Builder::new()
                    .name(format!("edgepay-worker-{idx}"))
                    .spawn(move || worker_loop(shared))
                    .expect("spawning worker thread")
            })
            .collect();

        WorkerPool {
            shared,
            workers: handles,
        }
    }

    /// Enqueues `job` for execution by some worker. Non-blocking: returns
    /// `Err(Busy)` immediately if the queue is already at capacity, and
    /// the job is neither enqueued nor executed in that case.
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) -> Result<(), Busy> {
        let (mutex, condvar) = &*self.shared;
        let mut shared = mutex.lock();
        if shared.shutting_down || shared.queue.len() >= shared.capacity {
            return Err(Busy);
        }
        shared.queue.push_back(Box::new(job));
        condvar.notify_one();
        Ok(())
    }

    pub fn queue_len(&self) -> usize {
        self.shared.0.lock().queue.len()
    }

    /// Flips the shutdown flag, wakes every worker, and joins them.
    /// Anything still queued at that point is dropped, never executed.
    pub fn shutdown(mut self) {
        {
            let (mutex, condvar) = &*self.shared;
            let mut shared = mutex.lock();
            shared.shutting_down = true;
            shared.queue.clear();
            condvar.notify_all();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn worker_loop(shared: Arc<(Mutex<Shared>, Condvar)>) {
    let (mutex, condvar) = &*shared;
    loop {
        let job = {
            let mut guard = mutex.lock();
            loop {
                if guard.shutting_down {
                    return;
                }
                if let Some(job) = guard.queue.pop_front() {
                    break job;
                }
                condvar.wait(&mut guard);
            }
        };
        job();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::{Duration, Instant};

    #[test]
    fn submitted_jobs_run() {
        let pool = WorkerPool::new(2, 4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..10 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }
        let deadline = Instant::now() + Duration::from_secs(2);
        while counter.load(Ordering::SeqCst) < 10 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(counter.load(Ordering::SeqCst), 10);
        pool.shutdown();
    }

    #[test]
    fn submit_returns_busy_when_queue_is_full_and_drops_the_job() {
        let pool = WorkerPool::new(1, 1);
        let barrier = Arc::new(Barrier::new(2));
        let ran = Arc::new(AtomicUsize::new(0));

        // Occupy the single worker so the queue fills up behind it.
        let worker_barrier = Arc::clone(&barrier);
        pool.submit(move || {
            worker_barrier.wait();
        })
        .unwrap();

        let ran_clone = Arc::clone(&ran);
        pool.submit(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        let ran_clone2 = Arc::clone(&ran);
        let result = pool.submit(move || {
            ran_clone2.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(result, Err(Busy));

        barrier.wait();
        let deadline = Instant::now() + Duration::from_secs(2);
        while ran.load(Ordering::SeqCst) < 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        // Only the one job that was actually enqueued ran; the busy one
        // never executed.
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        pool.shutdown();
    }

    #[test]
    fn shutdown_drops_unstarted_queued_jobs() {
        let pool = WorkerPool::new(1, 4);
        let ran = Arc::new(AtomicUsize::new(0));

        // Occupies the single worker long enough that the second job is
        // still sitting in the queue when shutdown() clears it.
        pool.submit(|| thread::sleep(Duration::from_millis(100))).unwrap();

        let ran_clone = Arc::clone(&ran);
        pool.submit(move || {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        pool.shutdown();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }
}
