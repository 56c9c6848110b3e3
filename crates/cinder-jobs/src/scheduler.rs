//! Worker-pool job scheduler with counter-based joins.
//!
//! The scheduler is the only concurrency entry point in the engine: the
//! emitter pipeline submits `fork` batches for particle ranges and waits
//! on a [`JobCounter`] between phases. It is an explicitly constructed
//! object; simulation code receives it by reference, and dropping it
//! joins every worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::spin::SpinLock;

/// Per-invocation job context handed to job callbacks.
#[derive(Debug)]
pub struct JobArgs<'a> {
    /// Global index within the forked range (`0` for single jobs).
    pub job_index: u32,
    /// Index relative to the start of this job's group.
    pub group_index: u32,
    /// True for the first index of the group.
    pub first_in_group: bool,
    /// True for the last index of the group.
    pub last_in_group: bool,
    /// Per-worker scratch buffer, if requested at fork time.
    ///
    /// Reused across jobs on the same worker and never zeroed; callers
    /// must not assume clean state.
    pub scratch: Option<&'a mut [u8]>,
}

/// Counter-based join handle for submitted jobs.
///
/// Cloning shares the same counter. A counter may be reused across
/// submissions once [`JobScheduler::wait`] has returned.
#[derive(Debug, Clone, Default)]
pub struct JobCounter {
    pending: Arc<AtomicU32>,
}

impl JobCounter {
    /// Creates a counter with no pending jobs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs still pending.
    #[must_use]
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    /// True when every submitted job has finished.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.pending() == 0
    }

    fn add(&self, n: u32) {
        self.pending.fetch_add(n, Ordering::AcqRel);
    }

    fn finish_one(&self) {
        self.pending.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Type-erased job callback.
type JobFn = Arc<dyn Fn(&mut JobArgs<'_>) + Send + Sync>;

/// One queued dispatch: a contiguous index range sharing a callback.
struct Job {
    func: JobFn,
    begin: u32,
    end: u32,
    scratch_size: usize,
    counter: JobCounter,
}

impl Job {
    /// Runs every index in the job's range, then retires the counter.
    fn run(&self, scratch: &mut Vec<u8>) {
        if self.scratch_size > 0 && scratch.len() < self.scratch_size {
            scratch.resize(self.scratch_size, 0);
        }
        for id in self.begin..self.end {
            let mut args = JobArgs {
                job_index: id,
                group_index: id - self.begin,
                first_in_group: id == self.begin,
                last_in_group: id + 1 == self.end,
                scratch: if self.scratch_size > 0 {
                    Some(&mut scratch[..self.scratch_size])
                } else {
                    None
                },
            };
            (self.func)(&mut args);
        }
        self.counter.finish_one();
    }
}

/// A single worker's queue.
#[derive(Default)]
struct Queue {
    jobs: SpinLock<VecDeque<Job>>,
}

impl Queue {
    fn push(&self, job: Job) {
        self.jobs.lock().push_back(job);
    }

    fn pop(&self) -> Option<Job> {
        self.jobs.lock().pop_front()
    }

    fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

/// State shared between the scheduler handle and its workers.
struct Shared {
    queues: Vec<Queue>,
    alive: AtomicBool,
    sleep: Mutex<()>,
    wake: Condvar,
}

impl Shared {
    fn any_queued(&self) -> bool {
        self.queues.iter().any(|q| !q.is_empty())
    }
}

/// Fixed pool of worker threads with per-worker job queues.
///
/// # Example
///
/// ```
/// use cinder_jobs::{JobCounter, JobScheduler};
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let scheduler = JobScheduler::new(2);
/// let counter = JobCounter::new();
/// let hits = Arc::new(AtomicU32::new(0));
///
/// let hits_job = Arc::clone(&hits);
/// scheduler.fork(&counter, 100, 16, 0, move |_args| {
///     hits_job.fetch_add(1, Ordering::Relaxed);
/// });
/// scheduler.wait(&counter);
///
/// assert_eq!(hits.load(Ordering::Relaxed), 100);
/// ```
pub struct JobScheduler {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    next_queue: AtomicUsize,
}

impl JobScheduler {
    /// Creates a scheduler with `worker_threads` workers.
    ///
    /// `0` means "all but one hardware thread". The count is always
    /// clamped to `[1, available_parallelism - 1]` (minimum one worker).
    #[must_use]
    pub fn new(worker_threads: usize) -> Self {
        let hw = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let cap = hw.saturating_sub(1).max(1);
        let count = if worker_threads == 0 {
            cap
        } else {
            worker_threads.min(cap).max(1)
        };

        let shared = Arc::new(Shared {
            queues: (0..count).map(|_| Queue::default()).collect(),
            alive: AtomicBool::new(true),
            sleep: Mutex::new(()),
            wake: Condvar::new(),
        });

        let workers = (0..count)
            .map(|index| {
                let shared = Arc::clone(&shared);
                std::thread::Builder::new()
                    .name(format!("cinder-worker-{index}"))
                    .spawn(move || worker_loop(&shared, index))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        debug!(workers = count, "job scheduler started");
        Self {
            shared,
            workers,
            next_queue: AtomicUsize::new(0),
        }
    }

    /// Number of worker threads in the pool.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.shared.queues.len()
    }

    /// `ceil(job_count / group_size)`; `0` when either argument is zero.
    #[must_use]
    pub const fn group_count(job_count: u32, group_size: u32) -> u32 {
        if job_count == 0 || group_size == 0 {
            0
        } else {
            job_count.div_ceil(group_size)
        }
    }

    /// Submits a fire-and-forget job.
    ///
    /// Increments `counter` by one; the callback sees
    /// `job_index == group_index == 0` and both group flags set.
    pub fn add_job<F>(&self, counter: &JobCounter, func: F)
    where
        F: Fn(&mut JobArgs<'_>) + Send + Sync + 'static,
    {
        counter.add(1);
        self.push_job(Job {
            func: Arc::new(func),
            begin: 0,
            end: 1,
            scratch_size: 0,
            counter: counter.clone(),
        });
        self.wake_one();
    }

    /// Splits `[0, job_count)` into groups of `group_size` and submits
    /// one job per group.
    ///
    /// Increments `counter` by the group count. Indices within a group
    /// execute sequentially; group order is unspecified. When
    /// `scratch_size > 0` each invocation receives a per-worker scratch
    /// buffer of at least that size. A zero `job_count` or `group_size`
    /// is a silent no-op.
    pub fn fork<F>(
        &self,
        counter: &JobCounter,
        job_count: u32,
        group_size: u32,
        scratch_size: usize,
        func: F,
    ) where
        F: Fn(&mut JobArgs<'_>) + Send + Sync + 'static,
    {
        let groups = Self::group_count(job_count, group_size);
        if groups == 0 {
            return;
        }
        counter.add(groups);

        let func: JobFn = Arc::new(func);
        for group in 0..groups {
            let begin = group * group_size;
            let end = (begin + group_size).min(job_count);
            self.push_job(Job {
                func: Arc::clone(&func),
                begin,
                end,
                scratch_size,
                counter: counter.clone(),
            });
        }
        self.wake_all();
    }

    /// Blocks until every job tracked by `counter` has finished.
    ///
    /// The calling thread first drains one queue's backlog itself, then
    /// spin-yields until the counter reaches zero. Must not be called
    /// from inside a job that the counter depends on.
    pub fn wait(&self, counter: &JobCounter) {
        let mut scratch = Vec::new();
        let qi = self.next_queue.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len();
        while let Some(job) = self.shared.queues[qi].pop() {
            job.run(&mut scratch);
        }
        while !counter.is_zero() {
            std::thread::yield_now();
        }
    }

    /// Stops and joins every worker. Idempotent; also run on drop.
    ///
    /// Jobs already queued when shutdown begins may or may not run.
    pub fn shutdown(&mut self) {
        if !self.shared.alive.swap(false, Ordering::AcqRel) {
            return;
        }
        {
            let _guard = self.shared.sleep.lock();
            self.shared.wake.notify_all();
        }
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
        debug!("job scheduler shut down");
    }

    fn push_job(&self, job: Job) {
        let qi = self.next_queue.fetch_add(1, Ordering::Relaxed) % self.shared.queues.len();
        self.shared.queues[qi].push(job);
    }

    fn wake_one(&self) {
        let _guard = self.shared.sleep.lock();
        self.shared.wake.notify_one();
    }

    fn wake_all(&self) {
        let _guard = self.shared.sleep.lock();
        self.shared.wake.notify_all();
    }
}

impl Drop for JobScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for JobScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobScheduler")
            .field("workers", &self.worker_count())
            .finish_non_exhaustive()
    }
}

/// Worker body: drain every queue starting at our own, then sleep.
fn worker_loop(shared: &Shared, me: usize) {
    let mut scratch = Vec::new();
    let queue_count = shared.queues.len();

    while shared.alive.load(Ordering::Acquire) {
        let mut ran_any = false;
        for offset in 0..queue_count {
            let qi = (me + offset) % queue_count;
            while let Some(job) = shared.queues[qi].pop() {
                job.run(&mut scratch);
                ran_any = true;
            }
        }

        if !ran_any {
            let mut guard = shared.sleep.lock();
            // Re-check under the sleep mutex so a submit between the scan
            // and this point cannot be missed.
            if !shared.alive.load(Ordering::Acquire) {
                break;
            }
            if shared.any_queued() {
                continue;
            }
            shared.wake.wait(&mut guard);
        }
    }
}
