/*!
 * Thread-Pool Executor
 * Bounded work queue with policy-based pick, task tracking, and waits
 */

use super::registry::TaskRegistry;
use super::types::{ExecutorOptions, ExecutorPolicy, ExecutorStats, TaskPriority, TaskSubmitOptions};
use crate::core::{CoreResult, ErrorModule, SerialKey, Status, StatusCode, TaskId, TimeoutMs};
use log::info;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

const DETAIL_QUEUE_FULL: u32 = 0x0001;

fn task_status(code: StatusCode, message: impl Into<String>) -> Status {
    Status::with_module(code, message, ErrorModule::Task, 0)
}

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueEntry {
    job: Job,
    priority: TaskPriority,
    seq: u64,
}

/// Everything guarded by the one executor mutex, so waits, cancellation,
/// and stats observe a single consistent snapshot.
struct ExecState {
    queue: VecDeque<QueueEntry>,
    stopping: bool,
    active_workers: usize,
    pending_tasks: usize,
    enqueue_seq: u64,
    stats: ExecutorStats,
    options: ExecutorOptions,
    registry: TaskRegistry,
}

struct Inner {
    mu: Mutex<ExecState>,
    work_cv: Condvar,
    idle_cv: Condvar,
}

/// Thread-pool executor.
///
/// Workers start at construction and are joined on drop after draining the
/// queue. `reconfigure` changes policy and queue capacity only; the worker
/// count is fixed for the executor's life.
pub struct ThreadPoolExecutor {
    inner: Arc<Inner>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPoolExecutor {
    pub fn new(options: ExecutorOptions) -> Self {
        let worker_count = normalize_worker_count(options.worker_count);
        info!(
            "Executor starting: workers={}, policy={:?}, queue_capacity={}",
            worker_count, options.policy, options.queue_capacity
        );

        let inner = Arc::new(Inner {
            mu: Mutex::new(ExecState {
                queue: VecDeque::new(),
                stopping: false,
                active_workers: 0,
                pending_tasks: 0,
                enqueue_seq: 0,
                stats: ExecutorStats::default(),
                options: ExecutorOptions { worker_count, ..options },
                registry: TaskRegistry::new(),
            }),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
        });

        let workers = (0..worker_count)
            .map(|_| {
                let inner = Arc::clone(&inner);
                std::thread::spawn(move || inner.worker_loop())
            })
            .collect();

        Self { inner, workers }
    }

    /// Convenience constructor; 0 means hardware parallelism
    pub fn with_workers(worker_count: usize) -> Self {
        Self::new(ExecutorOptions { worker_count, ..ExecutorOptions::default() })
    }

    /// Submit a task with default options, discarding the id
    pub fn submit(&self, f: impl FnOnce() + Send + 'static) -> CoreResult<()> {
        self.submit_ex(f, TaskSubmitOptions::default()).map(|_| ())
    }

    /// Submit a task and return its id for later waits or cancellation
    pub fn submit_ex(
        &self,
        f: impl FnOnce() + Send + 'static,
        options: TaskSubmitOptions,
    ) -> CoreResult<TaskId> {
        let key_mu = if options.serial_key != 0 {
            Some(self.inner.mu.lock().registry.serial_mutex(options.serial_key))
        } else {
            None
        };

        let (id, state) = self.inner.mu.lock().registry.allocate();

        let inner = Arc::clone(&self.inner);
        let job: Job = Box::new(move || {
            let canceled = {
                let _st = inner.mu.lock();
                state.started.store(true, Ordering::Relaxed);
                state.canceled.load(Ordering::Relaxed)
            };
            if canceled {
                // Done without executing; waiters still wake.
                inner.mark_task_done(id, false, false);
                return;
            }

            let outcome = match &key_mu {
                Some(serial_mu) => {
                    let _serial = serial_mu.lock();
                    catch_unwind(AssertUnwindSafe(f))
                }
                None => catch_unwind(AssertUnwindSafe(f)),
            };
            match outcome {
                Ok(()) => inner.mark_task_done(id, true, false),
                Err(_) => inner.mark_task_done(id, false, true),
            }
        });

        match self.enqueue(job, options.priority) {
            Ok(()) => Ok(id),
            Err(status) => {
                self.inner.mu.lock().registry.discard(id);
                Err(status)
            }
        }
    }

    /// Submit into a serial group; tasks sharing a non-zero key never overlap
    pub fn submit_with_key(
        &self,
        serial_key: SerialKey,
        f: impl FnOnce() + Send + 'static,
    ) -> CoreResult<TaskId> {
        self.submit_ex(f, TaskSubmitOptions { serial_key, ..TaskSubmitOptions::default() })
    }

    /// Partition `[begin, end)` into `grain`-sized chunks, submit each as a
    /// Normal-priority task, and wait for all of them.
    pub fn parallel_for(
        &self,
        begin: usize,
        end: usize,
        grain: usize,
        f: impl Fn(usize) + Send + Sync + 'static,
    ) -> CoreResult<()> {
        if end < begin {
            return Err(task_status(StatusCode::InvalidArgument, "end must be >= begin"));
        }
        if begin == end {
            return Ok(());
        }
        let grain = grain.max(1);
        let f = Arc::new(f);

        let mut ids = Vec::new();
        let mut chunk_begin = begin;
        while chunk_begin < end {
            let chunk_end = (chunk_begin + grain).min(end);
            let f = Arc::clone(&f);
            let submitted = self.submit_ex(
                move || {
                    for index in chunk_begin..chunk_end {
                        f(index);
                    }
                },
                TaskSubmitOptions { priority: TaskPriority::Normal, ..TaskSubmitOptions::default() },
            );
            match submitted {
                Ok(id) => ids.push(id),
                Err(status) => {
                    if !ids.is_empty() {
                        let _ = self.wait_batch(&ids, 0);
                    }
                    return Err(status);
                }
            }
            chunk_begin = chunk_end;
        }

        self.wait_batch(&ids, 0)
    }

    /// Wait for one task. `timeout_ms = 0` waits indefinitely; on expiry
    /// returns `WouldBlock`. Ids past the retention window are `NotFound`.
    pub fn wait(&self, id: TaskId, timeout_ms: TimeoutMs) -> CoreResult<()> {
        let mut st = self.inner.mu.lock();
        let Some(state) = st.registry.state(id) else {
            return Err(task_status(StatusCode::NotFound, "task id not found"));
        };

        if timeout_ms == 0 {
            while !state.done.load(Ordering::Relaxed) {
                state.wake.wait(&mut st);
            }
            return Ok(());
        }

        let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);
        while !state.done.load(Ordering::Relaxed) {
            if state.wake.wait_until(&mut st, deadline).timed_out() {
                if state.done.load(Ordering::Relaxed) {
                    return Ok(());
                }
                return Err(task_status(StatusCode::WouldBlock, "wait timeout"));
            }
        }
        Ok(())
    }

    /// Wait for a set of tasks, charging elapsed time against one budget
    pub fn wait_batch(&self, ids: &[TaskId], timeout_ms: TimeoutMs) -> CoreResult<()> {
        let start = Instant::now();
        for &id in ids {
            let mut remain = timeout_ms;
            if timeout_ms != 0 {
                let elapsed = start.elapsed().as_millis();
                if elapsed >= timeout_ms as u128 {
                    return Err(task_status(StatusCode::WouldBlock, "wait batch timeout"));
                }
                remain = timeout_ms - elapsed as TimeoutMs;
            }
            self.wait(id, remain)?;
        }
        Ok(())
    }

    /// Cancel a task that has not started. Started or finished tasks return
    /// `WouldBlock`; the entry still flows through a worker and wakes waiters.
    pub fn try_cancel(&self, id: TaskId) -> CoreResult<()> {
        let mut st = self.inner.mu.lock();
        let Some(state) = st.registry.state(id) else {
            return Err(task_status(StatusCode::NotFound, "task id not found"));
        };
        if state.started.load(Ordering::Relaxed) || state.done.load(Ordering::Relaxed) {
            return Err(task_status(StatusCode::WouldBlock, "task already running or done"));
        }
        state.canceled.store(true, Ordering::Relaxed);
        st.stats.canceled += 1;
        Ok(())
    }

    /// Wait until every task submitted before this call has finished.
    /// Later submissions do not extend the wait.
    pub fn wait_all_submitted_before(&self) -> CoreResult<()> {
        let snapshot = self.inner.mu.lock().registry.last_allocated_id();

        let mut st = self.inner.mu.lock();
        loop {
            match st.registry.min_pending() {
                None => return Ok(()),
                Some(min) if min > snapshot => return Ok(()),
                Some(_) => self.inner.idle_cv.wait(&mut st),
            }
        }
    }

    /// Wait until the queue is drained and every worker is idle
    pub fn wait_all(&self) -> CoreResult<()> {
        let mut st = self.inner.mu.lock();
        while st.pending_tasks != 0 || st.active_workers != 0 {
            self.inner.idle_cv.wait(&mut st);
        }
        Ok(())
    }

    /// Statistics snapshot with a fresh queue depth
    pub fn query_stats(&self) -> ExecutorStats {
        let st = self.inner.mu.lock();
        ExecutorStats { queue_depth: st.queue.len(), ..st.stats }
    }

    /// Change policy and queue capacity. The worker count is never resized.
    pub fn reconfigure(&self, options: ExecutorOptions) -> CoreResult<()> {
        let mut st = self.inner.mu.lock();
        st.options.queue_capacity = options.queue_capacity;
        st.options.enable_work_stealing = options.enable_work_stealing;
        st.options.policy = options.policy;
        info!(
            "Executor reconfigured: policy={:?}, queue_capacity={}",
            options.policy, options.queue_capacity
        );
        Ok(())
    }

    pub fn set_scheduling_policy(&self, policy: ExecutorPolicy) -> CoreResult<()> {
        self.inner.mu.lock().options.policy = policy;
        Ok(())
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn enqueue(&self, job: Job, priority: TaskPriority) -> CoreResult<()> {
        {
            let mut st = self.inner.mu.lock();
            if st.stopping {
                return Err(task_status(
                    StatusCode::InternalError,
                    "executor is stopping, cannot accept new tasks",
                ));
            }
            if st.options.queue_capacity > 0 && st.queue.len() >= st.options.queue_capacity {
                st.stats.rejected += 1;
                return Err(Status::with_module(
                    StatusCode::WouldBlock,
                    "executor queue is full",
                    ErrorModule::Task,
                    DETAIL_QUEUE_FULL,
                ));
            }

            st.enqueue_seq += 1;
            let seq = st.enqueue_seq;
            st.queue.push_back(QueueEntry { job, priority, seq });
            st.pending_tasks += 1;
            st.stats.submitted += 1;
            st.stats.queue_depth = st.queue.len();
            if st.stats.queue_depth > st.stats.queue_high_watermark {
                st.stats.queue_high_watermark = st.stats.queue_depth;
            }
        }
        self.inner.work_cv.notify_one();
        Ok(())
    }
}

impl Default for ThreadPoolExecutor {
    fn default() -> Self {
        Self::new(ExecutorOptions::default())
    }
}

impl Drop for ThreadPoolExecutor {
    fn drop(&mut self) {
        {
            let mut st = self.inner.mu.lock();
            st.stopping = true;
        }
        self.inner.work_cv.notify_all();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!("Executor stopped");
    }
}

impl Inner {
    fn worker_loop(self: Arc<Self>) {
        loop {
            let entry = {
                let mut st = self.mu.lock();
                loop {
                    if st.stopping && st.queue.is_empty() {
                        return;
                    }
                    if !st.queue.is_empty() {
                        break;
                    }
                    self.work_cv.wait(&mut st);
                }
                let idx = pick_index(&st.queue, st.options.policy);
                let entry = st.queue.remove(idx);
                st.active_workers += 1;
                entry
            };

            if let Some(entry) = entry {
                // Task wrappers catch their own panics; this is the backstop
                // for anything that escapes.
                if catch_unwind(AssertUnwindSafe(entry.job)).is_err() {
                    self.mu.lock().stats.failed += 1;
                }
            }

            let mut st = self.mu.lock();
            st.active_workers -= 1;
            if st.pending_tasks > 0 {
                st.pending_tasks -= 1;
            }
            st.stats.queue_depth = st.queue.len();
            self.idle_cv.notify_all();
        }
    }

    fn mark_task_done(&self, id: TaskId, executed: bool, failed: bool) {
        let mut st = self.mu.lock();
        let Some((state, canceled)) = st.registry.mark_done(id) else {
            return;
        };
        state.wake.notify_all();
        if canceled {
            return;
        }
        if failed {
            st.stats.failed += 1;
        } else if executed {
            st.stats.completed += 1;
        }
    }
}

fn normalize_worker_count(worker_count: usize) -> usize {
    if worker_count > 0 {
        return worker_count;
    }
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

/// Queue index the next worker should take, given the active policy
fn pick_index(queue: &VecDeque<QueueEntry>, policy: ExecutorPolicy) -> usize {
    if matches!(policy, ExecutorPolicy::Fifo | ExecutorPolicy::Fair) {
        return 0;
    }

    // Priority / HybridFairPriority: highest priority wins, FIFO by seq
    // within it.
    let mut best = 0;
    let mut best_score = queue[0].priority.score();
    let mut best_seq = queue[0].seq;
    for (idx, entry) in queue.iter().enumerate().skip(1) {
        let score = entry.priority.score();
        if score > best_score || (score == best_score && entry.seq < best_seq) {
            best = idx;
            best_score = score;
            best_seq = entry.seq;
        }
    }
    best
}
