/*!
 * Task Registry
 * Task-id allocation, per-task state, and the serial-key mutex table
 */

use crate::core::{SerialKey, TaskId};
use ahash::RandomState;
use parking_lot::{Condvar, Mutex};
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Completed task states retained for post-hoc waits; ids evicted past this
/// window report `NotFound`.
pub(crate) const MAX_RETAINED_STATES: usize = 65_536;

/// Lifecycle flags of one submitted task.
///
/// All flags are written under the executor mutex; the condvar waits on that
/// same mutex.
pub(crate) struct TaskState {
    pub(crate) started: AtomicBool,
    pub(crate) done: AtomicBool,
    pub(crate) canceled: AtomicBool,
    pub(crate) wake: Condvar,
}

impl TaskState {
    fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            done: AtomicBool::new(false),
            canceled: AtomicBool::new(false),
            wake: Condvar::new(),
        }
    }
}

/// Bookkeeping owned by the executor and guarded by its mutex
pub(crate) struct TaskRegistry {
    next_task_id: TaskId,
    states: HashMap<TaskId, Arc<TaskState>, RandomState>,
    pending_ids: BTreeSet<TaskId>,
    done_ids: VecDeque<TaskId>,
    // Lazily created, never removed during the executor's life.
    serial_keys: HashMap<SerialKey, Arc<Mutex<()>>, RandomState>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            next_task_id: 1,
            states: HashMap::with_hasher(RandomState::new()),
            pending_ids: BTreeSet::new(),
            done_ids: VecDeque::new(),
            serial_keys: HashMap::with_hasher(RandomState::new()),
        }
    }

    /// Allocate a fresh id and register its state as pending
    pub(crate) fn allocate(&mut self) -> (TaskId, Arc<TaskState>) {
        let id = self.next_task_id;
        self.next_task_id += 1;
        let state = Arc::new(TaskState::new());
        self.states.insert(id, Arc::clone(&state));
        self.pending_ids.insert(id);
        (id, state)
    }

    /// Forget a task whose enqueue was rejected
    pub(crate) fn discard(&mut self, id: TaskId) {
        self.states.remove(&id);
        self.pending_ids.remove(&id);
    }

    pub(crate) fn state(&self, id: TaskId) -> Option<Arc<TaskState>> {
        self.states.get(&id).cloned()
    }

    /// Per-key serialization mutex, created on first use
    pub(crate) fn serial_mutex(&mut self, key: SerialKey) -> Arc<Mutex<()>> {
        Arc::clone(self.serial_keys.entry(key).or_insert_with(|| Arc::new(Mutex::new(()))))
    }

    /// Flip a task to done, retire it from the pending set, and evict states
    /// that fell out of the retention window. Returns the state (for waking
    /// waiters) and whether the task was canceled.
    pub(crate) fn mark_done(&mut self, id: TaskId) -> Option<(Arc<TaskState>, bool)> {
        let state = self.states.get(&id).cloned()?;
        state.done.store(true, Ordering::Relaxed);
        self.pending_ids.remove(&id);

        self.done_ids.push_back(id);
        while self.done_ids.len() > MAX_RETAINED_STATES {
            if let Some(old_id) = self.done_ids.pop_front() {
                if let Some(old) = self.states.get(&old_id) {
                    if old.done.load(Ordering::Relaxed) {
                        self.states.remove(&old_id);
                    }
                }
            }
        }

        let canceled = state.canceled.load(Ordering::Relaxed);
        Some((state, canceled))
    }

    /// Highest id handed out so far (0 before the first allocation)
    pub(crate) fn last_allocated_id(&self) -> TaskId {
        self.next_task_id - 1
    }

    /// Smallest id still pending, if any
    pub(crate) fn min_pending(&self) -> Option<TaskId> {
        self.pending_ids.iter().next().copied()
    }
}
