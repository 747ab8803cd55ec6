use crate::capacity_gate::CapacityGate;
use crate::error::PoolError;
use crate::listener::{ListenerRef, ListenerSet};
use crate::registry::TaskRegistry;
use crate::task::{TaskKey, TaskRef};

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error, info, trace, warn};

/// Task-side pool state, guarded by the single state lock.
struct PoolState {
  pending: VecDeque<TaskRef>,
  running: usize,
  registry: TaskRegistry,
  stop_requested: bool,
}

/// State shared between the manager and its worker threads.
struct PoolShared {
  pool_name: Arc<String>,
  state: Mutex<PoolState>,
  /// Signalled when a task is appended to `pending` and on shutdown.
  work_available: Condvar,
  /// Signalled when the pool drains (no pending, none running).
  all_done: Condvar,
  /// One slot per admissible task, assigned round-robin by the registry.
  /// All slots pair with the state mutex.
  wait_slots: Vec<Condvar>,
  gate: CapacityGate,
  listeners: ListenerSet,
}

/// A fixed-size pool of worker threads with bounded admission.
///
/// Tasks are admitted FIFO through a capacity gate of `max_queue_length`
/// backlog slots: [`schedule`](TaskPoolManager::schedule) blocks until a
/// slot frees, [`try_schedule`](TaskPoolManager::try_schedule) fails fast.
/// Callers can block on the whole pool draining
/// ([`wait`](TaskPoolManager::wait)) or on one specific task completing
/// ([`wait_for`](TaskPoolManager::wait_for)), and can observe task
/// lifecycle events through registered [`crate::PoolListener`]s.
///
/// All worker threads are spawned up front and live until
/// [`shutdown`](TaskPoolManager::shutdown) (or `Drop`, which performs the
/// same teardown).
pub struct TaskPoolManager {
  shared: Arc<PoolShared>,
  thread_count: usize,
  max_queue_length: usize,
  workers: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskPoolManager {
  /// Creates a pool and spawns all of its worker threads.
  ///
  /// `thread_count = 0` resolves to the host's logical CPU count;
  /// `max_queue_length = 0` resolves to `4 * thread_count`, and explicit
  /// values smaller than `thread_count` are raised to `thread_count`.
  ///
  /// # Errors
  ///
  /// Returns [`PoolError::WorkerSpawn`] if a worker thread cannot be
  /// spawned; any workers spawned before the failure are stopped and
  /// joined.
  pub fn new(thread_count: usize, max_queue_length: usize, pool_name: &str) -> Result<Self, PoolError> {
    let thread_count = if thread_count == 0 {
      num_cpus::get().max(1)
    } else {
      thread_count
    };
    let max_queue_length = if max_queue_length == 0 {
      4 * thread_count
    } else {
      max_queue_length.max(thread_count)
    };

    let pool_name = Arc::new(pool_name.to_string());
    let slot_count = thread_count + max_queue_length;

    let shared = Arc::new(PoolShared {
      pool_name: pool_name.clone(),
      state: Mutex::new(PoolState {
        pending: VecDeque::with_capacity(max_queue_length),
        running: 0,
        registry: TaskRegistry::new(slot_count),
        stop_requested: false,
      }),
      work_available: Condvar::new(),
      all_done: Condvar::new(),
      wait_slots: (0..slot_count).map(|_| Condvar::new()).collect(),
      gate: CapacityGate::new(max_queue_length),
      listeners: ListenerSet::new(pool_name.clone()),
    });

    let mut workers = Vec::with_capacity(thread_count);
    for worker_id in 0..thread_count {
      let worker_shared = shared.clone();
      let spawned = thread::Builder::new()
        .name(format!("{pool_name}-worker-{worker_id}"))
        .spawn(move || worker_loop(worker_id, worker_shared));
      match spawned {
        Ok(handle) => workers.push(handle),
        Err(spawn_error) => {
          error!(pool_name = %*pool_name, worker_id, "Failed to spawn worker thread: {spawn_error}");
          shared.state.lock().stop_requested = true;
          shared.work_available.notify_all();
          for handle in workers {
            let _ = handle.join();
          }
          return Err(PoolError::WorkerSpawn(spawn_error.to_string()));
        }
      }
    }

    info!(pool_name = %*pool_name, thread_count, max_queue_length, "Pool started.");

    Ok(Self {
      shared,
      thread_count,
      max_queue_length,
      workers: Mutex::new(workers),
    })
  }

  pub fn pool_name(&self) -> &str {
    &self.shared.pool_name
  }

  pub fn thread_count(&self) -> usize {
    self.thread_count
  }

  pub fn max_queue_length(&self) -> usize {
    self.max_queue_length
  }

  /// The number of admitted tasks still waiting for a worker.
  pub fn pending_task_count(&self) -> usize {
    self.shared.state.lock().pending.len()
  }

  /// The number of tasks currently executing.
  pub fn running_task_count(&self) -> usize {
    self.shared.state.lock().running
  }

  /// Admits a task, blocking while the backlog is at capacity.
  ///
  /// Returns `true` if the admission attempt succeeded, including the case
  /// where the task was already pending or running and was therefore not
  /// enqueued again. Returns `false` if the pool is shutting down.
  ///
  /// The pool holds a clone of the `Arc` until the task finishes; the same
  /// task may be scheduled again after each completion, but not while it is
  /// still in flight.
  pub fn schedule(&self, task: TaskRef) -> bool {
    match self.admit(task, true) {
      Ok(()) | Err(PoolError::DuplicateTask) => true,
      Err(admission_error) => {
        warn!(pool_name = %*self.shared.pool_name, "Schedule failed: {admission_error}");
        false
      }
    }
  }

  /// Admits a task only if a backlog slot is free right now.
  ///
  /// Returns `false` without blocking or side effects when the pool is at
  /// capacity; otherwise behaves exactly like
  /// [`schedule`](TaskPoolManager::schedule).
  pub fn try_schedule(&self, task: TaskRef) -> bool {
    match self.admit(task, false) {
      Ok(()) | Err(PoolError::DuplicateTask) => true,
      Err(PoolError::AtCapacity) => {
        trace!(pool_name = %*self.shared.pool_name, "try_schedule: pool is at capacity.");
        false
      }
      Err(admission_error) => {
        warn!(pool_name = %*self.shared.pool_name, "try_schedule failed: {admission_error}");
        false
      }
    }
  }

  fn admit(&self, task: TaskRef, blocking: bool) -> Result<(), PoolError> {
    let shared = &self.shared;
    if blocking {
      shared.gate.acquire()?;
    } else {
      shared.gate.try_acquire()?;
    }

    let key = TaskKey::of(&task);
    let mut state = shared.state.lock();

    if state.stop_requested {
      drop(state);
      shared.gate.release();
      return Err(PoolError::ShuttingDown);
    }

    if state.registry.insert(key).is_none() {
      drop(state);
      // A rejected duplicate must return its admission unit, or the
      // backlog capacity would shrink permanently.
      shared.gate.release();
      warn!(
        pool_name = %*shared.pool_name,
        task = %format_args!("{:#x}", key.addr()),
        "Task is already pending or running, not scheduling it again."
      );
      return Err(PoolError::DuplicateTask);
    }

    state.pending.push_back(task);
    let backlog = state.pending.len();
    drop(state);
    shared.work_available.notify_one();

    trace!(
      pool_name = %*shared.pool_name,
      task = %format_args!("{:#x}", key.addr()),
      backlog,
      "Task admitted."
    );
    Ok(())
  }

  /// Blocks until no task is pending and none is running.
  ///
  /// Returns immediately on an idle pool. Tasks scheduled by other threads
  /// while this call is blocked are waited for as well.
  pub fn wait(&self) -> bool {
    let mut state = self.shared.state.lock();
    while !state.pending.is_empty() || state.running > 0 {
      self.shared.all_done.wait(&mut state);
    }
    true
  }

  /// Blocks until `task` is neither pending nor running in this pool.
  ///
  /// Returns immediately for a task that was never scheduled or has already
  /// finished. If the pool is shut down while the task is still queued, the
  /// task is abandoned and this call returns.
  pub fn wait_for(&self, task: &TaskRef) -> bool {
    let key = TaskKey::of(task);
    let mut state = self.shared.state.lock();
    // Slots are shared round-robin, so every wakeup re-checks membership.
    while let Some(slot) = state.registry.slot_of(&key) {
      self.shared.wait_slots[slot].wait(&mut state);
    }
    true
  }

  /// Registers a listener for task lifecycle events.
  ///
  /// Listener identity is `Arc` allocation identity; re-adding a registered
  /// listener is a reported no-op. See [`crate::PoolListener`] for the
  /// reentrancy contract.
  pub fn add_listener(&self, listener: ListenerRef) -> bool {
    self.shared.listeners.add(listener)
  }

  /// Unregisters a listener; removing one that is not registered is a
  /// reported no-op.
  pub fn remove_listener(&self, listener: &ListenerRef) -> bool {
    self.shared.listeners.remove(listener)
  }

  /// Stops the pool: wakes and joins every worker thread.
  ///
  /// Tasks already executing run to completion (the join waits for them).
  /// Tasks still queued are abandoned: they never run, their registry
  /// entries are dropped and any `wait_for` callers parked on them are
  /// released. Producers blocked in [`schedule`](TaskPoolManager::schedule)
  /// are woken and fail. Shutting down with outstanding work is reported as
  /// a caller-contract violation but proceeds.
  ///
  /// Idempotent; also run by `Drop`. Must not be called from a task or
  /// listener callback, which would self-join the worker thread.
  pub fn shutdown(&self) {
    {
      let mut state = self.shared.state.lock();
      if state.stop_requested {
        debug!(pool_name = %*self.shared.pool_name, "Shutdown already requested.");
      } else {
        if !state.pending.is_empty() || state.running > 0 {
          warn!(
            pool_name = %*self.shared.pool_name,
            pending = state.pending.len(),
            running = state.running,
            "Shutdown requested while tasks are still pending or running."
          );
        }
        state.stop_requested = true;

        let mut abandoned = 0usize;
        while let Some(task) = state.pending.pop_front() {
          let key = TaskKey::of(&task);
          if let Some(slot) = state.registry.remove(&key) {
            self.shared.wait_slots[slot].notify_all();
          }
          self.shared.gate.release();
          abandoned += 1;
        }
        if abandoned > 0 {
          warn!(
            pool_name = %*self.shared.pool_name,
            abandoned,
            "Abandoned queued task(s); they will never run."
          );
        }
      }
    }

    self.shared.gate.close();
    self.shared.work_available.notify_all();
    self.shared.all_done.notify_all();

    let workers = std::mem::take(&mut *self.workers.lock());
    for handle in workers {
      if handle.join().is_err() {
        // Task and listener panics are caught inside the loop, so a worker
        // panic would be a bug in the pool itself.
        error!(pool_name = %*self.shared.pool_name, "A worker thread panicked.");
      }
    }

    info!(pool_name = %*self.shared.pool_name, "Pool shut down.");
  }
}

impl Drop for TaskPoolManager {
  fn drop(&mut self) {
    let already_stopped = self.shared.state.lock().stop_requested;
    if !already_stopped {
      info!(
        pool_name = %*self.shared.pool_name,
        "TaskPoolManager dropped without explicit shutdown, shutting down implicitly."
      );
    }
    // Still joins any workers left behind by an interrupted shutdown.
    self.shutdown();
  }
}

/// The per-thread dequeue/announce/execute/finalize loop.
fn worker_loop(worker_id: usize, shared: Arc<PoolShared>) {
  trace!(pool_name = %*shared.pool_name, worker_id, "Worker started.");

  loop {
    let task = {
      let mut state = shared.state.lock();
      loop {
        if state.stop_requested {
          trace!(pool_name = %*shared.pool_name, worker_id, "Worker observed stop request, exiting.");
          return;
        }
        if let Some(task) = state.pending.pop_front() {
          // The backlog slot frees as soon as the task leaves the queue.
          shared.gate.release();
          state.running += 1;
          break task;
        }
        shared.work_available.wait(&mut state);
      }
    };

    let key = TaskKey::of(&task);
    debug!(
      pool_name = %*shared.pool_name,
      worker_id,
      task = %format_args!("{:#x}", key.addr()),
      "Executing task."
    );

    shared.listeners.notify_launched(&task);

    if catch_unwind(AssertUnwindSafe(|| task.run())).is_err() {
      error!(
        pool_name = %*shared.pool_name,
        worker_id,
        task = %format_args!("{:#x}", key.addr()),
        "Task panicked during execution."
      );
    }

    shared.listeners.notify_finished(&task);

    let mut state = shared.state.lock();
    state.running -= 1;
    if let Some(slot) = state.registry.remove(&key) {
      shared.wait_slots[slot].notify_all();
    }
    if state.running == 0 && state.pending.is_empty() {
      shared.all_done.notify_all();
    }
  }
}
