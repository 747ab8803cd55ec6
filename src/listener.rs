use crate::task::{TaskKey, TaskRef};

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error};

/// A caller-owned observer of task lifecycle events.
///
/// Both callbacks run synchronously on the worker thread that executes the
/// task, in listener registration order: `task_launched` immediately before
/// the task's operation, `task_finished` immediately after it, including
/// when the operation panicked.
///
/// Callbacks are invoked while the pool holds its listener lock. A listener
/// must therefore not call back into the same pool (schedule, wait, or
/// listener registration) from within a notification, or it risks
/// self-deadlock. A panicking listener is caught and reported; it does not
/// disturb the worker or the other listeners.
pub trait PoolListener: Send + Sync {
  fn task_launched(&self, task: &TaskRef);
  fn task_finished(&self, task: &TaskRef);
}

/// The shared handle under which listeners are registered.
pub type ListenerRef = Arc<dyn PoolListener>;

fn listener_key(listener: &ListenerRef) -> usize {
  Arc::as_ptr(listener) as *const () as usize
}

/// Listener membership, guarded by its own lock.
///
/// This lock is deliberately distinct from the pool's task-state lock:
/// notification dispatch never touches scheduling state, so a slow listener
/// cannot stall admission or dequeue.
pub(crate) struct ListenerSet {
  pool_name: Arc<String>,
  entries: Mutex<Vec<ListenerRef>>,
}

impl ListenerSet {
  pub(crate) fn new(pool_name: Arc<String>) -> Self {
    Self {
      pool_name,
      entries: Mutex::new(Vec::new()),
    }
  }

  /// Registers a listener. Re-adding an already registered listener is a
  /// reported no-op, not an error.
  pub(crate) fn add(&self, listener: ListenerRef) -> bool {
    let key = listener_key(&listener);
    let mut entries = self.entries.lock();
    if entries.iter().any(|l| listener_key(l) == key) {
      debug!(pool_name = %*self.pool_name, listener = %format_args!("{key:#x}"), "Listener already registered, ignoring.");
      return true;
    }
    entries.push(listener);
    debug!(pool_name = %*self.pool_name, listener = %format_args!("{key:#x}"), "Added listener. Total listeners: {}", entries.len());
    true
  }

  /// Unregisters a listener. Removing an unknown listener is a reported
  /// no-op, not an error.
  pub(crate) fn remove(&self, listener: &ListenerRef) -> bool {
    let key = listener_key(listener);
    let mut entries = self.entries.lock();
    match entries.iter().position(|l| listener_key(l) == key) {
      Some(index) => {
        entries.remove(index);
        debug!(pool_name = %*self.pool_name, listener = %format_args!("{key:#x}"), "Removed listener. Total listeners: {}", entries.len());
      }
      None => {
        debug!(pool_name = %*self.pool_name, listener = %format_args!("{key:#x}"), "Listener was not registered, ignoring removal.");
      }
    }
    true
  }

  pub(crate) fn notify_launched(&self, task: &TaskRef) {
    self.notify(task, "task_launched", |listener| listener.task_launched(task));
  }

  pub(crate) fn notify_finished(&self, task: &TaskRef) {
    self.notify(task, "task_finished", |listener| listener.task_finished(task));
  }

  fn notify(&self, task: &TaskRef, event: &str, callback: impl Fn(&dyn PoolListener)) {
    let entries = self.entries.lock();
    for listener in entries.iter() {
      if catch_unwind(AssertUnwindSafe(|| callback(listener.as_ref()))).is_err() {
        error!(
          pool_name = %*self.pool_name,
          task = %format_args!("{:#x}", TaskKey::of(task).addr()),
          "A listener panicked during its {event} callback."
        );
      }
    }
  }
}
