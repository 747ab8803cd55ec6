use crate::task::TaskKey;

use std::collections::HashMap;

/// Maps every in-flight task (queued or running) to its wait slot.
///
/// Wait slots are condition variables held by the pool in a fixed array of
/// size `thread_count + max_queue_length` and assigned round-robin here.
/// Admission is capped at `max_queue_length` not-yet-running tasks and
/// execution at `thread_count` running tasks, so at most
/// `thread_count + max_queue_length` entries are ever live at once. Slots
/// are still shared: a long-running task keeps its slot while later
/// admissions lap the cursor, so waiters must re-check registry membership
/// on every wakeup rather than trust the wakeup itself.
///
/// This is a plain data structure; the pool's state lock provides all
/// synchronization.
pub(crate) struct TaskRegistry {
  slots: HashMap<TaskKey, usize>,
  slot_count: usize,
  next_slot: usize,
}

impl TaskRegistry {
  pub(crate) fn new(slot_count: usize) -> Self {
    Self {
      slots: HashMap::new(),
      slot_count,
      next_slot: 0,
    }
  }

  /// Registers a task and allocates its wait slot.
  ///
  /// Returns `None` if the task is already pending or running.
  pub(crate) fn insert(&mut self, key: TaskKey) -> Option<usize> {
    debug_assert!(self.slots.len() < self.slot_count);
    if self.slots.contains_key(&key) {
      return None;
    }
    let slot = self.next_slot;
    self.next_slot = (self.next_slot + 1) % self.slot_count;
    self.slots.insert(key, slot);
    Some(slot)
  }

  /// Removes a finished or abandoned task, returning its wait slot.
  pub(crate) fn remove(&mut self, key: &TaskKey) -> Option<usize> {
    self.slots.remove(key)
  }

  /// Looks up the wait slot of an in-flight task.
  pub(crate) fn slot_of(&self, key: &TaskKey) -> Option<usize> {
    self.slots.get(key).copied()
  }

  pub(crate) fn len(&self) -> usize {
    self.slots.len()
  }
}
