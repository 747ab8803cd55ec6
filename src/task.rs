use std::sync::Arc;

/// A caller-owned unit of work with one invocable operation.
///
/// Tasks are submitted as [`TaskRef`]s; the pool clones the `Arc` for as
/// long as the task is pending or running, so the work stays alive even if
/// the caller drops its own reference early. The pool never constructs or
/// consumes tasks beyond calling [`Task::run`].
///
/// `run` takes `&self` because the same task may be observed concurrently by
/// listeners and waiters; tasks that mutate state use interior mutability.
pub trait Task: Send + Sync {
  fn run(&self);
}

/// The shared handle under which tasks are scheduled.
pub type TaskRef = Arc<dyn Task>;

/// Identity of an in-flight task.
///
/// Two `TaskRef`s name the same task exactly when they share an allocation;
/// value equality plays no role. A task may be scheduled again once its
/// previous run has completed, under the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TaskKey(usize);

impl TaskKey {
  pub(crate) fn of(task: &TaskRef) -> Self {
    TaskKey(Arc::as_ptr(task) as *const () as usize)
  }

  /// The raw address, for diagnostics only.
  pub(crate) fn addr(&self) -> usize {
    self.0
  }
}
