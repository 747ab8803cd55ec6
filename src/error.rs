use thiserror::Error;

/// Errors that can occur within the `thread_orchestra` pool.
///
/// The public `bool`-returning operations on [`crate::TaskPoolManager`]
/// handle these internally: every failure is reported through `tracing` and
/// surfaced to the caller as `false`, never as a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Pool is shutting down or already shut down, cannot accept new tasks")]
  ShuttingDown,

  #[error("Pool is at capacity, task was not admitted")]
  AtCapacity,

  #[error("Task is already pending or running in this pool")]
  DuplicateTask,

  #[error("Pool's capacity gate was closed while waiting for admission")]
  GateClosed,

  #[error("Failed to spawn worker thread: {0}")]
  WorkerSpawn(String),
}
