//! A fixed-size worker-thread pool for blocking tasks, with bounded
//! admission, per-task completion waiting and lifecycle listeners.

mod capacity_gate;
mod error;
mod listener;
mod pool;
mod registry;
mod task;
mod version;

pub use error::PoolError;
pub use listener::{ListenerRef, PoolListener};
pub use pool::TaskPoolManager;
pub use task::{Task, TaskRef};
pub use version::{version_info, VersionInfo};
