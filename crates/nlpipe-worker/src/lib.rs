//! Parallel long-poll worker pool: pulls tasks from the store, runs the
//! registered processor, and reports success or failure (spec.md §4.5).

mod pool;

pub use pool::{spawn_pool, WorkerConfig, DEFAULT_POLL_INTERVAL};
