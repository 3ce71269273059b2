//! The default I/O scheduler: a process-wide thread pool constructed and
//! started on first access.

use asynckit_core::{Resumer, ThreadPool};
use once_cell::sync::Lazy;
use std::sync::Arc;

static IO_POOL: Lazy<Arc<ThreadPool>> = Lazy::new(|| {
    let threads = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).max(4);
    let pool = ThreadPool::new("asynckit-io", threads);
    pool.start();
    pool
});

/// The default I/O pool. Lives for the rest of the process once touched.
pub fn io_pool() -> Arc<ThreadPool> {
    IO_POOL.clone()
}

pub fn io_resumer() -> Resumer {
    io_pool().resumer()
}
