//! Dispatch targets for continuations.
//!
//! A [`Scheduler`] is a long-lived engine that accepts continuations and runs
//! them later; a [`Resumer`] is the small copyable handle used at dispatch
//! sites. The distinguished inline resumer runs continuations synchronously
//! on the caller thread and compares equal only to itself (its identity is
//! the null sentinel).

use crate::continuation::Continuation;
use std::cell::Cell;
use std::sync::Arc;

mod strand;
mod thread_pool;
#[cfg(test)]
mod tests;

pub use strand::Strand;
pub use thread_pool::ThreadPool;

pub trait Scheduler: Send + Sync + 'static {
    /// Must be thread-safe and reentrant: callable from any thread, including
    /// one currently running a continuation dispatched by this scheduler.
    fn post(&self, cont: Continuation);
}

/// Type-erased handle onto a scheduler, or the inline sentinel.
///
/// Equality is pointer identity of the underlying scheduler and answers
/// "am I already on this execution context" for resume fast-paths.
#[derive(Clone, Default)]
pub struct Resumer(Option<Arc<dyn Scheduler>>);

impl Resumer {
    pub fn inline() -> Self {
        Resumer(None)
    }

    pub fn new(sch: Arc<dyn Scheduler>) -> Self {
        Resumer(Some(sch))
    }

    pub fn is_inline(&self) -> bool {
        self.0.is_none()
    }

    /// Stable identity of the underlying scheduler; the inline resumer's
    /// identity is the null sentinel.
    pub fn id(&self) -> usize {
        match &self.0 {
            None => 0,
            Some(s) => Arc::as_ptr(s) as *const () as usize,
        }
    }

    pub fn post(&self, cont: Continuation) {
        match &self.0 {
            None => cont.resume(),
            Some(s) => s.post(cont),
        }
    }

    /// True when the calling thread is currently executing on this resumer's
    /// scheduler. The inline resumer is current everywhere.
    pub fn is_current(&self) -> bool {
        self.is_inline() || self.id() == current_scheduler_id()
    }
}

impl<S: Scheduler> From<Arc<S>> for Resumer {
    fn from(sch: Arc<S>) -> Self {
        Resumer(Some(sch))
    }
}

impl PartialEq for Resumer {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Resumer {}

impl std::fmt::Debug for Resumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_inline() {
            f.write_str("Resumer(inline)")
        } else {
            write!(f, "Resumer({:#x})", self.id())
        }
    }
}

/// Returns a resumer capturing the scheduler. The resumer keeps the
/// scheduler alive, so its lifetime can never exceed the scheduler's.
pub fn get_resumer<S: Scheduler>(sch: &Arc<S>) -> Resumer {
    Resumer(Some(sch.clone()))
}

thread_local! {
    static CURRENT_SCHEDULER: Cell<usize> = Cell::new(0);
}

/// Identity of the scheduler driving the calling thread, 0 when the thread
/// is not a scheduler worker.
pub fn current_scheduler_id() -> usize {
    CURRENT_SCHEDULER.with(|c| c.get())
}

/// Runs `f` with the calling thread advertising `id` as its scheduler
/// identity, restoring the previous identity afterwards (also on unwind).
pub(crate) fn with_scheduler_id<R>(id: usize, f: impl FnOnce() -> R) -> R {
    struct Restore(usize);
    impl Drop for Restore {
        fn drop(&mut self) {
            CURRENT_SCHEDULER.with(|c| c.set(self.0));
        }
    }
    let _restore = Restore(CURRENT_SCHEDULER.with(|c| c.replace(id)));
    f()
}
