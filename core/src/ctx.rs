//! The per-call-tree async context: current resumer, stop source and cleanup
//! stack, flowing down through every operation.
//!
//! Inside a running task the context is ambient: the task installs it around
//! every poll of its hosted future, and [`current`] reads it back. A child
//! context can override the resumer while sharing the stop source and
//! cleanup stack with its parent.

use crate::cleanup::CleanupStack;
use crate::op::AsyncOp;
use crate::scheduler::Resumer;
use crate::stop::{StopSource, StopToken};
use std::cell::RefCell;
use std::sync::Arc;

#[derive(Clone)]
pub struct OpCtx {
    resumer: Resumer,
    stop: StopSource,
    cleanup: Arc<CleanupStack>,
}

impl OpCtx {
    /// A root context: inline resumer, fresh stop source, fresh cleanup
    /// stack. This is what `sync_wait` initiates under when no context is
    /// supplied.
    pub fn detached() -> Self {
        OpCtx {
            resumer: Resumer::inline(),
            stop: StopSource::new(),
            cleanup: Arc::new(CleanupStack::new()),
        }
    }

    pub fn resumer(&self) -> &Resumer {
        &self.resumer
    }

    pub fn stop_source(&self) -> &StopSource {
        &self.stop
    }

    pub fn stop_token(&self) -> StopToken {
        self.stop.token()
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.stop_requested()
    }

    pub fn cleanup(&self) -> &Arc<CleanupStack> {
        &self.cleanup
    }

    pub fn with_resumer(&self, resumer: Resumer) -> Self {
        let mut c = self.clone();
        c.resumer = resumer;
        c
    }

    /// Conditionally rebinds the resumer; shares everything else.
    pub fn with_resumer_if(&self, cond: bool, resumer: Resumer) -> Self {
        if cond {
            self.with_resumer(resumer)
        } else {
            self.clone()
        }
    }

    pub fn with_stop(&self, stop: StopSource) -> Self {
        let mut c = self.clone();
        c.stop = stop;
        c
    }

    pub fn with_cleanup(&self, cleanup: Arc<CleanupStack>) -> Self {
        let mut c = self.clone();
        c.cleanup = cleanup;
        c
    }
}

thread_local! {
    static CURRENT: RefCell<Option<OpCtx>> = RefCell::new(None);
}

/// The ambient context of the task running on this thread.
///
/// Panics outside a task; use [`try_current`] to probe.
pub fn current() -> OpCtx {
    try_current().expect("no async context: not running inside a task")
}

pub fn try_current() -> Option<OpCtx> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Installs `ctx` as ambient for the duration of `f`, restoring the previous
/// context afterwards (also on unwind). Tasks call this around every poll.
pub(crate) fn scope<R>(ctx: &OpCtx, f: impl FnOnce() -> R) -> R {
    struct Restore(Option<OpCtx>);
    impl Drop for Restore {
        fn drop(&mut self) {
            let prev = self.0.take();
            CURRENT.with(|c| *c.borrow_mut() = prev);
        }
    }
    let _restore = Restore(CURRENT.with(|c| c.replace(Some(ctx.clone()))));
    f()
}

/// True when a stop has been requested on the ambient context.
pub fn stop_requested() -> bool {
    try_current().map(|c| c.stop_requested()).unwrap_or(false)
}

/// Pushes a cleanup op onto the ambient context's cleanup stack.
pub fn add_cleanup(op: impl AsyncOp<Output = ()> + Send + 'static) {
    current().cleanup().push(op);
}
