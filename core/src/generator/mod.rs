//! Generators: future-hosted ops producing a sequence of values lazily.
//!
//! The hosted body receives a [`Yield`] handle and emits values on demand.
//! Each `next()` is an async op. On the first `next`, the generator captures
//! the parent's context (resumer and stop source) and registers a cleanup
//! entry on the parent that finalizes the generator on unwind, so an
//! abandoned generator still runs its async cleanup before the parent
//! returns. A started generator must not be moved to another context.

use crate::cleanup::CleanupStack;
use crate::continuation::Continuation;
use crate::ctx::{self, OpCtx};
use crate::err::{Error, OpResult};
use crate::op::{AsyncOp, Initiated};
use crate::task::Task;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll, Wake, Waker};

#[cfg(test)]
mod tests;

pub struct Generator<T: Send + 'static> {
    core: Arc<GenCore<T>>,
    started: bool,
}

impl<T: Send + 'static> Generator<T> {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(Yield<T>) -> Fut,
        Fut: Future<Output = OpResult<()>> + Send + 'static,
    {
        let core = Arc::new_cyclic(|weak: &Weak<GenCore<T>>| {
            let fut = Box::pin(f(Yield { core: weak.clone() }));
            GenCore {
                st: Mutex::new(GenSt {
                    fut: Some(fut),
                    run: Run::Idle,
                    value: None,
                    error: None,
                    finished: false,
                    consumer: Continuation::Null,
                    ctx: None,
                    cleanup: Arc::new(CleanupStack::new()),
                }),
            }
        });
        Generator { core, started: false }
    }

    /// The op producing the next value; `Ok(None)` once the body returned.
    pub fn next(&mut self) -> Next<'_, T> {
        Next { gen: self }
    }
}

/// Handed to the generator body; `emit(v).await` hands `v` to the consumer
/// and suspends until the next `next()` drives the body again.
pub struct Yield<T: Send + 'static> {
    core: Weak<GenCore<T>>,
}

impl<T: Send + 'static> Yield<T> {
    pub fn emit(&self, value: T) -> Emit<'_, T> {
        Emit { core: &self.core, value: Some(value), sent: false }
    }
}

pub struct Emit<'y, T: Send + 'static> {
    core: &'y Weak<GenCore<T>>,
    value: Option<T>,
    sent: bool,
}

impl<T: Send + 'static> Future for Emit<'_, T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        // No field is self-referential or relies on pinning guarantees, so
        // projecting through the pin without requiring `T: Unpin` is sound.
        let this = unsafe { self.get_unchecked_mut() };
        if this.sent {
            return Poll::Ready(());
        }
        let core = this.core.upgrade().expect("generator body outlived its frame");
        let consumer = {
            let mut st = core.st.lock();
            debug_assert!(st.value.is_none(), "value emitted before previous one was consumed");
            st.value = this.value.take();
            st.consumer.take()
        };
        this.sent = true;
        if consumer.valid() {
            consumer.resume();
        }
        Poll::Pending
    }
}

pub struct Next<'g, T: Send + 'static> {
    gen: &'g mut Generator<T>,
}

impl<T: Send + 'static> AsyncOp for Next<'_, T> {
    type Output = Option<T>;

    fn is_immediate(&self) -> bool {
        let st = self.gen.core.st.lock();
        st.finished && st.value.is_none() && st.error.is_none()
    }

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let core = self.gen.core.clone();
        if !self.gen.started {
            self.gen.started = true;
            {
                let mut st = core.st.lock();
                let cleanup = st.cleanup.clone();
                // Runs under the parent's resumer and stop source, but
                // pushes cleanup onto its own stack.
                st.ctx = Some(ctx.with_cleanup(cleanup));
            }
            let fin = core.clone();
            ctx.cleanup().push(Task::new(async move {
                GenCore::finalize(fin).await;
                Ok(())
            }));
        }
        GenCore::drive(core);
        let mut st = self.gen.core.st.lock();
        if st.value.is_some() || st.error.is_some() || st.finished {
            Initiated::Done
        } else {
            debug_assert!(!st.consumer.valid(), "generator awaited twice concurrently");
            st.consumer = cont;
            Initiated::Pending
        }
    }

    fn is_failed(&self) -> bool {
        self.gen.core.st.lock().error.is_some()
    }

    fn take_result(&mut self) -> OpResult<Option<T>> {
        let mut st = self.gen.core.st.lock();
        if let Some(e) = st.error.take() {
            return Err(e);
        }
        if let Some(v) = st.value.take() {
            return Ok(Some(v));
        }
        debug_assert!(st.finished, "generator result taken before completion");
        Ok(None)
    }
}

#[derive(Clone, Copy, Debug)]
enum Run {
    Idle,
    Polling,
    Notified,
}

struct GenSt<T: Send + 'static> {
    fut: Option<BoxFuture<'static, OpResult<()>>>,
    run: Run,
    value: Option<T>,
    error: Option<Error>,
    finished: bool,
    consumer: Continuation,
    ctx: Option<OpCtx>,
    /// The generator's own cleanup stack, unwound by the parent's cleanup
    /// entry on abandonment or exhaustion.
    cleanup: Arc<CleanupStack>,
}

struct GenCore<T: Send + 'static> {
    st: Mutex<GenSt<T>>,
}

struct GenWaker<T: Send + 'static> {
    core: Arc<GenCore<T>>,
}

impl<T: Send + 'static> Wake for GenWaker<T> {
    fn wake(self: Arc<Self>) {
        GenCore::drive(self.core.clone());
    }

    fn wake_by_ref(self: &Arc<Self>) {
        GenCore::drive(self.core.clone());
    }
}

impl<T: Send + 'static> GenCore<T> {
    /// Polls the body while it makes progress; single poller enforced by the
    /// `Run` state machine.
    fn drive(core: Arc<Self>) {
        {
            let mut st = core.st.lock();
            if st.finished || st.fut.is_none() {
                return;
            }
            match st.run {
                Run::Idle => st.run = Run::Polling,
                Run::Polling | Run::Notified => {
                    st.run = Run::Notified;
                    return;
                }
            }
        }
        loop {
            let (mut fut, gctx) = {
                let mut st = core.st.lock();
                match st.fut.take() {
                    Some(f) => (f, st.ctx.clone().expect("generator driven before first next")),
                    None => {
                        st.run = Run::Idle;
                        return;
                    }
                }
            };
            let waker = Waker::from(Arc::new(GenWaker { core: core.clone() }));
            let mut cx = Context::from_waker(&waker);
            match ctx::scope(&gctx, || fut.as_mut().poll(&mut cx)) {
                Poll::Ready(res) => {
                    let consumer = {
                        let mut st = core.st.lock();
                        st.finished = true;
                        if let Err(e) = res {
                            st.error = Some(e);
                        }
                        st.run = Run::Idle;
                        st.consumer.take()
                    };
                    if consumer.valid() {
                        consumer.resume();
                    }
                    return;
                }
                Poll::Pending => {
                    let mut st = core.st.lock();
                    if st.finished {
                        // Finalized while suspended; the body is abandoned.
                        st.run = Run::Idle;
                        return;
                    }
                    st.fut = Some(fut);
                    match st.run {
                        Run::Notified => {
                            st.run = Run::Polling;
                            continue;
                        }
                        Run::Polling => {
                            st.run = Run::Idle;
                            return;
                        }
                        Run::Idle => unreachable!("generator idle while polling"),
                    }
                }
            }
        }
    }

    /// Parent-side finalization: abandon the body (running its destructors)
    /// and unwind the generator's own cleanup stack.
    async fn finalize(core: Arc<Self>) {
        let (fut, cleanup) = {
            let mut st = core.st.lock();
            let _ = st.consumer.take();
            st.finished = true;
            (st.fut.take(), st.cleanup.clone())
        };
        drop(fut);
        cleanup.unwind().await;
    }
}
