//! Tasks: future-hosted async ops.
//!
//! A task owns a hosted future producing a single result, a cleanup stack,
//! the continuation of whoever awaits it, and the context its children run
//! under. Initiation polls the future eagerly on the caller thread; wakeups
//! re-poll on the task's resumer. A task migrates between threads only at
//! resumption points, and only to the resumer named at that point.

use crate::cleanup::CleanupStack;
use crate::continuation::Continuation;
use crate::ctx::{self, OpCtx};
use crate::err::OpResult;
use crate::op::{AsyncOp, Initiated};
use crate::stop::StopSource;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

#[cfg(test)]
mod tests;

/// An async op backed by a hosted future.
///
/// Lifecycle: created -> initiated -> (possibly suspended) -> completed ->
/// consumed by the parent. By default the task inherits the stop source of
/// the context that initiates it, so cancellation propagates from root to
/// descendants through shared context handles; [`Task::set_stop_source`]
/// detaches it onto its own source. The cleanup stack is always the task's
/// own and is unwound before the parent is resumed.
pub struct Task<T: Send + 'static> {
    core: Arc<TaskCore<T>>,
    initiated: bool,
}

impl<T: Send + 'static> Task<T> {
    pub fn new<F>(fut: F) -> Self
    where
        F: Future<Output = OpResult<T>> + Send + 'static,
    {
        Task {
            core: Arc::new(TaskCore {
                st: Mutex::new(TaskSt {
                    phase: Phase::Created,
                    run: Run::Idle,
                    main: Some(Box::pin(fut)),
                    finalize: None,
                    ctx: None,
                    cleanup_ctx: None,
                    pending: None,
                    result: None,
                    taken: false,
                    parent: Continuation::Null,
                    stop_override: None,
                }),
            }),
            initiated: false,
        }
    }

    /// Replaces the inherited stop source. Must be called before initiation.
    pub fn set_stop_source(&mut self, src: StopSource) {
        assert!(!self.initiated, "set_stop_source after initiation");
        self.core.st.lock().stop_override = Some(src);
    }
}

impl<T: Send + 'static> AsyncOp for Task<T> {
    type Output = T;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        assert!(!self.initiated, "task initiated twice");
        self.initiated = true;
        {
            let mut st = self.core.st.lock();
            let stop = st.stop_override.take().unwrap_or_else(|| ctx.stop_source().clone());
            st.ctx = Some(
                ctx.with_stop(stop).with_cleanup(Arc::new(CleanupStack::new())),
            );
            st.parent = cont;
            st.phase = Phase::Main;
            st.run = Run::Polling;
        }
        if TaskCore::poll_step(self.core.clone(), true) {
            Initiated::Done
        } else {
            Initiated::Pending
        }
    }

    fn is_failed(&self) -> bool {
        matches!(self.core.st.lock().result, Some(Err(_)))
    }

    fn take_result(&mut self) -> OpResult<T> {
        let mut st = self.core.st.lock();
        assert!(matches!(st.phase, Phase::Done), "task result taken before completion");
        assert!(!st.taken, "task result taken twice");
        st.taken = true;
        st.result.take().unwrap()
    }
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Created,
    Main,
    Cleanup,
    Done,
}

#[derive(Clone, Copy, Debug)]
enum Run {
    Idle,
    Polling,
    Notified,
}

struct TaskSt<T: Send + 'static> {
    phase: Phase,
    run: Run,
    main: Option<BoxFuture<'static, OpResult<T>>>,
    finalize: Option<BoxFuture<'static, ()>>,
    /// Context the hosted future runs under.
    ctx: Option<OpCtx>,
    /// Context the cleanup unwind runs under: same resumer and stack, fresh
    /// never-requested stop source.
    cleanup_ctx: Option<OpCtx>,
    /// Primary result parked while the cleanup stack unwinds.
    pending: Option<OpResult<T>>,
    result: Option<OpResult<T>>,
    taken: bool,
    parent: Continuation,
    stop_override: Option<StopSource>,
}

struct TaskCore<T: Send + 'static> {
    st: Mutex<TaskSt<T>>,
}

struct TaskWaker<T: Send + 'static> {
    core: Arc<TaskCore<T>>,
}

impl<T: Send + 'static> Wake for TaskWaker<T> {
    fn wake(self: Arc<Self>) {
        TaskCore::notify(self.core.clone());
    }

    fn wake_by_ref(self: &Arc<Self>) {
        TaskCore::notify(self.core.clone());
    }
}

impl<T: Send + 'static> TaskCore<T> {
    /// Wakeup entry point. Coalesces with an in-flight poll, otherwise posts
    /// a poll onto the task's resumer.
    fn notify(core: Arc<Self>) {
        let resumer = {
            let mut st = core.st.lock();
            match st.phase {
                Phase::Created | Phase::Done => return,
                Phase::Main | Phase::Cleanup => {}
            }
            match st.run {
                Run::Polling | Run::Notified => {
                    st.run = Run::Notified;
                    return;
                }
                Run::Idle => {
                    st.run = Run::Polling;
                    st.ctx.as_ref().unwrap().resumer().clone()
                }
            }
        };
        resumer.post(Continuation::from_fn(move || {
            Self::poll_step(core, false);
        }));
    }

    /// Drives the task while it makes progress. Returns true when the task
    /// reached `Done` within this call. The `Run` state machine guarantees a
    /// single poller; `initial` suppresses the parent resume so that a
    /// synchronous completion is reported through `Initiated::Done` instead.
    fn poll_step(core: Arc<Self>, initial: bool) -> bool {
        enum Work<T: Send + 'static> {
            Main(BoxFuture<'static, OpResult<T>>, OpCtx),
            Finalize(BoxFuture<'static, ()>, OpCtx),
        }

        loop {
            let work = {
                let mut st = core.st.lock();
                match st.phase {
                    Phase::Main => {
                        Work::Main(st.main.take().unwrap(), st.ctx.clone().unwrap())
                    }
                    Phase::Cleanup => Work::Finalize(
                        st.finalize.take().unwrap(),
                        st.cleanup_ctx.clone().unwrap(),
                    ),
                    phase => unreachable!("task polled in phase {:?}", phase),
                }
            };
            let waker = Waker::from(Arc::new(TaskWaker { core: core.clone() }));
            let mut cx = Context::from_waker(&waker);

            match work {
                Work::Main(mut main, pctx) => {
                    match ctx::scope(&pctx, || main.as_mut().poll(&mut cx)) {
                        Poll::Ready(res) => {
                            let mut st = core.st.lock();
                            st.pending = Some(res);
                            let stack = pctx.cleanup().clone();
                            st.cleanup_ctx = Some(pctx.with_stop(StopSource::new()));
                            st.finalize =
                                Some(Box::pin(async move { stack.unwind().await }));
                            st.phase = Phase::Cleanup;
                            // Absorb any stray notification; we keep polling.
                            st.run = Run::Polling;
                            continue;
                        }
                        Poll::Pending => {
                            let mut st = core.st.lock();
                            st.main = Some(main);
                            match st.run {
                                Run::Notified => {
                                    st.run = Run::Polling;
                                    continue;
                                }
                                Run::Polling => {
                                    st.run = Run::Idle;
                                    return false;
                                }
                                Run::Idle => unreachable!("task idle while polling"),
                            }
                        }
                    }
                }
                Work::Finalize(mut fin, pctx) => {
                    match ctx::scope(&pctx, || fin.as_mut().poll(&mut cx)) {
                        Poll::Ready(()) => {
                            let parent = {
                                let mut st = core.st.lock();
                                st.result = st.pending.take();
                                st.phase = Phase::Done;
                                st.run = Run::Idle;
                                st.parent.take()
                            };
                            if !initial && parent.valid() {
                                parent.resume();
                            }
                            return true;
                        }
                        Poll::Pending => {
                            let mut st = core.st.lock();
                            st.finalize = Some(fin);
                            match st.run {
                                Run::Notified => {
                                    st.run = Run::Polling;
                                    continue;
                                }
                                Run::Polling => {
                                    st.run = Run::Idle;
                                    return false;
                                }
                                Run::Idle => unreachable!("task idle while polling"),
                            }
                        }
                    }
                }
            }
        }
    }
}
