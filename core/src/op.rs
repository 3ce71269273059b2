//! The contract every asynchronous operation satisfies, plus the await
//! adapter that lets a task suspend on any op.

use crate::continuation::Continuation;
use crate::ctx::{self, OpCtx};
use crate::err::{Error, OpResult};
use crate::stop::StopCallback;
use parking_lot::Mutex;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Outcome of [`AsyncOp::initiate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Initiated {
    /// The op completed synchronously: the continuation was dropped unused
    /// and `take_result` is valid immediately.
    Done,
    /// The op suspended: the continuation will be invoked exactly once, from
    /// any thread, after the result is stored.
    Pending,
}

/// A single-result asynchronous operation.
///
/// Contract:
/// - `initiate` is called at most once per op;
/// - when `is_immediate` returns true the result is available without
///   initiation and `take_result` may be called directly;
/// - ops honor the stop token in `ctx`: a pre-requested stop fails the op
///   synchronously with [`Error::Canceled`], a mid-flight request triggers a
///   best-effort cancel through a registered stop callback;
/// - `take_result` is callable exactly once after completion.
pub trait AsyncOp {
    type Output;

    fn is_immediate(&self) -> bool {
        false
    }

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated;

    fn is_failed(&self) -> bool;

    fn take_result(&mut self) -> OpResult<Self::Output>;
}

/// Shared completion rendezvous used by leaf operations.
///
/// The initiating side arms the continuation (and optionally a stop
/// callback); the completing side stores the result exactly once, drops the
/// stop callback, and resumes the armed continuation. Whichever of several
/// racing completers (event fired vs. cancel) gets there first wins.
pub struct OpSlot<T>(Arc<Mutex<SlotSt<T>>>);

struct SlotSt<T> {
    done: bool,
    taken: bool,
    result: Option<OpResult<T>>,
    cont: Continuation,
    stop_cb: Option<StopCallback>,
}

impl<T> Clone for OpSlot<T> {
    fn clone(&self) -> Self {
        OpSlot(self.0.clone())
    }
}

impl<T> Default for OpSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> OpSlot<T> {
    pub fn new() -> Self {
        OpSlot(Arc::new(Mutex::new(SlotSt {
            done: false,
            taken: false,
            result: None,
            cont: Continuation::Null,
            stop_cb: None,
        })))
    }

    /// Arms the continuation to resume on completion. Returns false (and
    /// drops the continuation) if the op already completed: the caller
    /// should then report a synchronous completion instead.
    pub fn arm(&self, cont: Continuation) -> bool {
        let mut st = self.0.lock();
        if st.done {
            return false;
        }
        debug_assert!(!st.cont.valid(), "op slot armed twice");
        st.cont = cont;
        true
    }

    /// Attaches the stop callback guarding the op's suspended window.
    /// Returns false (dropping the callback) if the op already completed.
    pub fn set_stop_cb(&self, cb: StopCallback) -> bool {
        let mut st = self.0.lock();
        if st.done {
            return false;
        }
        st.stop_cb = Some(cb);
        true
    }

    /// Stores the result; first completion wins. The stop callback is
    /// destroyed before the continuation runs.
    pub fn complete(&self, r: OpResult<T>) -> bool {
        let (cont, stop_cb) = {
            let mut st = self.0.lock();
            if st.done {
                return false;
            }
            st.done = true;
            st.result = Some(r);
            (st.cont.take(), st.stop_cb.take())
        };
        drop(stop_cb);
        if cont.valid() {
            cont.resume();
        }
        true
    }

    pub fn is_done(&self) -> bool {
        self.0.lock().done
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.0.lock().result, Some(Err(_)))
    }

    pub fn take(&self) -> OpResult<T> {
        let mut st = self.0.lock();
        assert!(st.done, "op result taken before completion");
        assert!(!st.taken, "op result taken twice");
        st.taken = true;
        st.result.take().unwrap()
    }
}

/// Awaits an async op from inside a task: initiates it with the ambient
/// context and suspends until completion unless it finishes synchronously.
///
/// Surface form of the usual early-return pattern:
/// `let v = wait(op).await?;`
pub fn wait<O: AsyncOp>(op: O) -> OpFuture<O> {
    OpFuture { op, state: WaitState::Unstarted }
}

enum WaitState {
    Unstarted,
    Waiting(Arc<AtomicBool>),
    Finished,
}

pub struct OpFuture<O: AsyncOp> {
    op: O,
    state: WaitState,
}

impl<O: AsyncOp + Unpin> Future for OpFuture<O> {
    type Output = OpResult<O::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &this.state {
            WaitState::Unstarted => {
                if this.op.is_immediate() {
                    this.state = WaitState::Finished;
                    return Poll::Ready(this.op.take_result());
                }
                let ctx = ctx::current();
                let flag = Arc::new(AtomicBool::new(false));
                let cont = {
                    let flag = flag.clone();
                    let waker = cx.waker().clone();
                    Continuation::from_fn(move || {
                        flag.store(true, Ordering::Release);
                        waker.wake();
                    })
                };
                match this.op.initiate(&ctx, cont) {
                    Initiated::Done => {
                        this.state = WaitState::Finished;
                        Poll::Ready(this.op.take_result())
                    }
                    Initiated::Pending => {
                        this.state = WaitState::Waiting(flag);
                        Poll::Pending
                    }
                }
            }
            WaitState::Waiting(flag) => {
                let done = flag.load(Ordering::Acquire);
                if !done {
                    return Poll::Pending;
                }
                this.state = WaitState::Finished;
                Poll::Ready(this.op.take_result())
            }
            WaitState::Finished => panic!("op future polled after completion"),
        }
    }
}

/// Object-safe face of `AsyncOp<Output = ()>`, used where heterogeneous ops
/// are stored (cleanup stacks, op groups).
pub(crate) trait ErasedOp: Send {
    fn is_immediate(&self) -> bool;
    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated;
    fn take_err(&mut self) -> Option<Error>;
}

impl<O> ErasedOp for O
where
    O: AsyncOp<Output = ()> + Send,
{
    fn is_immediate(&self) -> bool {
        AsyncOp::is_immediate(self)
    }

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        AsyncOp::initiate(self, ctx, cont)
    }

    fn take_err(&mut self) -> Option<Error> {
        AsyncOp::take_result(self).err()
    }
}

/// Awaits a boxed erased op, yielding its error if any.
pub(crate) fn wait_erased(op: Box<dyn ErasedOp>) -> ErasedOpFuture {
    ErasedOpFuture { op, state: WaitState::Unstarted }
}

pub(crate) struct ErasedOpFuture {
    op: Box<dyn ErasedOp>,
    state: WaitState,
}

impl Future for ErasedOpFuture {
    type Output = Option<Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &this.state {
            WaitState::Unstarted => {
                if this.op.is_immediate() {
                    this.state = WaitState::Finished;
                    return Poll::Ready(this.op.take_err());
                }
                let ctx = ctx::current();
                let flag = Arc::new(AtomicBool::new(false));
                let cont = {
                    let flag = flag.clone();
                    let waker = cx.waker().clone();
                    Continuation::from_fn(move || {
                        flag.store(true, Ordering::Release);
                        waker.wake();
                    })
                };
                match this.op.initiate(&ctx, cont) {
                    Initiated::Done => {
                        this.state = WaitState::Finished;
                        Poll::Ready(this.op.take_err())
                    }
                    Initiated::Pending => {
                        this.state = WaitState::Waiting(flag);
                        Poll::Pending
                    }
                }
            }
            WaitState::Waiting(flag) => {
                let done = flag.load(Ordering::Acquire);
                if !done {
                    return Poll::Pending;
                }
                this.state = WaitState::Finished;
                Poll::Ready(this.op.take_err())
            }
            WaitState::Finished => panic!("op future polled after completion"),
        }
    }
}
