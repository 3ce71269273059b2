//! Racing combinators: start several ops, complete when the first does,
//! cancel and drain the rest.

use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::OpResult;
use crate::op::{AsyncOp, Initiated};
use crate::stop::{StopCallback, StopSource};
use parking_lot::Mutex;
use std::sync::Arc;

struct RaceShared {
    st: Mutex<RaceSt>,
    /// Stop source shared by all children; requested as soon as a winner is
    /// known, and forwarded-to from the parent's source.
    stop: StopSource,
}

struct RaceSt {
    winner: Option<usize>,
    remaining: usize,
    finished: bool,
    parent: Continuation,
}

fn child_done(shared: &Arc<RaceShared>, index: usize) {
    let (request, parent) = {
        let mut st = shared.st.lock();
        let request = if st.winner.is_none() {
            st.winner = Some(index);
            true
        } else {
            false
        };
        st.remaining -= 1;
        let parent = if st.remaining == 0 {
            st.finished = true;
            st.parent.take()
        } else {
            Continuation::Null
        };
        (request, parent)
    };
    if request {
        shared.stop.request_stop();
    }
    if parent.valid() {
        parent.resume();
    }
}

fn new_shared(n: usize) -> Arc<RaceShared> {
    Arc::new(RaceShared {
        st: Mutex::new(RaceSt {
            winner: None,
            remaining: n,
            finished: false,
            parent: Continuation::Null,
        }),
        stop: StopSource::new(),
    })
}

/// Races two heterogeneous ops. Completes once both children terminated; the
/// losing child sees a stop request the moment the winner finishes, so its
/// result is typically `Canceled`.
///
/// Output: `(winner_index, result_of_first, result_of_second)` — every
/// child's final result is observable.
pub fn until_first_done<A: AsyncOp, B: AsyncOp>(a: A, b: B) -> UntilFirstDone2<A, B> {
    UntilFirstDone2 { a, b, shared: None, _forward: None }
}

pub struct UntilFirstDone2<A: AsyncOp, B: AsyncOp> {
    a: A,
    b: B,
    shared: Option<Arc<RaceShared>>,
    _forward: Option<StopCallback>,
}

impl<A: AsyncOp, B: AsyncOp> AsyncOp for UntilFirstDone2<A, B> {
    type Output = (usize, OpResult<A::Output>, OpResult<B::Output>);

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let shared = new_shared(2);
        self.shared = Some(shared.clone());
        let fwd = shared.stop.clone();
        self._forward = Some(ctx.stop_token().register(move || {
            fwd.request_stop();
        }));
        let child_ctx = ctx.with_stop(shared.stop.clone());

        {
            let s = shared.clone();
            if self.a.initiate(&child_ctx, Continuation::from_fn(move || child_done(&s, 0)))
                == Initiated::Done
            {
                child_done(&shared, 0);
            }
        }
        {
            let s = shared.clone();
            if self.b.initiate(&child_ctx, Continuation::from_fn(move || child_done(&s, 1)))
                == Initiated::Done
            {
                child_done(&shared, 1);
            }
        }

        let mut st = shared.st.lock();
        if st.finished {
            Initiated::Done
        } else {
            st.parent = cont;
            Initiated::Pending
        }
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn take_result(&mut self) -> OpResult<Self::Output> {
        let shared = self.shared.as_ref().expect("race not initiated");
        let winner = {
            let st = shared.st.lock();
            assert!(st.finished, "race result taken before completion");
            st.winner.unwrap()
        };
        Ok((winner, self.a.take_result(), self.b.take_result()))
    }
}

/// Homogeneous N-way race.
///
/// Output: `(winner_index, all_results)`.
pub fn until_first_done_all<O: AsyncOp>(ops: Vec<O>) -> UntilFirstDoneAll<O> {
    assert!(!ops.is_empty(), "racing an empty set of ops");
    UntilFirstDoneAll { ops, shared: None, _forward: None }
}

pub struct UntilFirstDoneAll<O: AsyncOp> {
    ops: Vec<O>,
    shared: Option<Arc<RaceShared>>,
    _forward: Option<StopCallback>,
}

impl<O: AsyncOp> AsyncOp for UntilFirstDoneAll<O> {
    type Output = (usize, Vec<OpResult<O::Output>>);

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let shared = new_shared(self.ops.len());
        self.shared = Some(shared.clone());
        let fwd = shared.stop.clone();
        self._forward = Some(ctx.stop_token().register(move || {
            fwd.request_stop();
        }));
        let child_ctx = ctx.with_stop(shared.stop.clone());

        for (i, op) in self.ops.iter_mut().enumerate() {
            let s = shared.clone();
            if op.initiate(&child_ctx, Continuation::from_fn(move || child_done(&s, i)))
                == Initiated::Done
            {
                child_done(&shared, i);
            }
        }

        let mut st = shared.st.lock();
        if st.finished {
            Initiated::Done
        } else {
            st.parent = cont;
            Initiated::Pending
        }
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn take_result(&mut self) -> OpResult<Self::Output> {
        let shared = self.shared.as_ref().expect("race not initiated");
        let winner = {
            let st = shared.st.lock();
            assert!(st.finished, "race result taken before completion");
            st.winner.unwrap()
        };
        let results = self.ops.iter_mut().map(|op| op.take_result()).collect();
        Ok((winner, results))
    }
}
