//! A dynamic bag of child ops tied to one context.
//!
//! Children are erased, initiated on attach, and kept alive until each
//! completes. A stop request on the group's context reaches every live child
//! through the shared stop source. `until_all_done` awaits the bag draining;
//! children attached while someone is waiting extend the wait.

use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::OpResult;
use crate::op::{AsyncOp, ErasedOp, Initiated};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

pub struct AsyncOpGroup {
    shared: Arc<GroupShared>,
    ctx: OpCtx,
}

struct GroupShared {
    st: Mutex<GroupSt>,
}

struct GroupSt {
    next_id: u64,
    live: HashMap<u64, Box<dyn ErasedOp>>,
    /// Children whose completion raced ahead of their insertion.
    early: HashSet<u64>,
    pending: usize,
    waiter: Continuation,
}

impl AsyncOpGroup {
    /// Children run under (a clone of) `ctx`: same resumer, same stop
    /// source, same cleanup stack.
    pub fn new(ctx: &OpCtx) -> Self {
        AsyncOpGroup {
            shared: Arc::new(GroupShared {
                st: Mutex::new(GroupSt {
                    next_id: 1,
                    live: HashMap::new(),
                    early: HashSet::new(),
                    pending: 0,
                    waiter: Continuation::Null,
                }),
            }),
            ctx: ctx.clone(),
        }
    }

    /// Attaches a child op and initiates it. The child's result is consumed
    /// by the group; a failure is logged and otherwise discarded.
    pub fn add_and_initiate(&self, op: impl AsyncOp<Output = ()> + Send + 'static) {
        let mut boxed: Box<dyn ErasedOp> = Box::new(op);
        let id = {
            let mut st = self.shared.st.lock();
            st.pending += 1;
            let id = st.next_id;
            st.next_id += 1;
            id
        };
        let shared = self.shared.clone();
        let initiated = boxed.initiate(
            &self.ctx,
            Continuation::from_fn(move || GroupShared::child_done(&shared, id)),
        );
        match initiated {
            Initiated::Done => {
                GroupShared::consume(&self.shared, boxed);
            }
            Initiated::Pending => {
                let mut st = self.shared.st.lock();
                if st.early.remove(&id) {
                    // Completed before we could park it in the bag.
                    drop(st);
                    GroupShared::consume(&self.shared, boxed);
                } else {
                    st.live.insert(id, boxed);
                }
            }
        }
    }

    /// An op that completes once every attached child has terminated.
    pub fn until_all_done(&self) -> UntilAllDone {
        UntilAllDone { shared: self.shared.clone(), done: false }
    }
}

impl GroupShared {
    fn child_done(shared: &Arc<GroupShared>, id: u64) {
        let boxed = {
            let mut st = shared.st.lock();
            match st.live.remove(&id) {
                Some(b) => b,
                None => {
                    // add_and_initiate has not inserted it yet; let it finish
                    // the bookkeeping.
                    st.early.insert(id);
                    return;
                }
            }
        };
        Self::consume(shared, boxed);
    }

    /// Takes a finished child's result and settles the drain accounting.
    fn consume(shared: &Arc<GroupShared>, mut boxed: Box<dyn ErasedOp>) {
        if let Some(err) = boxed.take_err() {
            if !err.is_canceled() {
                tracing::warn!(target: "asynckit", "op group child failed: {err}");
            }
        }
        drop(boxed);
        let waiter = {
            let mut st = shared.st.lock();
            st.pending -= 1;
            if st.pending == 0 {
                st.waiter.take()
            } else {
                Continuation::Null
            }
        };
        if waiter.valid() {
            waiter.resume();
        }
    }
}

pub struct UntilAllDone {
    shared: Arc<GroupShared>,
    done: bool,
}

impl AsyncOp for UntilAllDone {
    type Output = ();

    fn initiate(&mut self, _ctx: &OpCtx, cont: Continuation) -> Initiated {
        let mut st = self.shared.st.lock();
        assert!(!st.waiter.valid(), "op group awaited twice concurrently");
        if st.pending == 0 {
            self.done = true;
            Initiated::Done
        } else {
            st.waiter = cont;
            Initiated::Pending
        }
    }

    fn is_failed(&self) -> bool {
        false
    }

    fn take_result(&mut self) -> OpResult<()> {
        Ok(())
    }
}
