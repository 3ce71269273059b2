//! Hand-off decorators: initiate an op from a trampoline posted onto another
//! resumer.

use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::OpResult;
use crate::op::{AsyncOp, Initiated, OpSlot};
use crate::scheduler::Resumer;
use parking_lot::Mutex;
use std::sync::Arc;

/// Returns an op that initiates `op` from `sr`. The surrounding context is
/// passed through unchanged, so the op's own children keep the caller's
/// resumer.
pub fn start_on<O: AsyncOp>(sr: impl Into<Resumer>, op: O) -> StartOn<O> {
    StartOn { op: Some(op), resumer: sr.into(), override_ctx: false, solely: false, slot: OpSlot::new() }
}

/// `start_on` with the context's resumer rebound to `sr`: the op and its
/// children all run on `sr`.
pub fn run_on<O: AsyncOp>(sr: impl Into<Resumer>, op: O) -> StartOn<O> {
    StartOn { op: Some(op), resumer: sr.into(), override_ctx: true, solely: false, slot: OpSlot::new() }
}

/// `run_on` that additionally binds the completion back to the caller's
/// resumer, so the awaiting side resumes where it started.
pub fn solely_run_on<O: AsyncOp>(sr: impl Into<Resumer>, op: O) -> StartOn<O> {
    StartOn { op: Some(op), resumer: sr.into(), override_ctx: true, solely: true, slot: OpSlot::new() }
}

pub struct StartOn<O: AsyncOp> {
    op: Option<O>,
    resumer: Resumer,
    override_ctx: bool,
    solely: bool,
    slot: OpSlot<O::Output>,
}

impl<O> AsyncOp for StartOn<O>
where
    O: AsyncOp + Send + 'static,
    O::Output: Send + 'static,
{
    type Output = O::Output;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        let cont = if self.solely { cont.bind(ctx.resumer()) } else { cont };
        let armed = self.slot.arm(cont);
        assert!(armed, "start_on initiated twice");
        let op = Arc::new(Mutex::new(self.op.take().expect("op initiated twice")));
        let ctx2 = ctx.with_resumer_if(self.override_ctx, self.resumer.clone());
        let slot = self.slot.clone();
        self.resumer.post(Continuation::from_fn(move || {
            let finish = {
                let op = op.clone();
                let slot = slot.clone();
                Continuation::from_fn(move || {
                    let r = op.lock().take_result();
                    slot.complete(r);
                })
            };
            let initiated = op.lock().initiate(&ctx2, finish);
            if initiated == Initiated::Done {
                let r = op.lock().take_result();
                slot.complete(r);
            }
        }));
        Initiated::Pending
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<O::Output> {
        self.slot.take()
    }
}
