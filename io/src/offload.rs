//! Runs a blocking closure on an I/O pool as an async op.

use crate::pool::io_resumer;
use asynckit_core::op::{AsyncOp, Initiated, OpSlot};
use asynckit_core::stop::StopToken;
use asynckit_core::{Continuation, Error, OpCtx, OpResult, Resumer};

/// Offloads `f` to the default I/O pool. The closure receives the op's stop
/// token so long-running work can poll cancellation cooperatively; work that
/// is already queued cannot be un-posted.
pub fn offload<T, F>(f: F) -> Offload<T>
where
    T: Send + 'static,
    F: FnOnce(StopToken) -> OpResult<T> + Send + 'static,
{
    offload_on(io_resumer(), f)
}

pub fn offload_on<T, F>(resumer: Resumer, f: F) -> Offload<T>
where
    T: Send + 'static,
    F: FnOnce(StopToken) -> OpResult<T> + Send + 'static,
{
    Offload { f: Some(Box::new(f)), resumer, slot: OpSlot::new() }
}

pub struct Offload<T: Send + 'static> {
    f: Option<Box<dyn FnOnce(StopToken) -> OpResult<T> + Send>>,
    resumer: Resumer,
    slot: OpSlot<T>,
}

impl<T: Send + 'static> AsyncOp for Offload<T> {
    type Output = T;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        if ctx.stop_requested() {
            self.slot.complete(Err(Error::Canceled));
            return Initiated::Done;
        }
        let armed = self.slot.arm(cont);
        assert!(armed, "offload initiated twice");
        let f = self.f.take().expect("offload initiated twice");
        let token = ctx.stop_token();
        let slot = self.slot.clone();
        self.resumer.post(Continuation::from_fn(move || {
            let r = f(token);
            slot.complete(r);
        }));
        Initiated::Pending
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<T> {
        self.slot.take()
    }
}
