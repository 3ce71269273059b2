use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::OpResult;
use crate::op::{AsyncOp, Initiated};
use crate::util::Latch;
use std::sync::Arc;

/// Blocks the calling OS thread until `op` completes, then extracts its
/// result. An immediate op short-circuits: no latch is built and nothing is
/// posted anywhere.
pub fn sync_wait<O: AsyncOp>(op: O) -> OpResult<O::Output> {
    sync_wait_in(&OpCtx::detached(), op)
}

/// `sync_wait` under a caller-supplied context (resumer, stop source,
/// cleanup stack).
pub fn sync_wait_in<O: AsyncOp>(ctx: &OpCtx, mut op: O) -> OpResult<O::Output> {
    if op.is_immediate() {
        return op.take_result();
    }
    let latch = Arc::new(Latch::new(1));
    let initiated = {
        let latch = latch.clone();
        op.initiate(ctx, Continuation::from_fn(move || latch.count_down()))
    };
    if let Initiated::Pending = initiated {
        latch.wait();
    }
    op.take_result()
}
