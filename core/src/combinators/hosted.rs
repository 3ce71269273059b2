//! Ops that carry a host value whose lifetime must span the whole operation,
//! e.g. a parser or serializer borrowed by a third-party call.

use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::OpResult;
use crate::op::{AsyncOp, Initiated};
use std::sync::Arc;

/// Allocates `host`, hands the generated op a shared handle to it, and
/// returns an op owning both, so the host outlives every stage of the call.
pub fn make_hosted_async_op<H, O: AsyncOp>(
    host: H,
    gen: impl FnOnce(Arc<H>) -> O,
) -> HostedOp<H, O> {
    let host = Arc::new(host);
    let op = gen(host.clone());
    HostedOp { host, op }
}

pub struct HostedOp<H, O: AsyncOp> {
    host: Arc<H>,
    op: O,
}

impl<H, O: AsyncOp> HostedOp<H, O> {
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }
}

impl<H, O: AsyncOp> AsyncOp for HostedOp<H, O> {
    type Output = O::Output;

    fn is_immediate(&self) -> bool {
        self.op.is_immediate()
    }

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        self.op.initiate(ctx, cont)
    }

    fn is_failed(&self) -> bool {
        self.op.is_failed()
    }

    fn take_result(&mut self) -> OpResult<O::Output> {
        self.op.take_result()
    }
}
