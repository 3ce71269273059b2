//! Completion-side hand-off: decide where the awaiting side resumes.

use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::{Error, OpResult};
use crate::op::{AsyncOp, Initiated};
use crate::scheduler::Resumer;

/// Decorates `op` so its continuation is posted through `sr` on completion.
pub fn resume_on<O: AsyncOp>(sr: impl Into<Resumer>, op: O) -> ResumeOn<O> {
    ResumeOn { inner: op, resumer: sr.into() }
}

pub struct ResumeOn<O: AsyncOp> {
    inner: O,
    resumer: Resumer,
}

impl<O: AsyncOp> AsyncOp for ResumeOn<O> {
    type Output = O::Output;

    fn is_immediate(&self) -> bool {
        self.inner.is_immediate()
    }

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        self.inner.initiate(ctx, cont.bind(&self.resumer))
    }

    fn is_failed(&self) -> bool {
        self.inner.is_failed()
    }

    fn take_result(&mut self) -> OpResult<O::Output> {
        self.inner.take_result()
    }
}

/// A bare op that merely reschedules the awaiting task onto `sr`.
/// Fails fast with `Canceled` under a requested stop.
pub fn reschedule_on(sr: impl Into<Resumer>) -> Reschedule {
    Reschedule { resumer: sr.into(), canceled: false }
}

pub struct Reschedule {
    resumer: Resumer,
    canceled: bool,
}

impl AsyncOp for Reschedule {
    type Output = ();

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        if ctx.stop_requested() {
            self.canceled = true;
            return Initiated::Done;
        }
        self.resumer.post(cont);
        Initiated::Pending
    }

    fn is_failed(&self) -> bool {
        self.canceled
    }

    fn take_result(&mut self) -> OpResult<()> {
        if self.canceled {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}
