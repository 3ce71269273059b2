//! Helpers for tests, both this workspace's and downstream crates'.

use crate::continuation::Continuation;
use crate::ctx::OpCtx;
use crate::err::{Error, OpResult};
use crate::op::{AsyncOp, Initiated, OpSlot};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Installs a fmt subscriber writing to the test writer; safe to call from
/// every test.
pub fn init_test_logger() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::builder().from_env_lossy())
        .with_test_writer()
        .try_init();
}

/// An op completed externally through its [`ManualTrigger`]. Honors the stop
/// token: a pre-requested stop fails initiation synchronously, a mid-flight
/// request completes the op with `Canceled` unless the trigger won the race.
pub struct ManualOp<T: Send + 'static> {
    slot: OpSlot<T>,
}

pub struct ManualTrigger<T: Send + 'static> {
    slot: OpSlot<T>,
}

pub fn manual_op<T: Send + 'static>() -> (ManualOp<T>, ManualTrigger<T>) {
    let slot = OpSlot::new();
    (ManualOp { slot: slot.clone() }, ManualTrigger { slot })
}

impl<T: Send + 'static> ManualTrigger<T> {
    /// Completes the op; returns false if it already completed (e.g. was
    /// canceled first).
    pub fn complete(&self, r: OpResult<T>) -> bool {
        self.slot.complete(r)
    }

    pub fn succeed(&self, v: T) -> bool {
        self.complete(Ok(v))
    }
}

impl<T: Send + 'static> AsyncOp for ManualOp<T> {
    type Output = T;

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        if ctx.stop_requested() {
            self.slot.complete(Err(Error::Canceled));
            return Initiated::Done;
        }
        if !self.slot.arm(cont) {
            return Initiated::Done;
        }
        let slot = self.slot.clone();
        let cb = ctx.stop_token().register(move || {
            slot.complete(Err(Error::Canceled));
        });
        self.slot.set_stop_cb(cb);
        Initiated::Pending
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<T> {
        self.slot.take()
    }
}

/// A `ManualOp` triggered with `Ok(v)` from a helper thread after `delay`.
pub fn delayed_op<T: Send + 'static>(delay: Duration, v: T) -> ManualOp<T> {
    let (op, trigger) = manual_op();
    std::thread::spawn(move || {
        std::thread::sleep(delay);
        trigger.succeed(v);
    });
    op
}

/// An op whose result is available without initiation; initiating it is a
/// test failure.
pub struct ImmediateOp<T: Send + 'static> {
    value: Option<OpResult<T>>,
}

pub fn immediate_op<T: Send + 'static>(r: OpResult<T>) -> ImmediateOp<T> {
    ImmediateOp { value: Some(r) }
}

impl<T: Send + 'static> AsyncOp for ImmediateOp<T> {
    type Output = T;

    fn is_immediate(&self) -> bool {
        true
    }

    fn initiate(&mut self, _ctx: &OpCtx, _cont: Continuation) -> Initiated {
        panic!("immediate op initiated");
    }

    fn is_failed(&self) -> bool {
        matches!(self.value, Some(Err(_)))
    }

    fn take_result(&mut self) -> OpResult<T> {
        self.value.take().expect("immediate op result taken twice")
    }
}
