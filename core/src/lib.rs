//! Async operations, tasks, schedulers, cancellation and scoped async
//! cleanup.
//!
//! The crate is organized around a single contract: an async op is a value
//! that can be initiated once with a context and a continuation, and whose
//! result is taken exactly once after completion (see [`op::AsyncOp`]).
//! Tasks host ordinary futures as ops; combinators compose ops; schedulers
//! and resumers decide where continuations run; stop sources propagate
//! cooperative cancellation; cleanup stacks guarantee resource release on
//! every exit path.

pub mod cleanup;
pub mod combinators;
pub mod continuation;
pub mod ctx;
pub mod err;
pub mod generator;
pub mod op;
pub mod scheduler;
pub mod stop;
pub mod task;
pub mod testonly;
pub mod util;

pub use cleanup::CleanupStack;
pub use combinators::{
    make_hosted_async_op, reschedule_on, resume_on, run_on, solely_run_on, start_on, sync_wait,
    sync_wait_in, until_first_done, until_first_done_all, AsyncOpGroup, HostedOp,
};
pub use continuation::Continuation;
pub use ctx::OpCtx;
pub use err::{Error, ErrorKind, OpResult};
pub use generator::{Generator, Yield};
pub use op::{wait, AsyncOp, Initiated, OpSlot};
pub use scheduler::{get_resumer, Resumer, Scheduler, Strand, ThreadPool};
pub use stop::{StopCallback, StopSource, StopToken};
pub use task::Task;
pub use util::Latch;
