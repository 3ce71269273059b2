//! Timer ops backed by one timer thread owning a deadline heap.
//!
//! A sleep's stop callback removes its heap entry and completes it with
//! `Canceled`; the fire/cancel race is settled by whichever side takes the
//! entry out of the live table first.

use asynckit_core::op::{AsyncOp, Initiated, OpSlot};
use asynckit_core::{Continuation, Error, OpCtx, OpResult};
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct TimerQueue {
    st: Mutex<TimerSt>,
    cv: Condvar,
}

struct TimerSt {
    next_id: u64,
    heap: BinaryHeap<Reverse<(Instant, u64)>>,
    live: HashMap<u64, OpSlot<()>>,
}

static TIMER: Lazy<Arc<TimerQueue>> = Lazy::new(|| {
    let q = Arc::new(TimerQueue {
        st: Mutex::new(TimerSt { next_id: 1, heap: BinaryHeap::new(), live: HashMap::new() }),
        cv: Condvar::new(),
    });
    let worker = q.clone();
    std::thread::Builder::new()
        .name("asynckit-timer".to_string())
        .spawn(move || worker.run())
        .expect("failed to spawn timer thread");
    q
});

impl TimerQueue {
    fn insert(&self, at: Instant, slot: OpSlot<()>) -> u64 {
        let mut st = self.st.lock();
        let id = st.next_id;
        st.next_id += 1;
        st.heap.push(Reverse((at, id)));
        st.live.insert(id, slot);
        self.cv.notify_one();
        id
    }

    /// Cancels a pending entry; a no-op if it already fired.
    fn cancel(&self, id: u64) {
        let slot = self.st.lock().live.remove(&id);
        if let Some(slot) = slot {
            slot.complete(Err(Error::Canceled));
        }
    }

    fn run(&self) {
        let mut st = self.st.lock();
        loop {
            match st.heap.peek().copied() {
                None => self.cv.wait(&mut st),
                Some(Reverse((at, id))) => {
                    let now = Instant::now();
                    if at <= now {
                        st.heap.pop();
                        // Stale ids (canceled entries) are skipped here.
                        if let Some(slot) = st.live.remove(&id) {
                            drop(st);
                            slot.complete(Ok(()));
                            st = self.st.lock();
                        }
                    } else {
                        self.cv.wait_for(&mut st, at - now);
                    }
                }
            }
        }
    }
}

/// Completes `Ok(())` after `dur`, or `Canceled` if stop is requested first.
pub fn sleep(dur: Duration) -> Sleep {
    Sleep { at: None, dur: Some(dur), slot: OpSlot::new(), id: None }
}

pub fn sleep_until(at: Instant) -> Sleep {
    Sleep { at: Some(at), dur: None, slot: OpSlot::new(), id: None }
}

pub struct Sleep {
    at: Option<Instant>,
    dur: Option<Duration>,
    slot: OpSlot<()>,
    id: Option<u64>,
}

impl AsyncOp for Sleep {
    type Output = ();

    fn initiate(&mut self, ctx: &OpCtx, cont: Continuation) -> Initiated {
        if ctx.stop_requested() {
            self.slot.complete(Err(Error::Canceled));
            return Initiated::Done;
        }
        let armed = self.slot.arm(cont);
        assert!(armed, "sleep initiated twice");
        let at = self.at.unwrap_or_else(|| Instant::now() + self.dur.unwrap());
        let id = TIMER.insert(at, self.slot.clone());
        self.id = Some(id);
        let cb = ctx.stop_token().register(move || TIMER.cancel(id));
        self.slot.set_stop_cb(cb);
        Initiated::Pending
    }

    fn is_failed(&self) -> bool {
        self.slot.is_failed()
    }

    fn take_result(&mut self) -> OpResult<()> {
        self.slot.take()
    }
}

impl Drop for Sleep {
    fn drop(&mut self) {
        // An initiated-but-abandoned sleep must not linger in the heap.
        if let Some(id) = self.id.take() {
            TIMER.cancel(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use asynckit_core::testonly::init_test_logger;
    use asynckit_core::{ctx, sync_wait, sync_wait_in, wait, Task};

    #[test]
    fn sleep_elapses() {
        init_test_logger();
        let started = Instant::now();
        sync_wait(sleep(Duration::from_millis(20))).unwrap();
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn sleeps_fire_in_deadline_order() {
        let task = Task::new(async {
            let long = Instant::now() + Duration::from_millis(40);
            wait(sleep(Duration::from_millis(5))).await?;
            wait(sleep_until(long)).await?;
            Ok(Instant::now())
        });
        let start = Instant::now();
        let end = sync_wait(task).unwrap();
        assert!(end - start >= Duration::from_millis(40));
    }

    #[test]
    fn stop_cancels_a_pending_sleep() {
        let ctx = ctx::OpCtx::detached();
        let src = ctx.stop_source().clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            src.request_stop();
        });
        let started = Instant::now();
        assert_matches!(
            sync_wait_in(&ctx, sleep(Duration::from_secs(60))),
            Err(Error::Canceled)
        );
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn pre_requested_stop_fails_synchronously() {
        let ctx = ctx::OpCtx::detached();
        ctx.stop_source().request_stop();
        assert_matches!(
            sync_wait_in(&ctx, sleep(Duration::from_secs(60))),
            Err(Error::Canceled)
        );
    }
}
