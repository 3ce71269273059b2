//! One-shot continuations: the "thing to run next" handed to an async op at
//! initiation and invoked exactly once when the op completes.

use crate::scheduler::Resumer;
use std::task::Waker;

/// What to run when an async operation completes.
///
/// Movable-only and one-shot: `resume` consumes the value, so double-resume
/// is impossible by construction; resuming `Null` is a programming error and
/// aborts via panic.
pub enum Continuation {
    Null,
    /// Wakes a suspended task. This is the coroutine-handle case of the
    /// design: identity against a live waker is answered by [`Continuation::will_wake`].
    Waker(Waker),
    /// An owned zero-argument callable.
    Fn(Box<dyn FnOnce() + Send + 'static>),
    /// A (resumer, continuation) pair: resuming posts the inner continuation
    /// through the resumer, wherever the resume call happens. Built with
    /// [`Continuation::bind`].
    Bound(Resumer, Box<Continuation>),
}

impl Default for Continuation {
    fn default() -> Self {
        Continuation::Null
    }
}

impl Continuation {
    pub fn null() -> Self {
        Continuation::Null
    }

    pub fn from_fn(f: impl FnOnce() + Send + 'static) -> Self {
        Continuation::Fn(Box::new(f))
    }

    pub fn from_waker(w: Waker) -> Self {
        Continuation::Waker(w)
    }

    pub fn valid(&self) -> bool {
        !matches!(self, Continuation::Null)
    }

    /// Moves the continuation out, leaving `Null` behind.
    pub fn take(&mut self) -> Continuation {
        std::mem::take(self)
    }

    /// Identity test against a task waker.
    pub fn will_wake(&self, w: &Waker) -> bool {
        match self {
            Continuation::Waker(own) => own.will_wake(w),
            Continuation::Bound(_, inner) => inner.will_wake(w),
            _ => false,
        }
    }

    /// Invokes the continuation, consuming it.
    pub fn resume(self) {
        match self {
            Continuation::Null => panic!("resumed a null continuation"),
            Continuation::Waker(w) => w.wake(),
            Continuation::Fn(f) => f(),
            Continuation::Bound(resumer, inner) => resumer.post(*inner),
        }
    }

    /// Strips any resumer binding, yielding the bare continuation.
    pub fn unbound(self) -> Continuation {
        match self {
            Continuation::Bound(_, inner) => inner.unbound(),
            other => other,
        }
    }

    /// Binds the continuation to `resumer`: resuming the result posts the
    /// bare continuation through `resumer`. Rebinding replaces any previous
    /// binding rather than stacking.
    pub fn bind(self, resumer: &Resumer) -> Continuation {
        Continuation::Bound(resumer.clone(), Box::new(self.unbound()))
    }

    /// Delivers the continuation to `dest`, invoking it inline when the
    /// caller is already on that execution context. A bound continuation
    /// always routes through its own resumer.
    pub fn resume_via(self, dest: &Resumer, current: &Resumer) {
        match self {
            bound @ Continuation::Bound(..) => bound.resume(),
            cont => {
                if dest == current {
                    cont.resume();
                } else {
                    dest.post(cont);
                }
            }
        }
    }
}

impl std::fmt::Debug for Continuation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Continuation::Null => f.write_str("Continuation::Null"),
            Continuation::Waker(_) => f.write_str("Continuation::Waker"),
            Continuation::Fn(_) => f.write_str("Continuation::Fn"),
            Continuation::Bound(r, inner) => write!(f, "Continuation::Bound({r:?}, {inner:?})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn resume_consumes() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let cont = Continuation::from_fn(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        assert!(cont.valid());
        cont.resume();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    #[should_panic(expected = "null continuation")]
    fn resume_null_panics() {
        Continuation::null().resume();
    }

    #[test]
    fn take_leaves_null() {
        let mut cont = Continuation::from_fn(|| {});
        let taken = cont.take();
        assert!(taken.valid());
        assert!(!cont.valid());
        taken.resume();
    }

    #[test]
    fn bind_replaces_previous_binding() {
        // Binding twice must not stack posts: the inner continuation is
        // rebound, so a single resume runs it exactly once.
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let cont = Continuation::from_fn(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let bound = cont.bind(&Resumer::inline()).bind(&Resumer::inline());
        bound.resume();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn resume_via_same_context_runs_inline() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let cont = Continuation::from_fn(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });
        cont.resume_via(&Resumer::inline(), &Resumer::inline());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
