//! Cooperative cancellation: stop source, token and fire-once callbacks.
//!
//! A source reaches its terminal requested state exactly once. Callbacks
//! registered before the transition fire exactly once when it happens;
//! registering on an already-requested source runs the callback
//! synchronously. Dropping a [`StopCallback`] deregisters it and waits for a
//! concurrently firing invocation to finish, unless the drop happens from
//! within that invocation itself.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(test)]
mod tests;

struct CbEntry {
    cb: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    /// Thread key of the thread currently running this callback, 0 otherwise.
    running_on: AtomicUsize,
}

struct Registry {
    next_id: u64,
    entries: Vec<(u64, Arc<CbEntry>)>,
}

struct Shared {
    requested: AtomicBool,
    reg: Mutex<Registry>,
}

/// Requests and observes the terminal stop state. Clones share the state.
#[derive(Clone)]
pub struct StopSource(Arc<Shared>);

/// Read-only view of a stop source.
#[derive(Clone)]
pub struct StopToken(Arc<Shared>);

/// Registration handle; dropping deregisters the callback.
pub struct StopCallback {
    shared: Arc<Shared>,
    id: u64,
    entry: Arc<CbEntry>,
}

impl Default for StopSource {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSource {
    pub fn new() -> Self {
        StopSource(Arc::new(Shared {
            requested: AtomicBool::new(false),
            reg: Mutex::new(Registry { next_id: 1, entries: Vec::new() }),
        }))
    }

    /// Transitions to the requested state and fires registered callbacks.
    /// Idempotent: returns true only for the call that made the transition.
    pub fn request_stop(&self) -> bool {
        let fired = {
            let mut reg = self.0.reg.lock();
            if self.0.requested.swap(true, Ordering::SeqCst) {
                return false;
            }
            std::mem::take(&mut reg.entries)
        };
        for (_, entry) in fired {
            fire(&entry);
        }
        true
    }

    pub fn stop_requested(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    pub fn token(&self) -> StopToken {
        StopToken(self.0.clone())
    }
}

impl StopToken {
    pub fn stop_requested(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    /// Registers `f` to run once when stop is requested. If stop was already
    /// requested, runs `f` synchronously and returns a spent handle.
    pub fn register(&self, f: impl FnOnce() + Send + 'static) -> StopCallback {
        let entry = Arc::new(CbEntry {
            cb: Mutex::new(Some(Box::new(f))),
            running_on: AtomicUsize::new(0),
        });
        {
            let mut reg = self.0.reg.lock();
            if !self.0.requested.load(Ordering::SeqCst) {
                let id = reg.next_id;
                reg.next_id += 1;
                reg.entries.push((id, entry.clone()));
                return StopCallback { shared: self.0.clone(), id, entry };
            }
        }
        // Already requested: fire on the registering thread, exactly once.
        fire(&entry);
        StopCallback { shared: self.0.clone(), id: 0, entry }
    }
}

fn fire(entry: &CbEntry) {
    entry.running_on.store(thread_key(), Ordering::SeqCst);
    {
        // The lock is held across the invocation so that a concurrent
        // deregistration blocks until the callback returns.
        let mut cb = entry.cb.lock();
        if let Some(f) = cb.take() {
            f();
        }
    }
    entry.running_on.store(0, Ordering::SeqCst);
}

impl Drop for StopCallback {
    fn drop(&mut self) {
        if self.id != 0 {
            let mut reg = self.shared.reg.lock();
            reg.entries.retain(|(id, _)| *id != self.id);
        }
        if self.entry.running_on.load(Ordering::SeqCst) == thread_key() {
            // Dropped from within its own invocation.
            return;
        }
        // Take the callback if it has not fired; if it is firing on another
        // thread right now, this blocks until the invocation returns.
        self.entry.cb.lock().take();
    }
}

thread_local! {
    static THREAD_KEY: u8 = 0;
}

fn thread_key() -> usize {
    THREAD_KEY.with(|k| k as *const u8 as usize)
}
