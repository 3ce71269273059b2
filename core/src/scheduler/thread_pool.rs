//! A fixed-size worker pool over a `crossbeam-channel` injector queue.

use super::{with_scheduler_id, Resumer, Scheduler};
use crate::continuation::Continuation;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

const CREATED: u8 = 0;
const STARTED: u8 = 1;
const STOPPED: u8 = 2;
const JOINED: u8 = 3;

/// A scheduler owning `threads` worker threads.
///
/// Lifecycle: `created -> started -> stopped -> joined`. Posting outside the
/// started window is a programming error and panics. After `stop`, workers
/// drain the queue and exit; `join` waits for them.
pub struct ThreadPool {
    name: String,
    state: AtomicU8,
    tx: RwLock<Option<Sender<Continuation>>>,
    inner: Mutex<Inner>,
}

struct Inner {
    threads: usize,
    rx: Option<Receiver<Continuation>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(name: &str, threads: usize) -> Arc<Self> {
        assert!(threads > 0, "thread pool needs at least one thread");
        let (tx, rx) = crossbeam_channel::unbounded();
        Arc::new(ThreadPool {
            name: name.to_string(),
            state: AtomicU8::new(CREATED),
            tx: RwLock::new(Some(tx)),
            inner: Mutex::new(Inner { threads, rx: Some(rx), workers: Vec::new() }),
        })
    }

    pub fn start(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        assert_eq!(
            self.state.load(Ordering::Acquire),
            CREATED,
            "scheduler {} started twice",
            self.name
        );
        let rx = inner.rx.take().unwrap();
        let id = Arc::as_ptr(self) as usize;
        for i in 0..inner.threads {
            let rx = rx.clone();
            let handle = std::thread::Builder::new()
                .name(format!("{}-{}", self.name, i))
                .spawn(move || {
                    with_scheduler_id(id, || {
                        for cont in rx.iter() {
                            cont.resume();
                        }
                    })
                })
                .expect("failed to spawn scheduler worker");
            inner.workers.push(handle);
        }
        self.state.store(STARTED, Ordering::Release);
    }

    /// Stops accepting work. Queued continuations still drain before the
    /// workers exit.
    pub fn stop(&self) {
        let _inner = self.inner.lock();
        if self.state.load(Ordering::Acquire) != STARTED {
            return;
        }
        self.state.store(STOPPED, Ordering::Release);
        // Dropping the sender disconnects the channel once in-flight posts
        // finish, letting workers fall out of their recv loop.
        *self.tx.write() = None;
    }

    pub fn join(&self) {
        let workers = {
            let mut inner = self.inner.lock();
            std::mem::take(&mut inner.workers)
        };
        for w in workers {
            let _ = w.join();
        }
        self.state.store(JOINED, Ordering::Release);
    }

    pub fn resumer(self: &Arc<Self>) -> Resumer {
        super::get_resumer(self)
    }
}

impl Scheduler for ThreadPool {
    fn post(&self, cont: Continuation) {
        assert_eq!(
            self.state.load(Ordering::Acquire),
            STARTED,
            "post on scheduler {} outside its started window",
            self.name
        );
        let tx = self.tx.read();
        match tx.as_ref() {
            Some(tx) => {
                // Send only fails when all receivers are gone, which cannot
                // happen before stop() disconnects the channel.
                tx.send(cont).expect("scheduler queue disconnected");
            }
            None => panic!("post on scheduler {} after stop", self.name),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
        let workers = {
            let mut inner = self.inner.lock();
            std::mem::take(&mut inner.workers)
        };
        for w in workers {
            let _ = w.join();
        }
    }
}
