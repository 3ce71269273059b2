use super::*;
use crate::continuation::Continuation;
use crate::testonly::init_test_logger;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn pool_runs_posted_continuations() {
    init_test_logger();
    let pool = ThreadPool::new("test", 4);
    pool.start();
    let hits = Arc::new(AtomicUsize::new(0));
    let latch = Arc::new(crate::util::Latch::new(100));
    for _ in 0..100 {
        let hits = hits.clone();
        let latch = latch.clone();
        pool.post(Continuation::from_fn(move || {
            hits.fetch_add(1, Ordering::SeqCst);
            latch.count_down();
        }));
    }
    latch.wait();
    assert_eq!(hits.load(Ordering::SeqCst), 100);
    pool.stop();
    pool.join();
}

#[test]
fn workers_advertise_scheduler_identity() {
    let pool = ThreadPool::new("test", 2);
    pool.start();
    let resumer = pool.resumer();
    let id = resumer.id();
    let latch = Arc::new(crate::util::Latch::new(1));
    let seen = Arc::new(AtomicUsize::new(0));
    {
        let latch = latch.clone();
        let seen = seen.clone();
        resumer.post(Continuation::from_fn(move || {
            seen.store(current_scheduler_id(), Ordering::SeqCst);
            latch.count_down();
        }));
    }
    latch.wait();
    assert_eq!(seen.load(Ordering::SeqCst), id);
    assert_ne!(id, 0);
    pool.stop();
    pool.join();
}

#[test]
fn stop_drains_queued_work() {
    let pool = ThreadPool::new("test", 1);
    pool.start();
    let hits = Arc::new(AtomicUsize::new(0));
    for _ in 0..10 {
        let hits = hits.clone();
        pool.post(Continuation::from_fn(move || {
            std::thread::sleep(Duration::from_millis(1));
            hits.fetch_add(1, Ordering::SeqCst);
        }));
    }
    pool.stop();
    pool.join();
    assert_eq!(hits.load(Ordering::SeqCst), 10);
}

#[test]
#[should_panic(expected = "outside its started window")]
fn post_before_start_panics() {
    let pool = ThreadPool::new("test", 1);
    pool.post(Continuation::from_fn(|| {}));
}

#[test]
fn resumer_equality_is_scheduler_identity() {
    let a = ThreadPool::new("a", 1);
    let b = ThreadPool::new("b", 1);
    assert_eq!(a.resumer(), a.resumer());
    assert_ne!(a.resumer(), b.resumer());
    assert_eq!(Resumer::inline(), Resumer::inline());
    assert_ne!(a.resumer(), Resumer::inline());
}

#[test]
fn strand_serializes_continuations() {
    init_test_logger();
    let pool = ThreadPool::new("test", 4);
    pool.start();
    let strand = Strand::new(pool.resumer());
    let strand_resumer = Resumer::new(strand.clone());

    const N: usize = 200;
    let latch = Arc::new(crate::util::Latch::new(N));
    let inside = Arc::new(AtomicBool::new(false));
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    let posters: Vec<_> = (0..4)
        .map(|t| {
            let strand_resumer = strand_resumer.clone();
            let latch = latch.clone();
            let inside = inside.clone();
            let order = order.clone();
            std::thread::spawn(move || {
                for i in 0..N / 4 {
                    let latch = latch.clone();
                    let inside = inside.clone();
                    let order = order.clone();
                    strand_resumer.post(Continuation::from_fn(move || {
                        // Exactly one continuation may be inside at a time.
                        assert!(!inside.swap(true, Ordering::SeqCst));
                        order.lock().push((t, i));
                        inside.store(false, Ordering::SeqCst);
                        latch.count_down();
                    }));
                }
            })
        })
        .collect();
    for p in posters {
        p.join().unwrap();
    }
    latch.wait();
    assert_eq!(order.lock().len(), N);

    // Per-poster FIFO order is preserved through the strand.
    let order = order.lock();
    for t in 0..4 {
        let seq: Vec<_> = order.iter().filter(|(pt, _)| *pt == t).map(|(_, i)| *i).collect();
        let mut sorted = seq.clone();
        sorted.sort_unstable();
        assert_eq!(seq, sorted);
    }
    pool.stop();
    pool.join();
}

#[test]
fn strand_advertises_own_identity() {
    let pool = ThreadPool::new("test", 2);
    pool.start();
    let strand = Strand::new(pool.resumer());
    let resumer = Resumer::new(strand.clone());
    let latch = Arc::new(crate::util::Latch::new(1));
    let seen = Arc::new(AtomicUsize::new(0));
    {
        let latch = latch.clone();
        let seen = seen.clone();
        resumer.post(Continuation::from_fn(move || {
            seen.store(current_scheduler_id(), Ordering::SeqCst);
            latch.count_down();
        }));
    }
    latch.wait();
    assert_eq!(seen.load(Ordering::SeqCst), resumer.id());
    pool.stop();
    pool.join();
}
