use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn request_is_idempotent() {
    let src = StopSource::new();
    assert!(!src.stop_requested());
    assert!(src.request_stop());
    assert!(!src.request_stop());
    assert!(src.stop_requested());
    assert!(src.token().stop_requested());
}

#[test]
fn callback_fires_once_on_transition() {
    let src = StopSource::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let _cb = src.token().register(move || {
        h.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    src.request_stop();
    src.request_stop();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn late_registration_runs_synchronously() {
    let src = StopSource::new();
    src.request_stop();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let _cb = src.token().register(move || {
        h.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn dropped_callback_never_fires() {
    let src = StopSource::new();
    let hits = Arc::new(AtomicUsize::new(0));
    let h = hits.clone();
    let cb = src.token().register(move || {
        h.fetch_add(1, Ordering::SeqCst);
    });
    drop(cb);
    src.request_stop();
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[test]
fn concurrent_requests_fire_each_callback_once() {
    for _ in 0..64 {
        let src = StopSource::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let cbs: Vec<_> = (0..8)
            .map(|_| {
                let h = hits.clone();
                src.token().register(move || {
                    h.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let src = src.clone();
                std::thread::spawn(move || {
                    src.request_stop();
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(hits.load(Ordering::SeqCst), 8);
        drop(cbs);
    }
}

#[test]
fn callback_may_drop_itself() {
    // A callback handle moved into a slot that the callback itself clears.
    let src = StopSource::new();
    let slot: Arc<parking_lot::Mutex<Option<StopCallback>>> =
        Arc::new(parking_lot::Mutex::new(None));
    let s2 = slot.clone();
    let cb = src.token().register(move || {
        s2.lock().take();
    });
    *slot.lock() = Some(cb);
    src.request_stop();
    assert!(slot.lock().is_none());
}
