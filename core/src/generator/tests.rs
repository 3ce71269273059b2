use super::*;
use crate::combinators::sync_wait;
use crate::ctx as actx;
use crate::op::wait;
use crate::task::Task;
use crate::testonly::{delayed_op, init_test_logger, manual_op};
use assert_matches::assert_matches;
use std::time::Duration;

#[test]
fn yields_values_then_exhausts() {
    let task = Task::new(async {
        let mut gen = Generator::new(|y| async move {
            for i in 1..=3u32 {
                y.emit(i).await;
            }
            Ok(())
        });
        let mut got = Vec::new();
        while let Some(v) = wait(gen.next()).await? {
            got.push(v);
        }
        // Exhausted generators keep answering None.
        assert_eq!(wait(gen.next()).await?, None);
        Ok(got)
    });
    assert_eq!(sync_wait(task).unwrap(), vec![1, 2, 3]);
}

#[test]
fn body_may_suspend_between_yields() {
    init_test_logger();
    let task = Task::new(async {
        let mut gen = Generator::new(|y| async move {
            y.emit(1u32).await;
            wait(delayed_op(Duration::from_millis(10), ())).await?;
            y.emit(2).await;
            Ok(())
        });
        let mut got = Vec::new();
        while let Some(v) = wait(gen.next()).await? {
            got.push(v);
        }
        Ok(got)
    });
    assert_eq!(sync_wait(task).unwrap(), vec![1, 2]);
}

#[test]
fn body_error_surfaces_from_next() {
    let task = Task::new(async {
        let mut gen = Generator::new(|y| async move {
            y.emit(1u32).await;
            Err(crate::err::Error::InvalidInput)
        });
        assert_eq!(wait(gen.next()).await?, Some(1));
        let err = wait(gen.next()).await.unwrap_err();
        assert_matches!(err, crate::err::Error::InvalidInput);
        // After the error is consumed the generator is exhausted.
        assert_eq!(wait(gen.next()).await?, None);
        Ok(())
    });
    sync_wait(task).unwrap();
}

#[test]
fn abandoned_generator_cleans_up_before_parent_returns() {
    init_test_logger();
    let events = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let (ev_gen, ev_guard, ev_after) = (events.clone(), events.clone(), events.clone());

    struct Guard(std::sync::Arc<parking_lot::Mutex<Vec<&'static str>>>);
    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.lock().push("body dropped");
        }
    }

    let task = Task::new(async move {
        let mut gen = Generator::new(|y| async move {
            let _guard = Guard(ev_guard);
            actx::add_cleanup(Task::new(async move {
                ev_gen.lock().push("gen cleanup");
                Ok(())
            }));
            for i in 1..=3u32 {
                y.emit(i).await;
            }
            Ok(())
        });
        // Consume a single value, then abandon the generator.
        let first = wait(gen.next()).await?;
        assert_eq!(first, Some(1));
        Ok(())
    });
    sync_wait(task).unwrap();
    events.lock().push("parent returned");
    assert_eq!(*ev_after.lock(), vec!["body dropped", "gen cleanup", "parent returned"]);
}

#[test]
fn canceled_consumer_still_finalizes_generator() {
    init_test_logger();
    let events = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    let ev_gen = events.clone();
    let (blocker, _trigger) = manual_op::<()>();

    let consumer = Task::new(async move {
        let mut gen = Generator::new(|y| async move {
            actx::add_cleanup(Task::new(async move {
                ev_gen.lock().push("gen cleanup");
                Ok(())
            }));
            for i in 1..=3u32 {
                y.emit(i).await;
            }
            Ok(())
        });
        let _ = wait(gen.next()).await?;
        // Blocks until the race cancels us; the generator is abandoned
        // mid-sequence.
        wait(blocker).await
    });
    let quick = Task::new(async { Ok(()) });
    let (winner, consumer_r, _quick_r) =
        sync_wait(crate::combinators::until_first_done(consumer, quick)).unwrap();
    assert_eq!(winner, 1);
    assert_matches!(consumer_r, Err(crate::err::Error::Canceled));
    assert_eq!(*events.lock(), vec!["gen cleanup"]);
}
