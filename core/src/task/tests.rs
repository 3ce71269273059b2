use crate::combinators::sync_wait;
use crate::ctx;
use crate::err::Error;
use crate::op::wait;
use crate::task::Task;
use crate::testonly::{init_test_logger, manual_op};
use assert_matches::assert_matches;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn immediate_value() {
    assert_eq!(sync_wait(Task::new(async { Ok(42) })).unwrap(), 42);
}

#[test]
fn suspends_and_resumes_on_external_completion() {
    init_test_logger();
    let (op, trigger) = manual_op::<u32>();
    let task = Task::new(async move {
        let v = wait(op).await?;
        Ok(v + 1)
    });
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        trigger.succeed(6);
    });
    assert_eq!(sync_wait(task).unwrap(), 7);
}

#[test]
fn error_short_circuits() {
    let (op, trigger) = manual_op::<u32>();
    trigger.complete(Err(Error::ParseFailed));
    let reached_after = Arc::new(Mutex::new(false));
    let flag = reached_after.clone();
    let task = Task::new(async move {
        let v = wait(op).await?;
        *flag.lock() = true;
        Ok(v)
    });
    assert_matches!(sync_wait(task), Err(Error::ParseFailed));
    assert!(!*reached_after.lock());
}

#[test]
fn nested_tasks_propagate_values() {
    let task = Task::new(async {
        let inner = Task::new(async { Ok(10) });
        let v = wait(inner).await?;
        Ok(v * 2)
    });
    assert_eq!(sync_wait(task).unwrap(), 20);
}

#[test]
fn child_inherits_parent_stop_source() {
    let (op, _trigger) = manual_op::<()>();
    let task = Task::new(async move {
        let src = ctx::current().stop_source().clone();
        let child = Task::new(async move {
            // Cancel the whole tree from within, then block on an op that
            // honors the (now requested) stop.
            src.request_stop();
            wait(op).await
        });
        wait(child).await
    });
    assert_matches!(sync_wait(task), Err(Error::Canceled));
}

#[test]
fn detached_stop_source_ignores_parent() {
    use crate::stop::StopSource;
    let own = StopSource::new();
    let task = Task::new(async move {
        let parent_src = ctx::current().stop_source().clone();
        let mut child = Task::new(async { Ok(ctx::current().stop_requested()) });
        child.set_stop_source(StopSource::new());
        parent_src.request_stop();
        wait(child).await
    });
    let mut root = Task::new(async move { wait(task).await });
    root.set_stop_source(own);
    assert_eq!(sync_wait(root).unwrap(), false);
}

#[test]
fn cleanup_runs_in_reverse_order() {
    init_test_logger();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    let task = Task::new(async move {
        ctx::add_cleanup(Task::new(async move {
            a.lock().push("a");
            Ok(())
        }));
        ctx::add_cleanup(Task::new(async move {
            b.lock().push("b");
            Ok(())
        }));
        Ok(())
    });
    sync_wait(task).unwrap();
    assert_eq!(*order.lock(), vec!["b", "a"]);
}

#[test]
fn cleanup_runs_on_error_and_primary_error_wins() {
    init_test_logger();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    let task = Task::new(async move {
        ctx::add_cleanup(Task::new(async move {
            a.lock().push("a");
            Ok(())
        }));
        ctx::add_cleanup(Task::new(async move {
            b.lock().push("b");
            // A failing cleanup op is logged, never surfaced.
            Err(Error::InvalidInput)
        }));
        Err::<(), _>(Error::OutOfBound)
    });
    assert_matches!(sync_wait(task), Err(Error::OutOfBound));
    assert_eq!(*order.lock(), vec!["b", "a"]);
}

#[test]
fn cleanup_may_suspend() {
    let order = Arc::new(Mutex::new(Vec::new()));
    let o = order.clone();
    let (op, trigger) = manual_op::<u32>();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(10));
        trigger.succeed(9);
    });
    let task = Task::new(async move {
        ctx::add_cleanup(Task::new(async move {
            let v = wait(op).await?;
            o.lock().push(v);
            Ok(())
        }));
        Ok(())
    });
    sync_wait(task).unwrap();
    assert_eq!(*order.lock(), vec![9]);
}

#[test]
fn cleanup_runs_when_canceled_mid_flight() {
    init_test_logger();
    let order = Arc::new(Mutex::new(Vec::new()));
    let (a, b) = (order.clone(), order.clone());
    let (op, _trigger) = manual_op::<()>();
    let task = Task::new(async move {
        ctx::add_cleanup(Task::new(async move {
            a.lock().push("a");
            Ok(())
        }));
        ctx::add_cleanup(Task::new(async move {
            b.lock().push("b");
            Ok(())
        }));
        let src = ctx::current().stop_source().clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            src.request_stop();
        });
        // Never triggered; completes only through cancellation.
        wait(op).await
    });
    assert_matches!(sync_wait(task), Err(Error::Canceled));
    assert_eq!(*order.lock(), vec!["b", "a"]);
}
