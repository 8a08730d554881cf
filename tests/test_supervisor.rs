mod common;

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use graceful_tasks::{
    wait_context, CancelCause, Context, FailureKind, Runner, SupervisorBuilder, SupervisorError,
    TaskError,
};
use tokio::time::pause;
use tracing::instrument::WithSubscriber;

use common::{completing, failing, until_cancelled, LogBuffer};

#[tokio::test]
async fn test_no_tasks_is_clean() {
    let result = wait_context(&Context::new(), Vec::new()).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_all_runners_succeed() {
    pause();
    let result = wait_context(
        &Context::new(),
        [
            completing(Duration::from_millis(100)),
            completing(Duration::from_millis(50)),
        ],
    )
    .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_every_task_sees_the_shared_cancellation() {
    pause();
    let observed = Arc::new(AtomicUsize::new(0));
    let watcher = |observed: Arc<AtomicUsize>| {
        Runner::new(move |ctx: Context| async move {
            ctx.done().await;
            observed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    };

    let result = wait_context(
        &Context::new(),
        [
            watcher(observed.clone()),
            completing(Duration::from_millis(10)),
            watcher(observed.clone()),
        ],
    )
    .await;

    assert!(result.is_ok());
    assert_eq!(observed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_shutdown_request_is_clean() {
    pause();
    let shutdown = Runner::new(|_ctx: Context| async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        Err(TaskError::ShutdownRequested)
    });

    let result = wait_context(
        &Context::new(),
        [until_cancelled(), shutdown, until_cancelled()],
    )
    .await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_single_failure_is_reported() {
    pause();
    let result = SupervisorBuilder::new()
        .with_runner("waiter", until_cancelled())
        .with_runner("broken", failing(Duration::from_millis(50), "runner error"))
        .build()
        .wait_context(&Context::new())
        .await;

    match result {
        Err(SupervisorError::TaskFailed { name, source }) => {
            assert_eq!(name, "broken");
            assert_eq!(source.kind(), Some(FailureKind::Task));
            assert!(source.to_string().contains("runner error"));
        }
        other => panic!("expected a task failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_failure_by_registration_order_wins() {
    pause();
    let logs = LogBuffer::default();

    // "slow" is registered first but fails after "fast".
    let result = SupervisorBuilder::new()
        .with_runner("slow", failing(Duration::from_millis(50), "slow failure"))
        .with_runner("fast", failing(Duration::from_millis(10), "fast failure"))
        .build()
        .wait_context(&Context::new())
        .with_subscriber(logs.dispatch())
        .await;

    match result {
        Err(SupervisorError::TaskFailed { name, source }) => {
            assert_eq!(name, "slow");
            assert!(source.to_string().contains("slow failure"));
        }
        other => panic!("expected a task failure, got {other:?}"),
    }
    let logs = logs.contents();
    assert!(logs.contains("discarding secondary task failure"));
    assert!(logs.contains("fast failure"));
}

#[tokio::test]
async fn test_failure_wins_over_shutdown_request() {
    pause();
    let result = wait_context(
        &Context::new(),
        [
            Runner::new(|_ctx: Context| async { Err(TaskError::ShutdownRequested) }),
            failing(Duration::from_millis(5), "late failure"),
        ],
    )
    .await;
    assert!(matches!(
        result,
        Err(SupervisorError::TaskFailed { ref name, .. }) if name == "runner-1"
    ));
}

#[tokio::test]
async fn test_instant_failure_waits_for_siblings() {
    pause();
    let cleaned_up = Arc::new(AtomicBool::new(false));
    let flag = cleaned_up.clone();
    let slow_to_stop = Runner::new(move |ctx: Context| async move {
        let cause = ctx.done().await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        flag.store(true, Ordering::SeqCst);
        Err(TaskError::from(cause))
    });
    let misconfigured = Runner::new(|_ctx: Context| async {
        Err(TaskError::failed(anyhow::anyhow!("misconfigured")))
    });

    let result = wait_context(&Context::new(), [slow_to_stop, misconfigured]).await;

    assert!(result.is_err());
    assert!(cleaned_up.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_parent_deadline_is_reported() {
    pause();
    let (ctx, _cancel) = Context::new().with_timeout(Duration::from_millis(100));

    let result = wait_context(&ctx, [until_cancelled()]).await;

    assert!(matches!(
        result,
        Err(SupervisorError::Cancelled(CancelCause::DeadlineExceeded))
    ));
}

#[tokio::test]
async fn test_parent_cancellation_is_reported() {
    pause();
    let (ctx, cancel) = Context::new().with_cancel();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();
    });

    let result = wait_context(&ctx, [until_cancelled(), until_cancelled()]).await;

    assert!(matches!(
        result,
        Err(SupervisorError::Cancelled(CancelCause::Canceled))
    ));
}

#[tokio::test]
async fn test_panicking_task_is_a_failure() {
    let result = SupervisorBuilder::new()
        .with_runner("waiter", until_cancelled())
        .with_runner(
            "panics",
            Runner::new(|_ctx: Context| async {
                if true {
                    panic!("boom");
                }
                Ok(())
            }),
        )
        .build()
        .wait_context(&Context::new())
        .await;

    match result {
        Err(SupervisorError::TaskFailed { name, source }) => {
            assert_eq!(name, "panics");
            assert_eq!(source.kind(), Some(FailureKind::Panic));
        }
        other => panic!("expected a task failure, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handle_shutdown_is_clean() {
    pause();
    let handle = SupervisorBuilder::new()
        .with_runner("first", until_cancelled())
        .with_runner("second", until_cancelled())
        .build()
        .run(&Context::new());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!handle.is_finished());

    handle.shutdown();
    assert!(handle.wait().await.is_ok());
}
