mod common;

use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use graceful_tasks::{CancelCause, Context, FailureKind, SupervisedTask, TaskError, Ticker};
use tokio::time::pause;

use common::LogBuffer;

fn counting(
    count: Arc<AtomicUsize>,
) -> impl FnMut(Context) -> std::future::Ready<Result<(), TaskError>> {
    move |_ctx| {
        count.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok(()))
    }
}

#[tokio::test]
async fn test_ticker_runs_at_interval() {
    pause();
    let count = Arc::new(AtomicUsize::new(0));
    let ticker = Ticker::new(Duration::from_millis(5), counting(count.clone()));

    let (ctx, cancel) = Context::new().with_cancel();
    let running = tokio::spawn(ticker.run(ctx));

    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
    let result = running.await.unwrap();

    assert!(matches!(result, Err(TaskError::Cancelled(CancelCause::Canceled))));
    assert!(count.load(Ordering::SeqCst) >= 5);
}

#[tokio::test]
async fn test_ticker_fatal_failure_stops_ticker() {
    pause();
    let count = Arc::new(AtomicUsize::new(0));
    let calls = count.clone();
    let ticker = Ticker::new(Duration::from_millis(10), move |_ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(TaskError::ticker_fatal(anyhow::anyhow!("ticker failure"))) }
    });

    let result = ticker.run(Context::new()).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), Some(FailureKind::TickerFatal));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_ticker_ignorable_failure_is_logged() {
    pause();
    let logs = LogBuffer::default();
    let count = Arc::new(AtomicUsize::new(0));
    let calls = count.clone();
    let ticker = Ticker::new(Duration::from_millis(5), move |_ctx| {
        let call = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if call == 0 {
                return Err(TaskError::failed(anyhow::anyhow!("test error")));
            }
            Ok(())
        }
    })
    .with_logger(logs.dispatch());

    let (ctx, cancel) = Context::new().with_cancel();
    let running = tokio::spawn(ticker.run(ctx));
    tokio::time::sleep(Duration::from_millis(22)).await;
    cancel.cancel();
    running.await.unwrap().unwrap_err();

    assert!(count.load(Ordering::SeqCst) >= 4);
    let logs = logs.contents();
    assert!(logs.contains("runner failed"));
    assert!(logs.contains("test error"));
}

#[tokio::test]
async fn test_worker_fatal_kind_does_not_stop_ticker() {
    pause();
    let count = Arc::new(AtomicUsize::new(0));
    let calls = count.clone();
    let ticker = Ticker::new(Duration::from_millis(5), move |_ctx| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { Err(TaskError::worker_fatal(anyhow::anyhow!("not mine"))) }
    });

    let (ctx, _cancel) = Context::new().with_timeout(Duration::from_millis(22));
    let result = ticker.run(ctx).await;

    assert!(matches!(
        result,
        Err(TaskError::Cancelled(CancelCause::DeadlineExceeded))
    ));
    assert!(count.load(Ordering::SeqCst) >= 4);
}

#[tokio::test]
async fn test_ticker_shutdown_request_stops_ticker() {
    pause();
    let ticker = Ticker::new(Duration::from_millis(5), |_ctx| async {
        Err(TaskError::ShutdownRequested)
    });

    let result = ticker.run(Context::new()).await;
    assert!(matches!(result, Err(TaskError::ShutdownRequested)));
}

#[tokio::test]
async fn test_ticker_cancelled_context() {
    let count = Arc::new(AtomicUsize::new(0));
    let ticker = Ticker::new(Duration::from_millis(5), counting(count.clone()));

    let (ctx, cancel) = Context::new().with_cancel();
    cancel.cancel();
    let err = ticker.run(ctx).await.unwrap_err();

    assert_eq!(err.to_string(), "context canceled");
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ticker_with_unrepresentable_interval() {
    let count = Arc::new(AtomicUsize::new(0));
    let ticker = Ticker::new(Duration::MAX, counting(count.clone()));

    let (ctx, cancel) = Context::new().with_cancel();
    cancel.cancel();
    let err = ticker.run(ctx).await.unwrap_err();

    assert!(matches!(err, TaskError::Cancelled(CancelCause::Canceled)));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ticker_logs_lifecycle() {
    pause();
    let logs = LogBuffer::default();
    let ticker = Ticker::new(
        Duration::from_millis(5),
        counting(Arc::new(AtomicUsize::new(0))),
    )
    .with_logger(logs.dispatch());

    let (ctx, _cancel) = Context::new().with_timeout(Duration::from_millis(15));
    let _ = ticker.run(ctx).await;

    let logs = logs.contents();
    assert!(logs.contains("starting ticker"));
    assert!(logs.contains("stopped ticker"));
}

#[test]
#[should_panic(expected = "interval must be greater than zero")]
fn test_zero_interval_panics() {
    let _ = Ticker::new(Duration::ZERO, counting(Arc::new(AtomicUsize::new(0))));
}
