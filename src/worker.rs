use std::future::Future;

use tokio::sync::mpsc;
use tracing::{instrument::WithSubscriber, Dispatch};

use crate::{
    context::Context,
    task::{triage, FailureKind, SupervisedTask, TaskResult, Verdict},
};

/// Drains a channel, handing each item to a handler one at a time.
///
/// The worker is the channel's only consumer. It returns `Ok(())` once the
/// channel is closed and empty. Cancellation wins over pending items, and
/// items left in the channel are not handled. Failures built with
/// [`TaskError::worker_fatal`](crate::TaskError::worker_fatal) stop the
/// worker, any other failure is logged and the next item is handled.
pub struct Worker<T, F> {
    rx: mpsc::Receiver<T>,
    handler: F,
    logger: Option<Dispatch>,
}

impl<T, F, Fut> Worker<T, F>
where
    T: Send + 'static,
    F: FnMut(Context, T) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    pub fn new(rx: mpsc::Receiver<T>, handler: F) -> Self {
        Self {
            rx,
            handler,
            logger: None,
        }
    }

    /// Routes the worker's logs to `logger` instead of the default dispatcher.
    pub fn with_logger(mut self, logger: Dispatch) -> Self {
        self.logger = Some(logger);
        self
    }
}

impl<T, F, Fut> SupervisedTask for Worker<T, F>
where
    T: Send + 'static,
    F: FnMut(Context, T) -> Fut + Send + 'static,
    Fut: Future<Output = TaskResult> + Send + 'static,
{
    async fn run(self, ctx: Context) -> TaskResult {
        let Self {
            mut rx,
            mut handler,
            logger,
        } = self;

        let draining = async move {
            tracing::info!("starting worker");
            let result = loop {
                tokio::select! {
                    biased;
                    cause = ctx.done() => break Err(cause.into()),
                    item = rx.recv() => {
                        let Some(item) = item else {
                            tracing::info!("channel closed");
                            break Ok(());
                        };
                        match triage(handler(ctx.clone(), item).await, FailureKind::WorkerFatal) {
                            Verdict::Continue => {}
                            Verdict::Ignore(err) => tracing::error!(error = %err, "runner failed"),
                            Verdict::Stop(err) => break Err(err),
                        }
                    }
                }
            };
            tracing::info!("stopped worker");
            result
        };

        match logger {
            Some(logger) => draining.with_subscriber(logger).await,
            None => draining.await,
        }
    }
}
